mod handlers;
mod server;

pub use handlers::AppState;
pub use server::{build_router, serve};
