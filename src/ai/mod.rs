mod analyzer;

pub use analyzer::{parse_score, Analyzer, ScoreOutcome};
