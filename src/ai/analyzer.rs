use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::bias;
use crate::error::{AppError, Result};
use crate::models::Article;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

/// Result of the bias-score leg: either the model's reply parsed cleanly,
/// or we fell back to the heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    Parsed(f64),
    Fallback(f64),
}

impl ScoreOutcome {
    pub fn value(&self) -> f64 {
        match self {
            ScoreOutcome::Parsed(v) | ScoreOutcome::Fallback(v) => *v,
        }
    }
}

/// Pull a score out of free-form model output. Accepts only a number that
/// lands in [-10, 10]; anything else is rejected.
pub fn parse_score(text: &str) -> Option<f64> {
    let re = Regex::new(r"-?\d+(\.\d+)?").ok()?;
    let score: f64 = re.find(text.trim())?.as_str().parse().ok()?;
    if (-10.0..=10.0).contains(&score) {
        Some(score)
    } else {
        None
    }
}

pub struct Analyzer {
    client: Client,
    api_key: String,
}

impl Analyzer {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    /// Run both analysis legs concurrently. A failed summary call fails the
    /// whole analysis; the score leg always degrades to the heuristic.
    pub async fn analyze(&self, article: &Article) -> Result<(String, ScoreOutcome)> {
        let (summary, score) = tokio::join!(self.summarize(article), self.score(article));
        Ok((summary?, score))
    }

    pub async fn summarize(&self, article: &Article) -> Result<String> {
        let system_prompt = "You are a helpful assistant that summarizes news articles. \
Provide a concise, objective summary in 2-3 sentences that highlights the key points.";

        let user_message = format!(
            "Please summarize the following news article:\n\nTitle: {}\nSource: {}\nDescription: {}\n{}",
            article.title,
            article.source,
            article.description,
            article
                .content
                .as_deref()
                .map(|c| format!("Content: {}", c))
                .unwrap_or_default(),
        );

        let text = self
            .complete(user_message, Some(system_prompt.to_string()), 300)
            .await?;
        Ok(text.trim().to_string())
    }

    /// Ask the model for a single number in [-10, 10]; fall back to the
    /// heuristic when the call fails or the reply does not parse.
    pub async fn score(&self, article: &Article) -> ScoreOutcome {
        let prompt = format!(
            "Analyze the political leaning of the following news article on a scale \
from -10 (extremely liberal) to +10 (extremely conservative).\n\n\
Title: {}\nSource: {}\nDescription: {}\n{}\n\
Consider language and framing, topic selection and emphasis, source reputation, \
and how different viewpoints are presented.\n\
Return ONLY the numerical score with no additional text.",
            article.title,
            article.source,
            article.description,
            article
                .content
                .as_deref()
                .map(|c| format!("Content: {}", c))
                .unwrap_or_default(),
        );

        let fallback = || {
            ScoreOutcome::Fallback(bias::heuristic_score(
                &article.source,
                &article.title,
                &article.description,
            ))
        };

        match self.complete(prompt, None, 16).await {
            Ok(text) => match parse_score(&text) {
                Some(score) => ScoreOutcome::Parsed(score),
                None => {
                    tracing::warn!("Unparseable score reply {:?}, using heuristic", text);
                    fallback()
                }
            },
            Err(e) => {
                tracing::warn!("Score request failed, using heuristic: {}", e);
                fallback()
            }
        }
    }

    async fn complete(
        &self,
        user_message: String,
        system: Option<String>,
        max_tokens: u32,
    ) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message,
            }],
            system,
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited(
                "Too many requests. Please try again later.".to_string(),
            ));
        }

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ClaudeApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let text = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }
}
