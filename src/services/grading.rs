//! The grading collaborator: scores a free-text answer against the
//! outstanding item. The engine only depends on the [`Grader`] trait; the
//! chat-completion adapter below is what the binary wires in.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::warn;

use crate::services::models::{Exercise, ExerciseContent, Word};

/// Scores at or above this count as a correct answer.
pub const CORRECT_THRESHOLD: u8 = 80;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRIES: usize = 3;
const BASE_BACKOFF_MS: u64 = 200;

/// The item an answer is graded against.
#[derive(Debug, Clone, PartialEq)]
pub enum GradingItem {
    Exercise(Exercise),
    Word(Word),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeReport {
    pub score: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub suggestion: String,
}

impl GradeReport {
    pub fn is_correct(&self) -> bool {
        self.score >= CORRECT_THRESHOLD
    }

    /// Comment followed by the suggested answer, as stored on a submission.
    pub fn feedback(&self) -> String {
        match (self.comment.trim(), self.suggestion.trim()) {
            (comment, "") => comment.to_string(),
            ("", suggestion) => suggestion.to_string(),
            (comment, suggestion) => format!("{comment}\n\n{suggestion}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("grader not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: reqwest::StatusCode, body: String },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response")]
    EmptyChoices,
    #[error("score out of range: {0}")]
    ScoreOutOfRange(i64),
}

pub trait Grader: Send + Sync {
    fn score<'a>(
        &'a self,
        item: &'a GradingItem,
        input: &'a str,
    ) -> BoxFuture<'a, Result<GradeReport, GradingError>>;
}

#[derive(Debug, Clone)]
pub struct GraderConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_endpoint: String,
    pub timeout: Duration,
}

impl GraderConfig {
    pub fn from_env() -> Self {
        let api_key = env_string("LLM_API_KEY");
        let model = env_string("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_endpoint = normalize_endpoint(
            env_string("LLM_API_ENDPOINT").unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
        );
        let timeout = Duration::from_millis(env_u64("LLM_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        Self {
            api_key,
            model,
            api_endpoint,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Chat-completion backed grader. Asks the model for a JSON object with
/// `score`, `comment` and `suggestion`.
#[derive(Clone)]
pub struct LlmGrader {
    config: GraderConfig,
    client: reqwest::Client,
}

impl LlmGrader {
    pub fn new(config: GraderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, client }
    }

    pub fn from_env() -> Self {
        Self::new(GraderConfig::from_env())
    }

    pub fn is_available(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|v| !v.trim().is_empty())
            && !self.config.model.trim().is_empty()
    }

    async fn grade(&self, item: &GradingItem, input: &str) -> Result<GradeReport, GradingError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(GradingError::NotConfigured("LLM_API_KEY"))?;

        let (system, user) = build_prompt(item, input);
        let url = format!("{}/chat/completions", self.config.api_endpoint.trim_end_matches('/'));
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                ChatMessage { role: "system".into(), content: system.into() },
                ChatMessage { role: "user".into(), content: user },
            ],
            "response_format": { "type": "json_object" },
            "stream": false
        });

        let response = self.post_with_retry(&url, api_key, &payload).await?;
        let content = response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or(GradingError::EmptyChoices)?;
        parse_report(content)
    }

    async fn post_with_retry(
        &self,
        url: &str,
        api_key: &str,
        payload: &serde_json::Value,
    ) -> Result<ChatResponse, GradingError> {
        let mut retry = 0;
        loop {
            let err = match self.client.post(url).bearer_auth(api_key).json(payload).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let bytes = resp.bytes().await?;
                    return serde_json::from_slice(&bytes).map_err(|e| {
                        tracing::error!(error = %e, "failed to parse grader response");
                        GradingError::Json(e)
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    if !is_retryable(status) {
                        return Err(GradingError::HttpStatus { status, body });
                    }
                    GradingError::HttpStatus { status, body }
                }
                Err(e) => GradingError::Request(e),
            };

            if retry >= MAX_RETRIES {
                return Err(err);
            }
            warn!(retry, error = %err, "grader request failed, retrying");
            sleep(Duration::from_millis(BASE_BACKOFF_MS * (1 << retry))).await;
            retry += 1;
        }
    }
}

impl Grader for LlmGrader {
    fn score<'a>(
        &'a self,
        item: &'a GradingItem,
        input: &'a str,
    ) -> BoxFuture<'a, Result<GradeReport, GradingError>> {
        Box::pin(self.grade(item, input))
    }
}

const GRADER_ROLE: &str = "You are a Japanese language tutor. Reply only with a JSON object \
{\"score\": integer 0-100, \"comment\": short explanation of mistakes, \"suggestion\": an improved answer}.";

fn build_prompt(item: &GradingItem, input: &str) -> (&'static str, String) {
    let user = match item {
        GradingItem::Exercise(exercise) => match &exercise.content {
            ExerciseContent::Translation(c) => format!(
                "Check this translation into Japanese for accuracy, grammar and naturalness.\n\
                 Original: \"{}\"\nReference: \"{}\"\nStudent: \"{input}\"",
                c.translation, c.japanese
            ),
            ExerciseContent::Question(c) => format!(
                "Check this answer to a question for accuracy, grammar and naturalness.\n\
                 Question: \"{}\"\nStudent: \"{input}\"",
                c.question
            ),
            ExerciseContent::Audio(c) => format!(
                "The student listened to a recording and answered a question about it.\n\
                 Recording: \"{}\"\nQuestion: \"{}\"\nStudent: \"{input}\"",
                c.text, c.question
            ),
            ExerciseContent::Grammar(c) => format!(
                "Check that the student's sentence uses the grammar point correctly.\n\
                 Grammar: \"{}\" ({})\nStructure: \"{}\"\nExample: \"{}\"\nStudent: \"{input}\"",
                c.grammar, c.meaning, c.structure, c.example
            ),
        },
        GradingItem::Word(word) => format!(
            "The student was asked for the Japanese word meaning \"{}\". Accept kanji or kana.\n\
             Expected: \"{}\" ({})\nStudent: \"{input}\"",
            word.translation,
            word.display_form(),
            word.kana
        ),
    };
    (GRADER_ROLE, user)
}

fn parse_report(content: &str) -> Result<GradeReport, GradingError> {
    #[derive(Deserialize)]
    struct RawReport {
        score: i64,
        #[serde(default)]
        comment: String,
        #[serde(default)]
        suggestion: String,
    }

    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let raw: RawReport = serde_json::from_str(trimmed)?;
    let score = u8::try_from(raw.score)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or(GradingError::ScoreOutOfRange(raw.score))?;

    Ok(GradeReport {
        score,
        comment: raw.comment,
        suggestion: raw.suggestion,
    })
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}

fn normalize_endpoint(endpoint: String) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") || trimmed.contains("/v1/") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}
