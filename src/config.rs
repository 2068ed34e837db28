//! Examination configuration
//!
//! Defaults match the hosted recruiting backend. Values can come from a JSON
//! file or from `EXAM_*` environment variables (a `.env` file is honoured).

use crate::capture::{CaptureConstraints, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_NUM_QUESTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExaminationConfig {
    /// Base URL of the recruiting API (job metadata, question generation)
    pub api_url: String,

    /// How many questions to ask the generator for
    pub num_questions: u32,

    pub question_types: Vec<String>,

    /// Camera/microphone request
    pub capture: CaptureConstraints,

    /// Retries for transient device errors
    pub acquire_retries: u8,

    pub retry_backoff_ms: u64,

    pub request_timeout_secs: u64,
}

impl Default for ExaminationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            num_questions: DEFAULT_NUM_QUESTIONS,
            question_types: vec![
                "behavioral".to_string(),
                "technical".to_string(),
                "situational".to_string(),
            ],
            capture: CaptureConstraints::default(),
            acquire_retries: 2,
            retry_backoff_ms: 500,
            request_timeout_secs: 10,
        }
    }
}

impl ExaminationConfig {
    /// Defaults overridden by `EXAM_API_URL`, `EXAM_NUM_QUESTIONS`,
    /// `EXAM_ACQUIRE_RETRIES` and `EXAM_REQUEST_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = std::env::var("EXAM_API_URL") {
            config.api_url = url;
        }
        if let Some(n) = parse_env("EXAM_NUM_QUESTIONS")? {
            config.num_questions = n;
        }
        if let Some(n) = parse_env("EXAM_ACQUIRE_RETRIES")? {
            config.acquire_retries = n;
        }
        if let Some(n) = parse_env("EXAM_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = n;
        }
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid examination config in {}", path.display()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.acquire_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} must be a number, got '{value}'")),
        Err(_) => Ok(None),
    }
}
