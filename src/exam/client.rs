//! Job metadata and question generation service client

use super::questions::{default_questions, Question};
use crate::config::ExaminationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const JOBS_PATH: &str = "jobs";
const GENERATE_PATH: &str = "generate-questions";

/// The parts of a job posting that feed question generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, alias = "skills")]
    pub required_skills: Vec<String>,
}

/// Body of a question generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRequest {
    pub job_id: String,
    pub num_questions: u32,
    pub question_types: Vec<String>,
    pub job_title: String,
    pub job_description: String,
    pub required_skills: Vec<String>,
}

impl QuestionRequest {
    pub fn for_job(job_id: &str, job: &JobDetails, config: &ExaminationConfig) -> Self {
        Self {
            job_id: job_id.to_string(),
            num_questions: config.num_questions,
            question_types: config.question_types.clone(),
            job_title: job.title.clone(),
            job_description: job.description.clone(),
            required_skills: job.required_skills.clone(),
        }
    }
}

/// Failures talking to the job or question services
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionFetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for QuestionFetchError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Where an examination gets its job metadata and questions from
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<JobDetails, QuestionFetchError>;

    async fn generate_questions(&self, request: &QuestionRequest) -> Result<Vec<Question>, QuestionFetchError>;
}

#[derive(Deserialize)]
struct QuestionsPayload {
    questions: Vec<QuestionItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionItem {
    Object { question: String },
    Text(String),
}

/// Parse a question generation response.
///
/// Accepts both `{"question": "..."}` objects and bare strings. Blank entries
/// are skipped; a payload with no usable question is malformed.
pub fn parse_questions(body: &str) -> Result<Vec<Question>, QuestionFetchError> {
    let payload: QuestionsPayload =
        serde_json::from_str(body).map_err(|e| QuestionFetchError::Malformed(e.to_string()))?;

    let texts: Vec<String> = payload
        .questions
        .into_iter()
        .map(|item| match item {
            QuestionItem::Object { question } => question,
            QuestionItem::Text(text) => text,
        })
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();

    if texts.is_empty() {
        return Err(QuestionFetchError::Malformed("no questions in response".to_string()));
    }
    Ok(Question::numbered(texts))
}

/// Generate questions, substituting the default set on any failure
pub async fn generate_or_default(source: &dyn QuestionSource, request: &QuestionRequest) -> Vec<Question> {
    match source.generate_questions(request).await {
        Ok(questions) => {
            tracing::info!("Generated {} questions for job {}", questions.len(), request.job_id);
            questions
        }
        Err(e) => {
            tracing::warn!("Question generation failed ({}), using default questions", e);
            default_questions()
        }
    }
}

/// HTTP client for the recruiting backend
pub struct HttpQuestionSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpQuestionSource {
    pub fn new(config: &ExaminationConfig) -> Result<Self, QuestionFetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        let mut base_url = config.api_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        tracing::info!("Question source initialized: {}", base_url);
        Ok(Self { base_url, client })
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}{}/{}", self.base_url, JOBS_PATH, urlencoding::encode(job_id))
    }

    fn generate_url(&self) -> String {
        format!("{}{}", self.base_url, GENERATE_PATH)
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch_job(&self, job_id: &str) -> Result<JobDetails, QuestionFetchError> {
        let url = self.job_url(job_id);
        tracing::debug!("Fetching job details: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuestionFetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| QuestionFetchError::Malformed(e.to_string()))
    }

    async fn generate_questions(&self, request: &QuestionRequest) -> Result<Vec<Question>, QuestionFetchError> {
        let url = self.generate_url();
        tracing::debug!("Requesting {} questions: {}", request.num_questions, url);

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(QuestionFetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        parse_questions(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeQuestions;

    #[test]
    fn test_parse_question_objects() {
        let body = r#"{"questions": [{"question": "Why Rust?"}, {"question": "Describe a hard bug."}]}"#;
        let questions = parse_questions(body).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[1].index, 1);
        assert_eq!(questions[1].text, "Describe a hard bug.");
    }

    #[test]
    fn test_parse_bare_strings_and_skip_blanks() {
        let body = r#"{"questions": ["First?", "  ", "Second?"]}"#;
        let questions = parse_questions(body).unwrap();
        assert_eq!(questions, Question::numbered(["First?", "Second?"]));
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(matches!(
            parse_questions(r#"{"questions": []}"#),
            Err(QuestionFetchError::Malformed(_))
        ));
        assert!(matches!(
            parse_questions(r#"{"items": ["x"]}"#),
            Err(QuestionFetchError::Malformed(_))
        ));
        assert!(matches!(parse_questions("<html>"), Err(QuestionFetchError::Malformed(_))));
    }

    #[test]
    fn test_job_details_accepts_skills_alias() {
        let job: JobDetails =
            serde_json::from_str(r#"{"title": "Backend Engineer", "skills": ["rust", "sql"]}"#).unwrap();
        assert_eq!(job.required_skills, vec!["rust".to_string(), "sql".to_string()]);
        assert!(job.description.is_empty());
    }

    #[test]
    fn test_request_built_from_job_and_config() {
        let job = JobDetails {
            title: "Data Analyst".into(),
            description: "Dashboards".into(),
            required_skills: vec!["sql".into()],
        };
        let request = QuestionRequest::for_job("42", &job, &ExaminationConfig::default());

        assert_eq!(request.num_questions, 5);
        assert_eq!(request.question_types, vec!["behavioral", "technical", "situational"]);
        assert_eq!(request.job_title, "Data Analyst");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["job_id"], "42");
        assert_eq!(body["required_skills"][0], "sql");
    }

    #[test]
    fn test_urls_are_joined_and_encoded() {
        let config = ExaminationConfig {
            api_url: "http://localhost:8000/api".into(),
            ..ExaminationConfig::default()
        };
        let source = HttpQuestionSource::new(&config).unwrap();
        assert_eq!(source.job_url("a b/c"), "http://localhost:8000/api/jobs/a%20b%2Fc");
        assert_eq!(source.generate_url(), "http://localhost:8000/api/generate-questions");
    }

    #[tokio::test]
    async fn test_generation_failure_falls_back_to_defaults() {
        let source = FakeQuestions::failing();
        let request = QuestionRequest::for_job("7", &JobDetails::default(), &ExaminationConfig::default());

        let questions = generate_or_default(source.as_ref(), &request).await;
        assert_eq!(questions, default_questions());
    }
}
