use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LetterFields;
use crate::config::LetterConfig;
use crate::workflows::leave::domain::LeavePurpose;

/// External text generator for leave letters.
#[async_trait]
pub trait LetterGenerator: Send + Sync {
    async fn generate(&self, fields: &LetterFields) -> Result<String, LetterGenerationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LetterGenerationError {
    #[error("letter generator request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("letter generator returned HTTP {0}")]
    Status(u16),
    #[error("letter generator returned no text")]
    EmptyResponse,
}

/// Client for a `generateContent` style text generation endpoint.
#[derive(Debug, Clone)]
pub struct HttpLetterGenerator {
    client: Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl HttpLetterGenerator {
    /// `None` when no API key is configured.
    pub fn from_config(config: &LetterConfig) -> Result<Option<Self>, LetterGenerationError> {
        let Some(api_key) = config.api_key.clone().filter(|key| !key.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder().timeout(config.timeout).build()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            config.endpoint.trim_end_matches('/'),
            config.model
        );
        Ok(Some(Self {
            client,
            url,
            api_key,
        }))
    }
}

#[async_trait]
impl LetterGenerator for HttpLetterGenerator {
    async fn generate(&self, fields: &LetterFields) -> Result<String, LetterGenerationError> {
        let prompt = build_prompt(fields);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LetterGenerationError::Status(status.as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .map(|part| part.text)
            .collect();
        debug!(chars = text.len(), "letter generated");
        if text.trim().is_empty() {
            return Err(LetterGenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

pub(crate) fn build_prompt(fields: &LetterFields) -> String {
    let role = if fields.is_teaching_staff {
        "Teaching Staff"
    } else {
        "Non-Teaching Staff"
    };
    let detail = fields
        .detail
        .as_deref()
        .map(|detail| format!("- Specific Details/Purpose: {detail}\n"))
        .unwrap_or_default();
    let certificate = if fields.purpose == LeavePurpose::MedicalLeave {
        "- Mention that a medical certificate is being submitted.\n"
    } else {
        ""
    };

    format!(
        "Write a professional and formal leave application letter for a college setting.\n\n\
         Details:\n\
         - Applicant Name: {name}\n\
         - Role: {role}\n\
         - Department: {department}\n\
         - Duration: {duration}\n\
         - Type: {day_type}\n\
         - Reason Category: {purpose}\n\
         {detail}\
         - Work Delegated To (Acting Staff): {coverage}\n\n\
         Instructions:\n\
         - Format as a formal letter.\n\
         - If the purpose is \"On Duty\", include the specific details exactly as given.\n\
         - Keep the letter polite and concise.\n\
         - Use professional salutations (\"To The Principal\", \"Respected Sir/Madam\").\n\
         {certificate}",
        name = fields.name,
        department = fields.department.as_deref().unwrap_or("N/A"),
        duration = fields.duration(true),
        day_type = fields.day_type.label(),
        purpose = fields.purpose.label(),
        coverage = fields.coverage,
    )
}
