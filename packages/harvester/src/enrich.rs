//! Language-model pass over the raw job description.
//!
//! The model is asked for a fixed set of labeled lines and the reply is
//! parsed line by line. Anything the model leaves out, answers with the
//! sentinel, or garbles simply stays absent. A failed call never fails the
//! record.

use openai_client::{ChatRequest, Message, OpenAIClient};

use crate::types::{Enrichment, NOT_APPLICABLE};

const SYSTEM_PROMPT: &str = "You extract structured facts from job postings. \
Answer with exactly one line per requested field, formatted as 'Field: value'. \
Use 'Not Applicable' when the posting does not state the field.";

const FIELD_LABELS: [&str; 7] = [
    "Industry/Domain",
    "Tech Stack/Skills",
    "Benefits",
    "Qualifications",
    "Contract Duration",
    "Expected Hours Per Week",
    "Required Skills",
];

pub struct Enricher {
    client: OpenAIClient,
    model: String,
}

impl Enricher {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Ask the model for the structured fields. On any failure the record
    /// proceeds unenriched.
    pub async fn enrich(&self, description: &str) -> Enrichment {
        let request = ChatRequest::new(&self.model)
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(build_prompt(description)))
            .temperature(0.0);

        match self.client.chat_completion(request).await {
            Ok(response) => parse_enrichment(&response.content),
            Err(e) => {
                tracing::warn!(error = %e, "enrichment request failed, continuing without");
                Enrichment::default()
            }
        }
    }
}

fn build_prompt(description: &str) -> String {
    let fields = FIELD_LABELS.join("\n- ");
    format!(
        "Extract the following fields from the job description below:\n- {fields}\n\n\
         Job description:\n{description}"
    )
}

/// Parse "Field: value" lines. Unknown labels, blank values, and sentinel
/// values are dropped.
pub fn parse_enrichment(text: &str) -> Enrichment {
    let mut enrichment = Enrichment::default();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(NOT_APPLICABLE) {
            continue;
        }
        let value = Some(value.to_string());
        match label.trim().to_lowercase().as_str() {
            "industry/domain" => enrichment.industry = value,
            "tech stack/skills" => enrichment.tech_skills = value,
            "benefits" => enrichment.benefits = value,
            "qualifications" => enrichment.qualifications = value,
            "contract duration" => enrichment.contract_duration = value,
            "expected hours per week" => enrichment.expected_hours_per_week = value,
            "required skills" => enrichment.required_skills = value,
            _ => {}
        }
    }
    enrichment
}
