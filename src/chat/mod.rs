//! Case-bound consultation chat.
//!
//! A conversation is pinned to one patient snapshot and one diagnostic
//! result; the system prompt grounds the model in exactly that case and
//! nothing else. Any OpenAI-compatible chat-completions endpoint works.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{PatientSnapshot, ResultSnapshot};
use crate::settings::ConsultSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn as_wire_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// System prompt grounding the consultation in one case.
fn build_case_prompt(patient: &PatientSnapshot, result: &ResultSnapshot) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a musculoskeletal radiology consultant. Discuss ONLY the case below; \
         politely redirect questions about anything else, state plainly when the provided \
         data cannot answer a question, and always recommend confirming decisions with the \
         treating clinician.\n\n",
    );

    prompt.push_str("=== Patient ===\n");
    prompt.push_str(&format!("Name: {}\n", patient.name));
    prompt.push_str(&format!("Patient ID: {}\n", patient.patient_id));
    prompt.push_str(&format!("Age: {} years\n", patient.age));
    prompt.push_str(&format!("Sex: {}\n", patient.sex.as_str()));
    if !patient.clinical_note.is_empty() {
        prompt.push_str(&format!("Clinical note: {}\n", patient.clinical_note));
    }
    if !patient.symptoms.is_empty() {
        prompt.push_str(&format!("Symptoms: {}\n", patient.symptoms));
    }

    prompt.push_str("\n=== Analysis ===\n");
    prompt.push_str(&format!("Diagnosis: {}\n", result.diagnosis.as_str()));
    prompt.push_str(&format!(
        "Confidence: {:.1}%\n",
        result.confidence * 100.0
    ));
    prompt.push_str(&format!(
        "Processing time: {:.2} seconds\n",
        result.processing_time
    ));
    prompt.push_str(&format!("Analyzed at: {}\n", result.timestamp.to_rfc3339()));

    if let Some(detailed) = &result.detailed_analysis {
        prompt.push_str("\n=== Detailed findings ===\n");
        prompt.push_str(&format!(
            "Overall impression: {}\n",
            detailed.overall_impression
        ));
        prompt.push_str(&format!(
            "Fracture analysis: {}\n",
            detailed.detailed_findings.fracture_analysis
        ));
        prompt.push_str(&format!(
            "Recommended follow-up: {}\n",
            detailed.recommended_follow_up
        ));
    }

    prompt
}

pub struct CaseConsult {
    http: reqwest::Client,
    settings: ConsultSettings,
    system_prompt: String,
    history: Vec<ChatMessage>,
}

impl CaseConsult {
    pub fn new(
        settings: ConsultSettings,
        patient: &PatientSnapshot,
        result: &ResultSnapshot,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            settings,
            system_prompt: build_case_prompt(patient, result),
            history: Vec::new(),
        })
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Send a question in the context of this case. On success, both the
    /// question and the reply join the history; a failed request leaves
    /// the history untouched.
    pub async fn ask(&mut self, question: &str) -> Result<ChatMessage> {
        let mut messages = vec![WireMessage {
            role: "system",
            content: &self.system_prompt,
        }];
        for message in &self.history {
            messages.push(WireMessage {
                role: message.role.as_wire_str(),
                content: &message.content,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: question,
        });

        let request = CompletionRequest {
            model: &self.settings.model,
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let mut builder = self.http.post(&self.settings.api_url).json(&request);
        if let Some(api_key) = &self.settings.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .context("consultation service unreachable")?;
        if !response.status().is_success() {
            bail!("consultation request failed: {}", response.status());
        }

        let body: CompletionResponse = response
            .json()
            .await
            .context("invalid consultation response")?;
        let Some(choice) = body.choices.into_iter().next() else {
            bail!("consultation response contained no choices");
        };

        self.history
            .push(ChatMessage::new(ChatRole::User, question.to_string()));
        let reply = ChatMessage::new(ChatRole::Assistant, choice.message.content);
        self.history.push(reply.clone());
        Ok(reply)
    }
}
