use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::{Answer, DocumentRecognizer, QuestionAnswerer, RecognizedDocument};
use crate::app::{ChatMessage, ChatRole};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct AnswerRequest {
    question: String,
    history: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct AnswerResponse {
    answer: String,
    citations: Vec<String>,
}

#[derive(Serialize)]
struct RecognizeRequest {
    image: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    document_type: String,
    amount: f64,
    date: String,
}

/// HTTP client for a real answer/recognition service. Unlike the mock it
/// reports no interim retrieval hits; citations arrive with the answer.
#[derive(Clone)]
pub struct RemoteAssist {
    client: Client,
    base_url: String,
}

impl RemoteAssist {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl QuestionAnswerer for RemoteAssist {
    async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        _sources: UnboundedSender<String>,
    ) -> Result<Answer> {
        let url = format!("{}/api/answer", self.base_url);

        let request = AnswerRequest {
            question: question.to_string(),
            history: history
                .iter()
                .map(|msg| WireMessage {
                    role: match msg.role {
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    }
                    .to_string(),
                    content: msg.content.clone(),
                })
                .collect(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "answer service returned {}. Check the configured endpoint",
                response.status()
            ));
        }

        let body: AnswerResponse = response.json().await?;
        Ok(Answer {
            text: body.answer,
            citations: body.citations,
        })
    }
}

#[async_trait]
impl DocumentRecognizer for RemoteAssist {
    async fn recognize(&self, image: &str) -> Result<RecognizedDocument> {
        let url = format!("{}/api/recognize", self.base_url);

        let request = RecognizeRequest {
            image: image.to_string(),
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "recognition service returned {}. Check the configured endpoint",
                response.status()
            ));
        }

        let body: RecognizeResponse = response.json().await?;
        Ok(RecognizedDocument {
            document_type: body.document_type,
            amount: body.amount,
            date: body.date,
        })
    }
}
