pub mod mock;
pub mod remote;

pub use mock::MockAssist;
pub use remote::RemoteAssist;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::ChatMessage;

/// Final payload of one consultation exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub citations: Vec<String>,
}

/// Fields extracted from an uploaded claim document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedDocument {
    pub document_type: String,
    pub amount: f64,
    pub date: String,
}

/// Events one consultation cycle produces: staged retrieval annotations
/// while the answer is being prepared, then exactly one terminal event.
#[derive(Debug, Clone)]
pub enum ConsultEvent {
    SourceMatched(String),
    Answered(Answer),
    Failed(String),
}

/// Terminal events of one document-scan cycle.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    Recognized(RecognizedDocument),
    Failed(String),
}

/// Answers policy questions against the conversation so far. Staged
/// retrieval annotations go out through `sources` as they are found;
/// implementations may send none.
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        sources: UnboundedSender<String>,
    ) -> Result<Answer>;
}

/// Extracts structured fields from a claim document image.
#[async_trait]
pub trait DocumentRecognizer: Send + Sync {
    async fn recognize(&self, image: &str) -> Result<RecognizedDocument>;
}

/// Which implementation backs the two capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Mock,
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Mock => "mock",
            Backend::Remote => "remote",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Some(Backend::Mock),
            "remote" => Some(Backend::Remote),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Mock => "simulated",
            Backend::Remote => "remote",
        }
    }
}
