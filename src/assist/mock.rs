use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;

use super::{Answer, DocumentRecognizer, QuestionAnswerer, RecognizedDocument};
use crate::app::ChatMessage;
use crate::knowledge::{ClauseBase, PolicyClause};

/// Delay before each staged retrieval hit is reported.
const STAGE_DELAY: Duration = Duration::from_millis(1000);
/// Remaining delay between the last hit and the composed answer.
const COMPOSE_DELAY: Duration = Duration::from_millis(1500);
/// Fixed recognition delay for a scanned document.
const SCAN_DELAY: Duration = Duration::from_millis(2000);

/// How many clauses the mock retrieves, stages, and cites per question.
const TOP_K: usize = 2;

/// Deterministic stand-in for the retrieval and recognition services.
/// Retrieval runs for real against the built-in clause base; the timings
/// and the recognized invoice are fixed.
pub struct MockAssist {
    clauses: ClauseBase,
}

impl MockAssist {
    pub fn new() -> Self {
        Self {
            clauses: ClauseBase::builtin(),
        }
    }

    fn compose(question: &str, retrieved: &[&PolicyClause]) -> String {
        let q = question.to_lowercase();
        if q.contains("elevator") || q.contains("escalator") || q.contains("lift") {
            "Under the policy terms, a failure caused by improper elevator maintenance \
             (a special-equipment liability) that injures people or damages property \
             normally falls within the scope of public liability cover. You will need \
             to provide the equipment's current periodic inspection certificate."
                .to_string()
        } else if q.contains("deductible") || q.contains("excess") {
            "Under the property all risks deductible clause, each loss carries an \
             absolute deductible of CNY 2,000 or 10 percent of the loss amount, \
             whichever is higher; that amount is subtracted during settlement."
                .to_string()
        } else if let Some(top) = retrieved.first() {
            format!("According to {}: {}", top.section, top.content)
        } else {
            "No matching clause was found in the policy library for this question."
                .to_string()
        }
    }
}

#[async_trait]
impl QuestionAnswerer for MockAssist {
    async fn answer(
        &self,
        question: &str,
        _history: &[ChatMessage],
        sources: UnboundedSender<String>,
    ) -> Result<Answer> {
        let retrieved = self.clauses.retrieve(question, TOP_K);

        for clause in &retrieved {
            sleep(STAGE_DELAY).await;
            let _ = sources.send(clause.section.to_string());
        }
        sleep(COMPOSE_DELAY).await;

        let text = Self::compose(question, &retrieved);
        let citations = retrieved.iter().map(|c| c.section.to_string()).collect();
        Ok(Answer { text, citations })
    }
}

#[async_trait]
impl DocumentRecognizer for MockAssist {
    async fn recognize(&self, _image: &str) -> Result<RecognizedDocument> {
        sleep(SCAN_DELAY).await;
        Ok(RecognizedDocument {
            document_type: "Medical invoice".to_string(),
            amount: 800.0,
            date: "2024-05-20".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn answer_follows_the_staged_timing() {
        let mock = MockAssist::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let start = tokio::time::Instant::now();
        let answer = mock
            .answer("The elevator broke down and trapped a resident, is that covered?", &[], tx)
            .await
            .unwrap();

        // Two hits at +1s and +2s, answer at +3.5s total.
        assert_eq!(start.elapsed(), Duration::from_millis(3500));
        assert_eq!(answer.citations.len(), 2);

        let mut hits = Vec::new();
        while let Ok(section) = rx.try_recv() {
            hits.push(section);
        }
        assert_eq!(hits, answer.citations);
    }

    #[tokio::test(start_paused = true)]
    async fn unmatched_questions_still_stage_two_hits() {
        let mock = MockAssist::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let answer = mock.answer("good morning", &[], tx).await.unwrap();

        assert_eq!(answer.citations.len(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn recognize_takes_the_fixed_delay() {
        let mock = MockAssist::new();

        let start = tokio::time::Instant::now();
        let doc = mock.recognize("site-invoice.jpg").await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert_eq!(doc.document_type, "Medical invoice");
        assert_eq!(doc.date, "2024-05-20");
    }

    #[test]
    fn deductible_questions_get_the_deductible_answer() {
        let base = ClauseBase::builtin();
        let question = "How much is the deductible on a property loss?";
        let retrieved = base.retrieve(question, TOP_K);
        let text = MockAssist::compose(question, &retrieved);
        assert!(text.contains("CNY 2,000"));
    }

    #[test]
    fn generic_questions_quote_the_top_clause() {
        let base = ClauseBase::builtin();
        let question = "Who counts as a third party?";
        let retrieved = base.retrieve(question, TOP_K);
        let text = MockAssist::compose(question, &retrieved);
        assert!(text.starts_with("According to"));
    }
}
