use std::collections::HashSet;

/// One retrievable slice of policy text, as an OCR/ingest pipeline would
/// produce it from the insured's policy documents.
#[derive(Debug, Clone)]
pub struct PolicyClause {
    pub id: &'static str,
    pub section: &'static str,
    pub content: &'static str,
}

/// In-memory clause library backing the mock consultation flow.
pub struct ClauseBase {
    clauses: Vec<PolicyClause>,
}

// Words too common to carry meaning in a clause lookup.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "not", "any", "all", "this", "that", "with",
    "under", "must", "has", "have", "its", "each", "other", "than", "into",
    "out", "was", "were", "you", "your", "how", "what", "when", "where",
    "why", "who", "can", "does", "will", "from",
];

impl ClauseBase {
    pub fn builtin() -> Self {
        Self {
            clauses: vec![
                PolicyClause {
                    id: "doc_001",
                    section: "Public Liability - Article 3",
                    content: "A third party under this policy means any person other than \
                              the insured and the insured's employees.",
                },
                PolicyClause {
                    id: "doc_002",
                    section: "Public Liability - Exclusions, Clause 2.3",
                    content: "Where an elevator or escalator failure injures a third party, \
                              the insurer bears no liability if the insured skipped the \
                              statutory periodic inspection of the equipment.",
                },
                PolicyClause {
                    id: "doc_003",
                    section: "Employer Liability - Scope of Compensation",
                    content: "Injuries from a work accident during working hours at the \
                              workplace fall under work-injury liability and are compensated \
                              as agreed in the schedule.",
                },
                PolicyClause {
                    id: "doc_004",
                    section: "Property All Risks - Deductible",
                    content: "Each loss carries an absolute deductible of CNY 2,000 or 10 \
                              percent of the loss amount, whichever is higher.",
                },
                PolicyClause {
                    id: "doc_005",
                    section: "Special Equipment Safety Law, Article 38",
                    content: "Special equipment in service, including every elevator, must \
                              pass periodic inspection; equipment that fails or misses an \
                              inspection must be taken out of service.",
                },
            ],
        }
    }

    /// Keyword set used for similarity scoring: lowercased alphanumeric
    /// words of three letters or more, minus stopwords.
    pub fn keywords(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
            .map(str::to_string)
            .collect()
    }

    fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let intersection = a.intersection(b).count();
        let union = a.union(b).count();
        intersection as f64 / union as f64
    }

    /// Top `k` clauses by keyword overlap with `query`. When fewer than `k`
    /// clauses score at all, the leading clauses pad the result so callers
    /// always get `k` sections to stage and cite.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<&PolicyClause> {
        let query_kws = Self::keywords(query);

        let mut scored: Vec<(f64, &PolicyClause)> = self
            .clauses
            .iter()
            .map(|clause| (Self::jaccard(&query_kws, &Self::keywords(clause.content)), clause))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut results: Vec<&PolicyClause> = scored.into_iter().take(k).map(|(_, c)| c).collect();
        for clause in &self.clauses {
            if results.len() >= k {
                break;
            }
            if !results.iter().any(|c| c.id == clause.id) {
                results.push(clause);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_drop_stopwords_and_short_words() {
        let kws = ClauseBase::keywords("The elevator is broken, can we claim?");
        assert!(kws.contains("elevator"));
        assert!(kws.contains("broken"));
        assert!(kws.contains("claim"));
        assert!(!kws.contains("the"));
        assert!(!kws.contains("can"));
        assert!(!kws.contains("is"));
        assert!(!kws.contains("we"));
    }

    #[test]
    fn elevator_question_retrieves_both_elevator_clauses() {
        let base = ClauseBase::builtin();
        let results = base.retrieve("The elevator broke down and trapped a resident, is that covered?", 2);
        assert_eq!(results.len(), 2);
        let ids: Vec<&str> = results.iter().map(|c| c.id).collect();
        assert!(ids.contains(&"doc_002"));
        assert!(ids.contains(&"doc_005"));
    }

    #[test]
    fn deductible_question_ranks_the_deductible_clause_first() {
        let base = ClauseBase::builtin();
        let results = base.retrieve("How much is the deductible on a property loss?", 2);
        assert_eq!(results[0].id, "doc_004");
    }

    #[test]
    fn unmatched_query_falls_back_to_leading_clauses() {
        let base = ClauseBase::builtin();
        let results = base.retrieve("hello there", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "doc_001");
        assert_eq!(results[1].id, "doc_002");
    }

    #[test]
    fn retrieve_respects_k() {
        let base = ClauseBase::builtin();
        assert_eq!(base.retrieve("elevator inspection liability", 1).len(), 1);
        assert_eq!(base.retrieve("elevator inspection liability", 3).len(), 3);
    }
}
