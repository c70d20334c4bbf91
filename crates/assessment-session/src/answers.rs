//! Answer sheet

use std::collections::{BTreeMap, BTreeSet};

/// Sentinel submitted for unanswered questions
pub const NOT_ATTENDED: &str = "notattended";

/// Selected choices plus the marked-for-review set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    answers: BTreeMap<String, String>,
    review_marked: BTreeSet<String>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(answers: BTreeMap<String, String>, review_marked: BTreeSet<String>) -> Self {
        Self {
            answers,
            review_marked,
        }
    }

    /// Record a choice, replacing any earlier one
    pub fn select(&mut self, question_id: impl Into<String>, choice: impl Into<String>) {
        self.answers.insert(question_id.into(), choice.into());
    }

    /// Flip the review mark, returning the new state
    pub fn toggle_review(&mut self, question_id: &str) -> bool {
        if self.review_marked.remove(question_id) {
            false
        } else {
            self.review_marked.insert(question_id.to_string());
            true
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn is_marked(&self, question_id: &str) -> bool {
        self.review_marked.contains(question_id)
    }

    pub fn answered(&self) -> usize {
        self.answers.len()
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    pub fn review_marked(&self) -> &BTreeSet<String> {
        &self.review_marked
    }

    /// One entry per question, unanswered ones set to [`NOT_ATTENDED`]
    ///
    /// Answers for ids outside `question_ids` are dropped.
    pub fn finalize(&self, question_ids: &[String]) -> BTreeMap<String, String> {
        question_ids
            .iter()
            .map(|id| {
                let choice = self
                    .answers
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| NOT_ATTENDED.to_string());
                (id.clone(), choice)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("q{}", i)).collect()
    }

    #[test]
    fn test_select_replaces_choice() {
        let mut sheet = AnswerSheet::new();
        sheet.select("q1", "A");
        sheet.select("q1", "C");
        assert_eq!(sheet.answer("q1"), Some("C"));
        assert_eq!(sheet.answered(), 1);
    }

    #[test]
    fn test_toggle_review() {
        let mut sheet = AnswerSheet::new();
        assert!(sheet.toggle_review("q2"));
        assert!(sheet.is_marked("q2"));
        assert!(!sheet.toggle_review("q2"));
        assert!(!sheet.is_marked("q2"));
    }

    #[test]
    fn test_finalize_fills_sentinel() {
        let mut sheet = AnswerSheet::new();
        sheet.select("q1", "B");
        sheet.select("stale", "D");
        let finalized = sheet.finalize(&ids(3));
        assert_eq!(finalized.len(), 3);
        assert_eq!(finalized["q1"], "B");
        assert_eq!(finalized["q2"], NOT_ATTENDED);
        assert_eq!(finalized["q3"], NOT_ATTENDED);
        assert!(!finalized.contains_key("stale"));
    }

    proptest! {
        #[test]
        fn prop_finalize_has_every_question(
            n in 1usize..60,
            answered in proptest::collection::btree_set(0usize..60, 0..60),
        ) {
            let questions = ids(n);
            let mut sheet = AnswerSheet::new();
            for &i in answered.iter().filter(|&&i| i < n) {
                sheet.select(questions[i].clone(), "A");
            }
            let m = sheet.answered();
            let finalized = sheet.finalize(&questions);
            prop_assert_eq!(finalized.len(), n);
            let unattended = finalized.values().filter(|v| *v == NOT_ATTENDED).count();
            prop_assert_eq!(unattended, n - m);
        }
    }
}
