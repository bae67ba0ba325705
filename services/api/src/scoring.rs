//! Scoring of submitted answers against the canonical test

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::{SubmittedTest, Test};
use crate::repositories::{TestReader, TestWriter};

/// Scores submissions and counts attempts
#[derive(Clone)]
pub struct ScoringEngine {
    tests: Arc<dyn TestReader>,
    writer: Arc<dyn TestWriter>,
}

impl ScoringEngine {
    pub fn new(tests: Arc<dyn TestReader>, writer: Arc<dyn TestWriter>) -> Self {
        Self { tests, writer }
    }

    /// Record an attempt on `test_id` and score `submission`
    ///
    /// The pass counter is written as the value read plus one, so concurrent
    /// submissions to the same test can lose increments.
    pub async fn submit(&self, test_id: Uuid, submission: &SubmittedTest) -> ApiResult<Option<f64>> {
        let canonical = self.tests.get_test_by_id(test_id).await?;

        self.writer
            .increment_pass_count(test_id, canonical.pass_count + 1)
            .await?;

        let percentage = score(&canonical, submission);
        info!(test_id = %test_id, percentage = ?percentage, "Submission scored");
        Ok(percentage)
    }
}

/// Percentage of name-matched variants whose claimed correctness agrees with the key
///
/// Questions are matched by ID and variants by name. `None` when nothing
/// matched.
pub fn score(canonical: &Test, submission: &SubmittedTest) -> Option<f64> {
    let mut total_answers: u32 = 0;
    let mut total_correct: u32 = 0;

    for question in &canonical.questions {
        let submitted_variants = submission
            .questions
            .iter()
            .filter(|sq| sq.id == question.id)
            .flat_map(|sq| sq.variants.iter());

        for submitted in submitted_variants {
            for variant in question.variants.iter().filter(|v| v.name == submitted.name) {
                total_answers += 1;
                if variant.is_correct == submitted.is_correct {
                    total_correct += 1;
                }
            }
        }
    }

    if total_answers == 0 {
        return None;
    }
    Some(100.0 * f64::from(total_correct) / f64::from(total_answers))
}
