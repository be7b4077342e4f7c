//! Linear issue-state grader.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::{Grader, Subscore};
use crate::error::GradeError;
use crate::services::LinearService;

/// Scores 1.0 when an issue whose title contains a needle is in a state type.
pub struct LinearIssueGrader {
    linear: Arc<dyn LinearService>,
    title_contains: String,
    state_type: String,
    weight: f64,
}

impl LinearIssueGrader {
    pub fn new(
        linear: Arc<dyn LinearService>,
        title_contains: impl Into<String>,
        state_type: impl Into<String>,
        weight: f64,
    ) -> Self {
        Self {
            linear,
            title_contains: title_contains.into(),
            state_type: state_type.into(),
            weight,
        }
    }
}

#[async_trait]
impl Grader for LinearIssueGrader {
    fn name(&self) -> &str {
        "linear_issue"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn evaluate(&self) -> Result<Subscore, GradeError> {
        let needle = self.title_contains.to_lowercase();
        let issues = self.linear.issues().await?;
        let candidates: Vec<_> = issues
            .iter()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .collect();
        let matched = candidates
            .iter()
            .find(|i| i.state.state_type == self.state_type);

        let value = if matched.is_some() { 1.0 } else { 0.0 };
        Ok(Subscore::new(self.name(), self.weight, value).with_info(json!({
            "title_contains": self.title_contains,
            "expected_state_type": self.state_type,
            "matched_issue": matched.map(|i| i.identifier.clone()),
            "candidates": candidates
                .iter()
                .map(|i| json!({ "id": i.id, "title": i.title, "state": i.state.name }))
                .collect::<Vec<_>>(),
        })))
    }
}
