//! Grading primitives.
//!
//! A scenario's grade is a weighted sum of subscores, one per grader. Each
//! grader reports a value in `[0, 1]`; the weights of a scenario's graders
//! sum to 1.0, so a perfect run scores exactly 1.0.

pub mod agentic;
pub mod bash;
pub mod linear;
pub mod rubric;

pub use agentic::{AgenticConfig, AgenticCriterion, AgenticGrader};
pub use bash::BashGrader;
pub use linear::LinearIssueGrader;
pub use rubric::{GitHubLogRubricGrader, LinearLogRubricGrader};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GradeError;

/// The result of one grader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscore {
    pub name: String,
    pub weight: f64,
    /// Value in `[0, 1]`.
    pub value: f64,
    /// Grader-specific detail (command output, model reasoning, ...).
    #[serde(default)]
    pub info: Value,
}

impl Subscore {
    pub fn new(name: impl Into<String>, weight: f64, value: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            value: value.clamp(0.0, 1.0),
            info: Value::Null,
        }
    }

    pub fn with_info(mut self, info: Value) -> Self {
        self.info = info;
        self
    }

    pub fn passed(&self) -> bool {
        self.value >= 1.0
    }
}

/// A weighted grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub score: f64,
    pub subscores: Vec<Subscore>,
}

impl Grade {
    /// Combine subscores into `score = Σ weight × value`.
    pub fn from_subscores(subscores: Vec<Subscore>) -> Result<Self, GradeError> {
        if let Some(bad) = subscores.iter().find(|s| s.weight < 0.0 || s.weight.is_nan()) {
            return Err(GradeError::NegativeWeight {
                name: bad.name.clone(),
                weight: bad.weight,
            });
        }
        let score = subscores.iter().map(|s| s.weight * s.value).sum();
        Ok(Self { score, subscores })
    }

    /// Whether the grade reaches a perfect score, tolerating float noise.
    pub fn is_perfect(&self) -> bool {
        self.score >= 1.0 - 1e-9
    }
}

/// A single grading check.
#[async_trait]
pub trait Grader: Send + Sync {
    fn name(&self) -> &str;

    fn weight(&self) -> f64;

    async fn evaluate(&self) -> Result<Subscore, GradeError>;
}

/// Run every grader and combine their subscores.
///
/// A grader that errors contributes a zero subscore carrying the error; one
/// failing check does not void the others.
pub async fn grade_all(graders: &[Box<dyn Grader>]) -> Result<Grade, GradeError> {
    let mut subscores = Vec::with_capacity(graders.len());
    for grader in graders {
        let subscore = match grader.evaluate().await {
            Ok(subscore) => subscore,
            Err(e) => {
                tracing::warn!(grader = grader.name(), error = %e, "Grader failed, scoring 0");
                Subscore::new(grader.name(), grader.weight(), 0.0)
                    .with_info(serde_json::json!({ "error": e.to_string() }))
            }
        };
        tracing::info!(
            grader = %subscore.name,
            weight = subscore.weight,
            value = subscore.value,
            "Subscore"
        );
        subscores.push(subscore);
    }
    Grade::from_subscores(subscores)
}
