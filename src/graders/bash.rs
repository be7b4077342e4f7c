//! Exit-code grader.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{Grader, Subscore};
use crate::error::{ExecError, GradeError};
use crate::exec::{truncate, CommandRunner};

/// Default time limit for a grading command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const OUTPUT_LIMIT: usize = 4000;

/// Scores 1.0 when a shell command exits 0, else 0.0.
pub struct BashGrader {
    runner: Arc<dyn CommandRunner>,
    command: String,
    weight: f64,
    timeout: Duration,
}

impl BashGrader {
    pub fn new(runner: Arc<dyn CommandRunner>, command: impl Into<String>, weight: f64) -> Self {
        Self {
            runner,
            command: command.into(),
            weight,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Keep the tail of long output; test summaries print last.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &s[start..])
}

#[async_trait]
impl Grader for BashGrader {
    fn name(&self) -> &str {
        "bash"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn evaluate(&self) -> Result<Subscore, GradeError> {
        match self.runner.run(&self.command, Some(self.timeout)).await {
            Ok(output) => {
                let value = if output.success() { 1.0 } else { 0.0 };
                Ok(Subscore::new(self.name(), self.weight, value).with_info(json!({
                    "command": truncate(&self.command, 500),
                    "exit_code": output.exit_code,
                    "stdout": tail(&output.stdout, OUTPUT_LIMIT),
                    "stderr": tail(&output.stderr, OUTPUT_LIMIT),
                })))
            }
            Err(ExecError::Timeout { seconds, .. }) => {
                tracing::warn!(seconds, "Grading command timed out");
                Ok(Subscore::new(self.name(), self.weight, 0.0).with_info(json!({
                    "command": truncate(&self.command, 500),
                    "timed_out": true,
                    "timeout_seconds": seconds,
                })))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::LocalRunner;

    #[tokio::test]
    async fn test_passing_command() {
        let grader = BashGrader::new(Arc::new(LocalRunner), "echo ok", 0.8);
        let sub = grader.evaluate().await.unwrap();
        assert_eq!(sub.value, 1.0);
        assert_eq!(sub.weight, 0.8);
        assert_eq!(sub.info["exit_code"], 0);
    }

    #[tokio::test]
    async fn test_failing_command() {
        let grader = BashGrader::new(Arc::new(LocalRunner), "echo boom >&2; exit 1", 1.0);
        let sub = grader.evaluate().await.unwrap();
        assert_eq!(sub.value, 0.0);
        assert!(sub.info["stderr"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_scores_zero() {
        let grader = BashGrader::new(Arc::new(LocalRunner), "sleep 5", 1.0)
            .with_timeout(Duration::from_millis(100));
        let sub = grader.evaluate().await.unwrap();
        assert_eq!(sub.value, 0.0);
        assert_eq!(sub.info["timed_out"], true);
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("abcdef", 3), "...def");
        assert_eq!(tail("abc", 10), "abc");
    }
}
