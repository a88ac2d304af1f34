//! Confirmation gate for state-changing actions

use async_trait::async_trait;
use serde::Serialize;

use crate::decision::ActionDecision;

/// Human (or policy) answer to a proposed action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    /// `y`: perform the action
    Approve,
    /// `n`: do not perform it; the loop continues
    Reject,
    /// `s`: move to the next element instead
    Skip,
}

impl GateVerdict {
    /// Parse a `y`/`n`/`s` answer; anything else is `None`
    pub fn from_answer(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(GateVerdict::Approve),
            "n" | "no" => Some(GateVerdict::Reject),
            "s" | "skip" => Some(GateVerdict::Skip),
            _ => None,
        }
    }
}

/// Consulted before `activate` and `type` are dispatched
#[async_trait]
pub trait ActionGate: Send + Sync {
    async fn review(&self, step: usize, decision: &ActionDecision) -> GateVerdict;
}

/// Approves everything; the non-interactive default
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ActionGate for AutoApprove {
    async fn review(&self, _step: usize, _decision: &ActionDecision) -> GateVerdict {
        GateVerdict::Approve
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ActionKind;

    #[test]
    fn test_from_answer() {
        assert_eq!(GateVerdict::from_answer("y"), Some(GateVerdict::Approve));
        assert_eq!(GateVerdict::from_answer(" Y \n"), Some(GateVerdict::Approve));
        assert_eq!(GateVerdict::from_answer("n"), Some(GateVerdict::Reject));
        assert_eq!(GateVerdict::from_answer("s"), Some(GateVerdict::Skip));
        assert_eq!(GateVerdict::from_answer("maybe"), None);
        assert_eq!(GateVerdict::from_answer(""), None);
    }

    #[tokio::test]
    async fn test_auto_approve() {
        let decision = ActionDecision::new(ActionKind::Activate, "press search");
        assert_eq!(AutoApprove.review(0, &decision).await, GateVerdict::Approve);
    }
}
