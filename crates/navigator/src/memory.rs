//! Rolling memory of what the reader said and what the loop did

use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::trace;

use crate::decision::ActionKind;

/// Default number of observations kept
pub const DEFAULT_OBSERVATION_CAPACITY: usize = 16;

/// Default number of actions kept
pub const DEFAULT_ACTION_CAPACITY: usize = 16;

/// One phrase read from the screen reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub text: String,
    pub step_index: usize,
    /// False when identical text was already observed in this run
    pub first_seen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum ActionOutcome {
    Performed,
    Failed(String),
    /// Declined at the confirmation gate
    Rejected,
    /// Replaced by `next` at the confirmation gate
    Skipped,
    /// Nothing to do, e.g. `type` without text
    NoOp,
}

/// One dispatched (or attempted) action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRecord {
    pub step: usize,
    /// None when the step failed before a decision was made
    pub kind: Option<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ActionRecord {
    pub fn new(step: usize, kind: ActionKind, outcome: ActionOutcome) -> Self {
        Self {
            step,
            kind: Some(kind),
            parameter: None,
            outcome,
            note: None,
        }
    }

    /// A step that failed before any action could be chosen
    pub fn failure(step: usize, reason: impl Into<String>) -> Self {
        Self {
            step,
            kind: None,
            parameter: None,
            outcome: ActionOutcome::Failed(reason.into()),
            note: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Option<&str>) -> Self {
        self.parameter = parameter.map(str::to_string);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Failed(_))
    }
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {}: ", self.step)?;
        match self.kind {
            Some(kind) => write!(f, "{}", kind)?,
            None => f.write_str("read")?,
        }
        if let Some(parameter) = &self.parameter {
            write!(f, " {:?}", parameter)?;
        }
        match &self.outcome {
            ActionOutcome::Performed => {}
            ActionOutcome::Failed(reason) => write!(f, " FAILED: {}", reason)?,
            ActionOutcome::Rejected => f.write_str(" (rejected)")?,
            ActionOutcome::Skipped => f.write_str(" (skipped)")?,
            ActionOutcome::NoOp => f.write_str(" (no-op)")?,
        }
        if let Some(note) = &self.note {
            write!(f, " [{}]", note)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEntry {
    Observation(Observation),
    Action(ActionRecord),
}

/// Fixed-capacity FIFO log of observations and actions.
///
/// Observations and actions are evicted independently, oldest first.
/// `has_seen` remembers every observed text for the whole run, so a phrase
/// that scrolled out of the window is still reported as not first seen.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    observations: VecDeque<Observation>,
    actions: VecDeque<ActionRecord>,
    observation_capacity: usize,
    action_capacity: usize,
    seen: HashSet<String>,
}

impl Default for MemoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_OBSERVATION_CAPACITY, DEFAULT_ACTION_CAPACITY)
    }
}

impl MemoryBuffer {
    /// Capacities below one are raised to one
    pub fn new(observation_capacity: usize, action_capacity: usize) -> Self {
        let observation_capacity = observation_capacity.max(1);
        let action_capacity = action_capacity.max(1);
        Self {
            observations: VecDeque::with_capacity(observation_capacity),
            actions: VecDeque::with_capacity(action_capacity),
            observation_capacity,
            action_capacity,
            seen: HashSet::new(),
        }
    }

    pub fn append(&mut self, entry: MemoryEntry) {
        match entry {
            MemoryEntry::Observation(observation) => {
                self.seen.insert(observation.text.clone());
                if self.observations.len() == self.observation_capacity {
                    self.observations.pop_front();
                }
                self.observations.push_back(observation);
            }
            MemoryEntry::Action(record) => {
                if self.actions.len() == self.action_capacity {
                    self.actions.pop_front();
                }
                self.actions.push_back(record);
            }
        }
    }

    /// Build and append an observation, computing `first_seen` first
    pub fn record_observation(&mut self, text: impl Into<String>, step_index: usize) -> Observation {
        let text = text.into();
        let observation = Observation {
            first_seen: !self.has_seen(&text),
            text,
            step_index,
        };
        trace!(
            "◆ Observation {} (first_seen={})",
            step_index,
            observation.first_seen
        );
        self.append(MemoryEntry::Observation(observation.clone()));
        observation
    }

    pub fn record_action(&mut self, record: ActionRecord) {
        self.append(MemoryEntry::Action(record));
    }

    /// Up to `k` most recent observations, oldest first
    pub fn recent_observations(&self, k: usize) -> Vec<&Observation> {
        let skip = self.observations.len().saturating_sub(k);
        self.observations.iter().skip(skip).collect()
    }

    /// Up to `k` most recent actions, oldest first
    pub fn recent_actions(&self, k: usize) -> Vec<&ActionRecord> {
        let skip = self.actions.len().saturating_sub(k);
        self.actions.iter().skip(skip).collect()
    }

    /// Exact-match lookup within the retained observations
    pub fn contains(&self, text: &str) -> bool {
        self.observations.iter().any(|o| o.text == text)
    }

    /// Exact-match lookup over every observation appended so far
    pub fn has_seen(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    pub fn observation_count(&self) -> usize {
        self.observations.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn observation_capacity(&self) -> usize {
        self.observation_capacity
    }

    pub fn action_capacity(&self) -> usize {
        self.action_capacity
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty() && self.actions.is_empty()
    }
}
