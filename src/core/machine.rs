//! Clear state machine
//!
//! Holds an ordered rule list and the current state. Each step evaluates
//! only the rules whose source is the current state, in declaration order,
//! and applies the first one that fires.

use super::events::{ClearEvent, ClearSink};
use super::rule::ActionRule;
use super::state::ClearState;
use crate::vision::BitmapView;
use crate::Result;

/// Result of one step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// A rule fired and the state changed
    Transitioned(ClearEvent),
    /// No rule fired; the state is unchanged
    NoTransition,
}

impl StepOutcome {
    /// Whether a rule fired
    pub fn is_transition(&self) -> bool {
        matches!(self, StepOutcome::Transitioned(_))
    }
}

/// First-match-wins state machine over [`ActionRule`]s
#[derive(Debug)]
pub struct ClearStateMachine {
    rules: Vec<ActionRule>,
    state: ClearState,
}

impl ClearStateMachine {
    /// Create a machine in [`ClearState::Waiting`]
    pub fn new(rules: Vec<ActionRule>) -> Self {
        Self {
            rules,
            state: ClearState::Waiting,
        }
    }

    /// Current state
    pub fn state(&self) -> ClearState {
        self.state
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// Evaluate one frame.
    ///
    /// A detector error aborts the step and leaves the state untouched.
    /// Rules evaluated before the error may still have updated debounce
    /// history.
    pub fn step(&mut self, view: &BitmapView, sink: &mut dyn ClearSink) -> Result<StepOutcome> {
        let current = self.state;

        for rule in self.rules.iter_mut().filter(|r| r.source() == current) {
            if rule.fire(view, sink)? {
                self.state = rule.target();
                log::debug!("{}: {} -> {}", rule.label(), current, self.state);
                return Ok(StepOutcome::Transitioned(ClearEvent::new(
                    rule.label(),
                    current,
                    self.state,
                    view.captured_at(),
                )));
            }
        }

        Ok(StepOutcome::NoTransition)
    }

    /// Return to [`ClearState::Waiting`] and clear all temporal history
    pub fn reset(&mut self) {
        self.state = ClearState::Waiting;
        for rule in &mut self.rules {
            rule.reset();
        }
        log::info!("Clear state machine reset");
    }
}
