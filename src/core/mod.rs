//! Core clear detection abstractions
//!
//! This module contains the state machine that gates the detectors:
//! - `ClearState` - Where the detector is in the clear sequence
//! - `ActionRule` - A detector bound to a state transition
//! - `ClearStateMachine` - First-match-wins evaluation of the rules
//! - `ClearWatcher` - Tick boundary with post-transition cooldown
//! - `ClearSink` - Receiver for log lines and counter updates

mod events;
mod machine;
mod rule;
mod runner;
mod state;

pub use events::{
    group_thousands, ClearEvent, ClearLog, ClearSink, DEFAULT_MAX_LINES, DEFAULT_SUFFIX, STARTUP_MESSAGE,
};
pub use machine::{ClearStateMachine, StepOutcome};
pub use rule::{ActionRule, RuleHandler, INCREMENT_CLEARS};
pub use runner::{ClearWatcher, TickOutcome, WatcherHandle, DEFAULT_COOLDOWN_TICKS};
pub use state::ClearState;
