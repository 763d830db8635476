//! Events emitted by the clear detector, and the sink that receives them

use std::collections::VecDeque;
use std::time::Instant;

use super::state::ClearState;

/// First line of every fresh log
pub const STARTUP_MESSAGE: &str = "Detector started";

/// Default suffix appended to the clear count
pub const DEFAULT_SUFFIX: &str = " clears";

/// Lines kept by a [`ClearLog`] before the oldest are dropped
pub const DEFAULT_MAX_LINES: usize = 500;

/// Event emitted when a rule fires
#[derive(Debug, Clone)]
pub struct ClearEvent {
    /// Label of the rule that fired
    pub label: String,
    /// State before the transition
    pub from: ClearState,
    /// State after the transition
    pub to: ClearState,
    /// Capture time of the frame that fired the rule
    pub timestamp: Instant,
}

impl ClearEvent {
    /// Create an event
    pub fn new(label: impl Into<String>, from: ClearState, to: ClearState, timestamp: Instant) -> Self {
        Self {
            label: label.into(),
            from,
            to,
            timestamp,
        }
    }
}

/// Receives log lines and counter updates from the state machine.
///
/// Called synchronously from inside a step.
pub trait ClearSink {
    /// Record a human-readable message
    fn push_log(&mut self, message: &str);

    /// Count one more clear
    fn increment_counter(&mut self);
}

/// In-memory log and clear counter
#[derive(Debug, Clone)]
pub struct ClearLog {
    /// Newest first, at most `max_lines` long
    lines: VecDeque<String>,
    max_lines: usize,
    clears: u64,
    suffix: String,
}

impl ClearLog {
    /// Counter starting at zero
    pub fn new() -> Self {
        Self::with_counter(0, DEFAULT_SUFFIX)
    }

    /// Counter starting at `initial`, rendered with `suffix`
    pub fn with_counter(initial: u64, suffix: impl Into<String>) -> Self {
        let mut lines = VecDeque::with_capacity(DEFAULT_MAX_LINES);
        lines.push_front(STARTUP_MESSAGE.to_string());
        Self {
            lines,
            max_lines: DEFAULT_MAX_LINES,
            clears: initial,
            suffix: suffix.into(),
        }
    }

    /// Keep at most `max_lines` lines (at least one)
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines.max(1);
        self.lines.truncate(self.max_lines);
        self
    }

    /// Maximum number of lines kept
    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Current clear count
    pub fn clears(&self) -> u64 {
        self.clears
    }

    /// Overwrite the counter, e.g. after a manual correction
    pub fn set_clears(&mut self, clears: u64) {
        self.clears = clears;
    }

    /// Log lines, newest first
    pub fn lines(&self) -> &VecDeque<String> {
        &self.lines
    }

    /// Most recent line
    pub fn last(&self) -> Option<&str> {
        self.lines.front().map(String::as_str)
    }

    /// Counter text for an overlay, e.g. `1,234 clears`
    pub fn display_text(&self) -> String {
        format!("{}{}", group_thousands(self.clears), self.suffix)
    }
}

impl Default for ClearLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ClearSink for ClearLog {
    fn push_log(&mut self, message: &str) {
        log::info!("{}", message);
        self.lines.push_front(message.to_string());
        self.lines.truncate(self.max_lines);
    }

    fn increment_counter(&mut self) {
        self.clears += 1;
        log::debug!("Clear count: {}", self.clears);
    }
}

/// Format with comma thousands separators
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
