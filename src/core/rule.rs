//! Action rules: a detector bound to a state transition

use std::fmt;

use super::events::ClearSink;
use super::state::ClearState;
use crate::vision::{BitmapView, Detector};
use crate::Result;

/// Side effect run when a rule fires, before its label is logged
pub type RuleHandler = Box<dyn Fn(&mut dyn ClearSink) + Send + Sync>;

/// Handler name that increments the clear counter
pub const INCREMENT_CLEARS: &str = "increment_clears";

/// A detector gated on `source`, moving the machine to `target` when it fires
pub struct ActionRule {
    label: String,
    source: ClearState,
    target: ClearState,
    detector: Detector,
    handler: Option<RuleHandler>,
}

impl ActionRule {
    /// Create a rule without a handler
    pub fn new(
        label: impl Into<String>,
        source: ClearState,
        target: ClearState,
        detector: impl Into<Detector>,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            target,
            detector: detector.into(),
            handler: None,
        }
    }

    /// Attach a side effect
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut dyn ClearSink) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Attach the counter increment
    pub fn counting_clears(self) -> Self {
        self.with_handler(|sink| sink.increment_counter())
    }

    /// Look up a handler by its configuration name
    pub fn named_handler(name: &str) -> Option<RuleHandler> {
        match name {
            INCREMENT_CLEARS => Some(Box::new(|sink: &mut dyn ClearSink| sink.increment_counter())),
            _ => None,
        }
    }

    /// Message logged when the rule fires
    pub fn label(&self) -> &str {
        &self.label
    }

    /// State the rule is evaluated in
    pub fn source(&self) -> ClearState {
        self.source
    }

    /// State the machine moves to when the rule fires
    pub fn target(&self) -> ClearState {
        self.target
    }

    /// Get the rule's detector
    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Whether a side effect is attached
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }

    /// Evaluate the detector; on a match run the handler and log the label
    pub(crate) fn fire(&mut self, view: &BitmapView, sink: &mut dyn ClearSink) -> Result<bool> {
        if !self.detector.evaluate(view)? {
            return Ok(false);
        }
        if let Some(handler) = &self.handler {
            handler(sink);
        }
        sink.push_log(&self.label);
        Ok(true)
    }

    pub(crate) fn reset(&mut self) {
        self.detector.reset();
    }

    pub(crate) fn set_handler(&mut self, handler: Option<RuleHandler>) {
        self.handler = handler;
    }
}

impl fmt::Debug for ActionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRule")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("detector", &self.detector.kind())
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
