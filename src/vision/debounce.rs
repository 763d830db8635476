//! Stable-signal filter
//!
//! A single positive frame is not trusted. The child has to fire at least
//! `min_count` times inside a trailing window before the filter reports a
//! match.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::bitmap::BitmapView;
use super::detector::Detector;
use crate::Result;

/// Default trailing window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(7);

/// Default number of positives required inside the window
pub const DEFAULT_MIN_COUNT: usize = 5;

/// Debounce wrapper around another detector
#[derive(Debug)]
pub struct DebounceDetector {
    inner: Box<Detector>,
    window: Duration,
    min_count: usize,
    /// Capture times of recent child positives, oldest first
    history: VecDeque<Instant>,
}

impl DebounceDetector {
    /// Wrap with the default window and count
    pub fn new(inner: Detector) -> Self {
        Self::with_window(inner, DEFAULT_WINDOW, DEFAULT_MIN_COUNT)
    }

    /// Wrap with an explicit window and count (`min_count` is at least 1)
    pub fn with_window(inner: Detector, window: Duration, min_count: usize) -> Self {
        let min_count = min_count.max(1);
        Self {
            inner: Box::new(inner),
            window,
            min_count,
            history: VecDeque::with_capacity(min_count),
        }
    }

    /// Trailing window positives must fall in
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Positives required inside the window
    pub fn min_count(&self) -> usize {
        self.min_count
    }

    /// Number of positives currently remembered
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Evaluate against a frame.
    ///
    /// A negative from the child returns false without touching the history.
    pub fn evaluate(&mut self, view: &BitmapView) -> Result<bool> {
        if !self.inner.evaluate(view)? {
            return Ok(false);
        }

        let now = view.captured_at();
        self.history.push_back(now);

        while let Some(&oldest) = self.history.front() {
            let expired = now.saturating_duration_since(oldest) > self.window;
            // Only the newest `min_count` entries can decide the result
            if expired || self.history.len() > self.min_count {
                self.history.pop_front();
            } else {
                break;
            }
        }

        Ok(self.history.len() >= self.min_count)
    }

    /// Clear the history, including that of nested filters
    pub fn reset(&mut self) {
        self.history.clear();
        self.inner.reset();
    }
}
