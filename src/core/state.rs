//! Clear detection states

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Where the detector is in the clear sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearState {
    /// Playing; waiting for a course clear
    #[default]
    Waiting,
    /// Clear confirmed; waiting to learn where it happened
    Cleared,
    /// Result screen confirmed. No standard rule enters this state.
    Result,
}

impl FromStr for ClearState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(ClearState::Waiting),
            "cleared" => Ok(ClearState::Cleared),
            "result" => Ok(ClearState::Result),
            _ => Err(ConfigError::Invalid(format!("unknown state '{}'", s))),
        }
    }
}

impl fmt::Display for ClearState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClearState::Waiting => write!(f, "waiting"),
            ClearState::Cleared => write!(f, "cleared"),
            ClearState::Result => write!(f, "result"),
        }
    }
}
