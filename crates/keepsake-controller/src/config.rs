use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, ControllerResult};

/// How a broadcast reacts to a failing participant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BroadcastPolicy {
    /// Stop at the first failure and fail the whole operation.
    #[default]
    FailFast,
    /// Log the failure, keep notifying the remaining participants, and let
    /// the operation continue.
    Isolate,
}

/// Configuration for a [`SaveController`](crate::SaveController).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Failure handling for participant broadcasts.
    pub broadcast_policy: BroadcastPolicy,
}

impl ControllerConfig {
    /// Parse from TOML. Missing fields take their defaults.
    pub fn from_toml_str(s: &str) -> ControllerResult<Self> {
        toml::from_str(s).map_err(|e| ControllerError::Config(e.to_string()))
    }
}
