//! Enumerations used by ChRIS resources.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    /// Created, not yet scheduled
    Created,
    /// Waiting on a previous plugin instance
    Waiting,
    /// Submitted to a compute resource
    Scheduled,
    /// Running
    Started,
    /// Output files are being registered
    RegisteringFiles,
    /// Finished with exit code 0
    FinishedSuccessfully,
    /// Finished with an error
    FinishedWithError,
    /// Cancelled by a user
    Cancelled,
}

impl Status {
    /// Statuses after which a plugin instance no longer changes.
    pub const FINISHED: [Self; 3] = [
        Self::FinishedSuccessfully,
        Self::FinishedWithError,
        Self::Cancelled,
    ];

    /// Wire value of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Waiting => "waiting",
            Self::Scheduled => "scheduled",
            Self::Started => "started",
            Self::RegisteringFiles => "registeringFiles",
            Self::FinishedSuccessfully => "finishedSuccessfully",
            Self::FinishedWithError => "finishedWithError",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns true if this status is one of [`Status::FINISHED`].
    #[must_use]
    pub fn is_finished(&self) -> bool {
        Self::FINISHED.contains(self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// Data synthesis: processes the output of a previous plugin instance
    Ds,
    /// Feed synthesis: creates data out of nothing, starting a new feed
    Fs,
    /// Topology: processes the outputs of several plugin instances
    Ts,
}

impl PluginType {
    /// Wire value of this plugin type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ds => "ds",
            Self::Fs => "fs",
            Self::Ts => "ts",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a plugin parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Text
    String,
    /// Integer number
    Integer,
    /// Floating point number
    Float,
    /// Flag
    Boolean,
}

/// Value of a plugin parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Flag value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Text value
    String(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}
