//! Generation parameter names and validation policy.
//!
//! Model adapters declare the parameters they accept as a static list of
//! [`ParameterName`]s; requested parameters are checked against that list
//! according to a [`ParameterValidationPolicy`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Well-known parameter names with a `Custom` escape hatch.
///
/// Serializes as a flat string (e.g. `"temperature"`) so it works as a JSON
/// value and as a JSON object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterName {
    Temperature,
    TopP,
    MaxTokens,
    FrequencyPenalty,
    PresencePenalty,
    Seed,
    Stop,
    /// Parameter not in the well-known set.
    Custom(String),
}

impl ParameterName {
    /// Canonical wire name, matching [`GenerateOptions`](crate::types::GenerateOptions) field names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Temperature => "temperature",
            Self::TopP => "top_p",
            Self::MaxTokens => "max_tokens",
            Self::FrequencyPenalty => "frequency_penalty",
            Self::PresencePenalty => "presence_penalty",
            Self::Seed => "seed",
            Self::Stop => "stop",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "temperature" => Self::Temperature,
            "top_p" => Self::TopP,
            "max_tokens" => Self::MaxTokens,
            "frequency_penalty" => Self::FrequencyPenalty,
            "presence_penalty" => Self::PresencePenalty,
            "seed" => Self::Seed,
            "stop" => Self::Stop,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl Serialize for ParameterName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParameterName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(name) = s.parse::<ParameterName>();
        Ok(name)
    }
}

/// How to handle parameters a model adapter doesn't declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterValidationPolicy {
    /// Log a warning and send the parameter anyway.
    #[default]
    Warn,

    /// Fail construction with `UnsupportedParameter`.
    Error,

    /// Send the parameter without comment.
    Ignore,
}
