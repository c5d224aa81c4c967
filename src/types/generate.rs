//! Options for a single completion request.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::parameter::ParameterName;

/// Options sent alongside a prompt to the completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Endpoint identifier, `model@provider`.
    pub model: String,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Sampling temperature (0.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Sequences where generation should stop.
    #[serde(default, rename = "stop", skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,

    /// Seed for deterministic generation (where supported).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Additional provider parameters, flattened into the request body.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerateOptions {
    /// Create options for the given endpoint identifier.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: Vec::new(),
            seed: None,
            extra: Map::new(),
        }
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Add a single stop sequence.
    pub fn stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.stop_sequences.push(sequence.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set an additional parameter by name.
    pub fn extra(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Parameters that are set in these options, extras included.
    ///
    /// Used to validate against an adapter's declared parameters.
    pub fn set_parameters(&self) -> Vec<ParameterName> {
        let mut params = Vec::new();
        if self.max_tokens.is_some() {
            params.push(ParameterName::MaxTokens);
        }
        if self.temperature.is_some() {
            params.push(ParameterName::Temperature);
        }
        if self.top_p.is_some() {
            params.push(ParameterName::TopP);
        }
        if !self.stop_sequences.is_empty() {
            params.push(ParameterName::Stop);
        }
        if self.seed.is_some() {
            params.push(ParameterName::Seed);
        }
        params.extend(self.extra.keys().map(|k| {
            let Ok(name) = k.parse::<ParameterName>();
            name
        }));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_parameters_empty_by_default() {
        assert!(GenerateOptions::new("m@p").set_parameters().is_empty());
    }

    #[test]
    fn set_parameters_tracks_fields_and_extras() {
        let opts = GenerateOptions::new("m@p")
            .max_tokens(100)
            .temperature(0.2)
            .extra("presence_penalty", json!(0.5))
            .extra("logit_bias", json!({}));
        let params = opts.set_parameters();
        assert!(params.contains(&ParameterName::MaxTokens));
        assert!(params.contains(&ParameterName::Temperature));
        assert!(params.contains(&ParameterName::PresencePenalty));
        assert!(params.contains(&ParameterName::Custom("logit_bias".into())));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn extras_flatten_into_request_body() {
        let opts = GenerateOptions::new("m@p")
            .stop_sequence("\n\n")
            .extra("frequency_penalty", json!(0.1));
        let body = serde_json::to_value(&opts).unwrap();
        assert_eq!(body["model"], "m@p");
        assert_eq!(body["stop"], json!(["\n\n"]));
        assert_eq!(body["frequency_penalty"], 0.1);
        assert!(body.get("max_tokens").is_none());
    }
}
