// Semantic attribute registry
//
// Telemetry instrumentation looks attributes up by symbolic name. Older
// instrumentation expects the `LLM_*` names, newer code the `gen_ai.*`
// conventions. The registry is owned by the process and handed to whoever
// records telemetry; defaults are only ever added, never overwritten.

use std::collections::BTreeMap;

/// `LLM_*` attribute names and their wire values, back-filled when absent
pub const LLM_ATTRIBUTE_DEFAULTS: [(&str, &str); 7] = [
    ("LLM_REQUEST_MODEL", "llm.request.model"),
    ("LLM_RESPONSE_MODEL", "llm.response.model"),
    ("LLM_SYSTEM", "llm.system"),
    ("LLM_TOKEN_TYPE", "llm.usage.token_type"),
    ("LLM_REQUEST_MAX_TOKENS", "llm.request.max_tokens"),
    ("LLM_REQUEST_TEMPERATURE", "llm.request.temperature"),
    ("LLM_REQUEST_TOP_P", "llm.request.top_p"),
];

/// Gen-AI semantic convention attribute names
/// See: https://opentelemetry.io/docs/specs/semconv/gen-ai/
pub mod gen_ai {
    /// The name of the operation being performed
    pub const OPERATION_NAME: &str = "gen_ai.operation.name";
    /// The name of the GenAI provider
    pub const PROVIDER_NAME: &str = "gen_ai.provider.name";
    /// Agent identifier assigned by the provider
    pub const AGENT_ID: &str = "gen_ai.agent.id";
    /// Human readable agent name
    pub const AGENT_NAME: &str = "gen_ai.agent.name";
    /// The name of the model requested
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    /// Conversation or thread identifier
    pub const CONVERSATION_ID: &str = "gen_ai.conversation.id";
    /// Number of tokens in the input/prompt
    pub const USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
    /// Number of tokens in the output/completion
    pub const USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

    /// Operation names as per semantic conventions
    pub mod operation {
        pub const CHAT: &str = "chat";
        pub const CREATE_AGENT: &str = "create_agent";
        pub const INVOKE_AGENT: &str = "invoke_agent";
    }

    /// Provider names as per semantic conventions
    pub mod provider {
        pub const AZURE_AI_AGENTS: &str = "azure.ai.agents";
    }
}

/// Process-owned mapping from symbolic attribute name to attribute key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SemanticAttributes {
    entries: BTreeMap<String, String>,
}

impl SemanticAttributes {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `LLM_*` defaults already applied
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.ensure_defaults();
        registry
    }

    /// Set `name` only if it is not already defined.
    ///
    /// Returns `true` when the value was inserted.
    pub fn insert_missing(&mut self, name: &str, value: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), value.to_string());
        true
    }

    /// Define an attribute, replacing any previous value.
    ///
    /// Used by embedders that bring their own conventions before defaults are applied.
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Back-fill every missing `LLM_*` default. Returns how many were added.
    pub fn ensure_defaults(&mut self) -> usize {
        LLM_ATTRIBUTE_DEFAULTS
            .iter()
            .filter(|(name, value)| self.insert_missing(name, value))
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the attribute list for a model request.
    ///
    /// Keys come from the registry; symbolic names missing from it are skipped.
    pub fn request_attributes(&self, system: &str, model: &str) -> Vec<(String, String)> {
        [("LLM_SYSTEM", system), ("LLM_REQUEST_MODEL", model)]
            .iter()
            .filter_map(|(name, value)| {
                self.get(name)
                    .map(|key| (key.to_string(), (*value).to_string()))
            })
            .collect()
    }

    /// Build the attribute list for a model response
    pub fn response_attributes(&self, model: &str) -> Vec<(String, String)> {
        self.get("LLM_RESPONSE_MODEL")
            .map(|key| vec![(key.to_string(), model.to_string())])
            .unwrap_or_default()
    }
}
