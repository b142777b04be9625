//! Contextual logging fields: correlation id, request id, form id, and
//! the acting operator.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Per-request fields attached to every log line for the duration of a
/// request, threaded through `tracing::Span` rather than passed by value
/// at every call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields: HashMap<String, String>,
}

impl LogContext {
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_form_id(mut self, id: impl Into<String>) -> Self {
        self.form_id = Some(id.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_fields.insert(key.into(), value.into());
        self
    }
}

/// Per-module log-level overrides, scoped to this system's own crates
/// plus the noisy third-party ones worth quieting.
#[derive(Debug, Clone)]
pub struct ModuleLogLevels {
    levels: HashMap<String, tracing::Level>,
    default_level: tracing::Level,
}

impl Default for ModuleLogLevels {
    fn default() -> Self {
        let mut levels = HashMap::new();
        levels.insert("migration_queue".to_string(), tracing::Level::INFO);
        levels.insert("migration_engine".to_string(), tracing::Level::INFO);
        levels.insert("migration_store".to_string(), tracing::Level::INFO);
        levels.insert("sqlx".to_string(), tracing::Level::WARN);
        levels.insert("tower_http".to_string(), tracing::Level::INFO);
        levels.insert("hyper".to_string(), tracing::Level::WARN);

        Self {
            levels,
            default_level: tracing::Level::INFO,
        }
    }
}

impl ModuleLogLevels {
    pub fn get_level(&self, module: &str) -> tracing::Level {
        if let Some(&level) = self.levels.get(module) {
            return level;
        }
        for (prefix, &level) in &self.levels {
            if module.starts_with(prefix.as_str()) {
                return level;
            }
        }
        self.default_level
    }

    pub fn set_level(&mut self, module: impl Into<String>, level: tracing::Level) {
        self.levels.insert(module.into(), level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_set_the_expected_fields() {
        let ctx = LogContext::default()
            .with_correlation_id("corr-1")
            .with_form_id("form-1")
            .with_field("custom", "value");
        assert_eq!(ctx.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(ctx.form_id.as_deref(), Some("form-1"));
        assert_eq!(ctx.custom_fields.get("custom").map(String::as_str), Some("value"));
    }

    #[test]
    fn module_levels_fall_back_to_the_default() {
        let levels = ModuleLogLevels::default();
        assert_eq!(levels.get_level("sqlx"), tracing::Level::WARN);
        assert_eq!(levels.get_level("unknown_module"), tracing::Level::INFO);
    }
}
