//! Global fields configuration

use serde::{Deserialize, Serialize};

/// Global fields recorded on the root span
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fields {
    /// Service name
    pub service: Option<String>,
    /// Environment (dev/staging/prod)
    pub env: Option<String>,
    /// Version
    pub version: Option<String>,
    /// Custom fields
    #[serde(flatten)]
    pub custom: std::collections::BTreeMap<String, serde_json::Value>,
}

impl Fields {
    /// Create fields from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            service: std::env::var("SL_SERVICE").ok(),
            env: std::env::var("SL_ENV").ok(),
            version: std::env::var("SL_VERSION")
                .ok()
                .or_else(|| option_env!("CARGO_PKG_VERSION").map(String::from)),
            custom: std::collections::BTreeMap::default(),
        }
    }

    /// Check if fields are empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service.is_none() && self.env.is_none() && self.version.is_none() && self.custom.is_empty()
    }

    /// Custom fields rendered as `key=value` pairs
    #[must_use]
    pub fn custom_summary(&self) -> String {
        self.custom
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fields_are_empty() {
        assert!(Fields::default().is_empty());
    }

    #[test]
    fn test_custom_summary() {
        let mut fields = Fields::default();
        fields.custom.insert("shard".into(), serde_json::json!(3));
        fields.custom.insert("arena".into(), serde_json::json!("scratch"));
        assert!(!fields.is_empty());
        assert_eq!(fields.custom_summary(), r#"arena="scratch" shard=3"#);
    }
}
