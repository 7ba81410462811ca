//! Document settings.
//!
//! Settings have a global layer shared by every document variant and one
//! local layer per named variant. [`SwaggerSettings::get_config`] lays the
//! global keys over built-in defaults and the local keys over both, one key
//! at a time, then reads the result as a typed [`SwaggerConfig`].

use crate::error::{Error, Result};
use crate::schema_generator::Schema;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Variant used when a request names none
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Definition name of the default error payload when none is configured
pub const DEFAULT_PAYLOAD_NAME: &str = "ErrorPayload";

/// Raw settings as declared by the host application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwaggerSettings {
    #[serde(default, alias = "SWAGGER_GLOBAL_SETTINGS")]
    pub global: Map<String, Value>,
    #[serde(default, alias = "SWAGGER_LOCAL_SETTINGS")]
    pub configs: BTreeMap<String, Map<String, Value>>,
}

/// Effective settings of one document variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwaggerConfig {
    pub exclude_namespaces: Vec<String>,
    pub exclude_module_paths: Vec<String>,
    pub include_module_paths: Vec<String>,
    pub exclude_url_patterns: Vec<String>,
    pub exclude_url_patterns_names: Vec<String>,
    pub requires_authentication: bool,
    pub requires_superuser: bool,
    /// Prefix stripped from every path; `{version}` is substituted per request
    #[serde(alias = "basePath")]
    pub base_path: String,
    pub info: Value,
    pub host: String,
    pub schemes: Vec<String>,
    #[serde(rename = "securityDefinitions")]
    pub security_definitions: Map<String, Value>,
    pub security: Vec<Value>,
    pub produces: Option<Vec<String>>,
    /// Schema of the error payload attached to every operation as `default`
    pub default_payload_definition: Option<Schema>,
    pub default_payload_definition_name: Option<String>,
    /// Parameter fragments merged into same-named path parameters
    #[serde(alias = "global_parameters_docs")]
    pub global_parametters_docs: IndexMap<String, Map<String, Value>>,
}

impl Default for SwaggerConfig {
    fn default() -> Self {
        Self {
            exclude_namespaces: Vec::new(),
            exclude_module_paths: Vec::new(),
            include_module_paths: Vec::new(),
            exclude_url_patterns: Vec::new(),
            exclude_url_patterns_names: Vec::new(),
            requires_authentication: false,
            requires_superuser: false,
            base_path: String::new(),
            info: json!({ "contact": "" }),
            host: String::new(),
            schemes: Vec::new(),
            security_definitions: Map::new(),
            security: Vec::new(),
            produces: None,
            default_payload_definition: None,
            default_payload_definition_name: None,
            global_parametters_docs: IndexMap::new(),
        }
    }
}

impl SwaggerConfig {
    /// Base path with `{version}` substituted
    pub fn base_path_for(&self, version: Option<&str>) -> String {
        self.base_path.replace("{version}", version.unwrap_or_default())
    }

    /// Name and schema of the default error payload, when one is configured
    pub fn default_payload(&self) -> Option<(&str, &Schema)> {
        let definition = self.default_payload_definition.as_ref()?;
        let name = self
            .default_payload_definition_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_PAYLOAD_NAME);
        Some((name, definition))
    }
}

impl SwaggerSettings {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load settings from a YAML or JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Settings with a single `default` variant
    pub fn single(config: Map<String, Value>) -> Self {
        let mut configs = BTreeMap::new();
        configs.insert(DEFAULT_CONFIG_NAME.to_string(), config);
        Self {
            global: Map::new(),
            configs,
        }
    }

    /// Effective settings of the variant `name` (`default` when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownConfiguration`] for undeclared variants and
    /// [`Error::Configuration`] when a value has the wrong shape.
    pub fn get_config(&self, name: Option<&str>) -> Result<SwaggerConfig> {
        let name = name.filter(|name| !name.is_empty()).unwrap_or(DEFAULT_CONFIG_NAME);
        let local = self
            .configs
            .get(name)
            .ok_or_else(|| Error::UnknownConfiguration(name.to_string()))?;

        let mut layered = Map::new();
        for (key, value) in self.global.iter().chain(local.iter()) {
            layered.insert(canonical_key(key).to_string(), value.clone());
        }

        debug!("Layered {} settings keys for {}", layered.len(), name);
        serde_json::from_value(Value::Object(layered))
            .map_err(|e| Error::Configuration(format!("invalid settings for {}: {}", name, e)))
    }
}

/// Aliased keys collapse onto one name so a local layer replaces a global one
fn canonical_key(key: &str) -> &str {
    match key {
        "basePath" => "base_path",
        "global_parameters_docs" => "global_parametters_docs",
        other => other,
    }
}
