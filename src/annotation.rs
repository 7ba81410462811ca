//! Override blocks attached to handlers.
//!
//! An [`OverrideObject`] corrects or extends what reflection discovers about
//! an operation. Overrides come from two places:
//!
//! - structured overrides attached at registration ([`crate::handler::HandlerOverrides`])
//! - YAML blocks inside handler and method documentation, introduced by a
//!   `---` line
//!
//! Handler-level blocks may hold keys that apply to every action plus one
//! section per action name. Layers are merged key by key, later layers
//! winning: handler common keys, handler action section, method block,
//! structured handler-wide overrides, structured per-action overrides.

use crate::error::{Error, Result};
use crate::formatting::extract_block;
use crate::handler::Handler;
use crate::schema_generator::Schema;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys an override block understands
pub const RECOGNIZED_KEYS: &[&str] = &[
    "type",
    "serializer",
    "request_serializer",
    "response_serializer",
    "omit_serializer",
    "parameters",
    "parameters_strategy",
    "omit_parameters",
    "responseMessages",
    "security",
    "operationId",
    "tags",
    "produces",
    "swagger_config_name",
    "force_pagination",
    "view_mocker",
];

/// Sentinel of `security` that publishes an operation without requirements
pub const PUBLIC_SECURITY: &str = "public";

/// Parsed overrides for one handler or action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideObject {
    /// Inline response shape, property name to property
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub response_type: Option<IndexMap<String, CustomProperty>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serializer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_serializer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_serializer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omit_serializer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParameterOverride>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_strategy: Option<StrategySpec>,
    /// Parameter locations to leave out entirely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub omit_parameters: Option<Vec<String>>,
    #[serde(rename = "responseMessages", skip_serializing_if = "Option::is_none")]
    pub response_messages: Option<Vec<ResponseMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityOverride>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<String>>,
    /// Only publish the operation in the document variant of this name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swagger_config_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_pagination: Option<bool>,
    /// Registered view mocker applied before the handler's DTO is selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_mocker: Option<String>,
}

/// One property of an inline response shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProperty {
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type", default = "default_type")]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_type() -> String {
    "string".to_string()
}

/// A declared parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterOverride {
    pub name: String,
    /// Location; unknown values fall back to `formData`
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Registered DTO describing the parameter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pytype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemsOverride>,
    #[serde(rename = "collectionFormat", skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
    #[serde(rename = "uniqueItems", skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
}

/// Element type of an array parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemsOverride {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// How declared parameters combine with reflected ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStrategy {
    /// Same-named declared parameters replace reflected ones in place, others are appended
    Merge,
    /// Declared parameters of a location replace every reflected one there
    Replace,
}

impl ParameterStrategy {
    /// Unknown names fall back to `merge`
    pub fn parse(name: &str) -> Self {
        match name {
            "replace" => ParameterStrategy::Replace,
            _ => ParameterStrategy::Merge,
        }
    }
}

/// `parameters_strategy`: one strategy, or one per location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StrategySpec {
    Global(String),
    PerLocation(BTreeMap<String, String>),
}

/// `security`: the `public` keyword or an explicit requirement list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityOverride {
    Keyword(String),
    Requirements(Vec<Value>),
}

/// A declared response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Status code, or `default`
    pub code: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Older spelling of `description`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl ResponseMessage {
    /// Status key of the responses map
    pub fn status(&self) -> String {
        match &self.code {
            Value::String(code) => code.clone(),
            other => other.to_string(),
        }
    }

    pub fn text(&self) -> String {
        self.description
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_default()
    }
}

impl OverrideObject {
    /// Layer `over` on top of `self`; keys set in `over` win
    pub fn merged_with(self, over: &OverrideObject) -> OverrideObject {
        let over = over.clone();
        OverrideObject {
            response_type: over.response_type.or(self.response_type),
            serializer: over.serializer.or(self.serializer),
            request_serializer: over.request_serializer.or(self.request_serializer),
            response_serializer: over.response_serializer.or(self.response_serializer),
            omit_serializer: over.omit_serializer.or(self.omit_serializer),
            parameters: over.parameters.or(self.parameters),
            parameters_strategy: over.parameters_strategy.or(self.parameters_strategy),
            omit_parameters: over.omit_parameters.or(self.omit_parameters),
            response_messages: over.response_messages.or(self.response_messages),
            security: over.security.or(self.security),
            operation_id: over.operation_id.or(self.operation_id),
            tags: over.tags.or(self.tags),
            produces: over.produces.or(self.produces),
            swagger_config_name: over.swagger_config_name.or(self.swagger_config_name),
            force_pagination: over.force_pagination.or(self.force_pagination),
            view_mocker: over.view_mocker.or(self.view_mocker),
        }
    }

    /// Strategy for one parameter location
    pub fn strategy_for(&self, location: &str) -> ParameterStrategy {
        match &self.parameters_strategy {
            Some(StrategySpec::Global(name)) => ParameterStrategy::parse(name),
            Some(StrategySpec::PerLocation(by_location)) => by_location
                .get(location)
                .map(|name| ParameterStrategy::parse(name))
                .unwrap_or(ParameterStrategy::Merge),
            None => ParameterStrategy::Merge,
        }
    }

    pub fn omits_location(&self, location: &str) -> bool {
        self.omit_parameters
            .as_ref()
            .map_or(false, |omitted| omitted.iter().any(|name| name == location))
    }

    pub fn omits_serializer(&self) -> bool {
        self.omit_serializer.unwrap_or(false)
    }

    pub fn forces_pagination(&self) -> bool {
        self.force_pagination.unwrap_or(false)
    }

    /// Operation-level security; `None` leaves the document-level requirements in force
    pub fn security_requirements(&self) -> Option<Vec<Value>> {
        match self.security.as_ref()? {
            SecurityOverride::Keyword(keyword) if keyword == PUBLIC_SECURITY => Some(Vec::new()),
            SecurityOverride::Keyword(keyword) if keyword.is_empty() => None,
            SecurityOverride::Keyword(keyword) => {
                let mut requirement = Map::new();
                requirement.insert(keyword.clone(), Value::Array(Vec::new()));
                Some(vec![Value::Object(requirement)])
            }
            SecurityOverride::Requirements(requirements) if requirements.is_empty() => None,
            SecurityOverride::Requirements(requirements) => Some(requirements.clone()),
        }
    }

    /// Operation id, empty strings counting as absent
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Overrides in force for one action, plus any malformed-block message
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    pub overrides: OverrideObject,
    pub parse_error: Option<String>,
}

/// Parse the override block of a documentation text into a raw key map.
///
/// A text without a block yields an empty map. Malformed YAML, or YAML that
/// is not a mapping, is reported as `Err` with a readable message.
pub fn parse_block(doc: &str) -> std::result::Result<Map<String, Value>, String> {
    let Some(block) = extract_block(doc) else {
        return Ok(Map::new());
    };

    let yaml: serde_yaml::Value = serde_yaml::from_str(&block).map_err(|e| e.to_string())?;
    let value = serde_json::to_value(yaml).map_err(|e| e.to_string())?;
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        other => Err(format!("override block must be a mapping, found {}", other)),
    }
}

fn into_override(map: Map<String, Value>) -> std::result::Result<OverrideObject, String> {
    serde_json::from_value(Value::Object(map)).map_err(|e| e.to_string())
}

/// Parses the handler-level block once and resolves per-action overrides.
#[derive(Debug)]
pub struct AnnotationParser<'a> {
    handler: &'a Handler,
    /// Keys of the handler block that apply to every action
    common: Map<String, Value>,
    /// Handler block sections keyed by action name
    sections: Map<String, Value>,
    /// Whether method blocks take part at all
    per_method: bool,
    handler_error: Option<String>,
}

impl<'a> AnnotationParser<'a> {
    /// Parse the handler block of `handler`, whose actions are `actions`.
    ///
    /// Fails when the handler block has a section for an action the handler
    /// does not implement.
    pub fn new(handler: &'a Handler, actions: &[String]) -> Result<Self> {
        let stale: Vec<&String> = handler
            .overrides
            .actions
            .keys()
            .chain(handler.method_docs.keys())
            .filter(|action| !actions.contains(*action))
            .collect();
        if !stale.is_empty() {
            return Err(Error::Configuration(format!(
                "methods {:?} overridden on {} are not in view methods {:?}",
                stale, handler.name, actions
            )));
        }

        let per_method = !matches!(handler.kind, crate::handler::HandlerKind::WrappedFunction { .. });
        let mut parser = Self {
            handler,
            common: Map::new(),
            sections: Map::new(),
            per_method,
            handler_error: None,
        };

        let doc = handler.effective_doc().unwrap_or_default();
        let raw = match parse_block(doc) {
            Ok(raw) => raw,
            Err(message) => {
                warn!("Malformed override block on {}: {}", handler.name, message);
                parser.handler_error = Some(message);
                return Ok(parser);
            }
        };

        if !per_method {
            parser.common = raw;
            return Ok(parser);
        }

        let mut missing = Vec::new();
        for (key, value) in raw {
            if RECOGNIZED_KEYS.contains(&key.as_str()) {
                parser.common.insert(key, value);
            } else if let Some(action) = actions.iter().find(|action| action.eq_ignore_ascii_case(&key)) {
                parser.sections.insert(action.clone(), value);
            } else {
                missing.push(key);
            }
        }

        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "methods {:?} in documentation of {} are not in view methods {:?}",
                missing, handler.name, actions
            )));
        }

        Ok(parser)
    }

    /// Overrides in force for `action`
    pub fn for_action(&self, action: &str) -> Annotation {
        debug!("Resolving overrides for {}.{}", self.handler.name, action);
        let mut errors: Vec<String> = self.handler_error.iter().cloned().collect();
        let layer = |map: Map<String, Value>, errors: &mut Vec<String>| match into_override(map) {
            Ok(overrides) => overrides,
            Err(message) => {
                warn!("Invalid override values on {}.{}: {}", self.handler.name, action, message);
                errors.push(message);
                OverrideObject::default()
            }
        };

        let mut overrides = layer(self.common.clone(), &mut errors);

        if self.per_method {
            let section = match self.sections.get(action) {
                Some(Value::Object(section)) => section.clone(),
                Some(Value::Null) | None => Map::new(),
                Some(other) => {
                    errors.push(format!("section {} must be a mapping, found {}", action, other));
                    Map::new()
                }
            };
            overrides = overrides.merged_with(&layer(section, &mut errors));

            if let Some(doc) = self.handler.method_docs.get(action) {
                match parse_block(doc) {
                    Ok(raw) => overrides = overrides.merged_with(&layer(raw, &mut errors)),
                    Err(message) => {
                        warn!("Malformed override block on {}.{}: {}", self.handler.name, action, message);
                        errors.push(message);
                    }
                }
            }
        }

        overrides = overrides.merged_with(&self.handler.overrides.all);
        if let Some(structured) = self.handler.overrides.actions.get(action) {
            overrides = overrides.merged_with(structured);
        }

        Annotation {
            overrides,
            parse_error: (!errors.is_empty()).then(|| errors.join("\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{FunctionInfo, HandlerKind, HandlerOverrides, HttpMethod};
    use serde_json::json;

    fn actions(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_parse_block() {
        let raw = parse_block("Docs.\n---\noperationId: listProducts\ntags: [products]").unwrap();
        assert_eq!(raw["operationId"], json!("listProducts"));
        assert!(parse_block("No block").unwrap().is_empty());
        assert!(parse_block("Docs.\n---\n").unwrap().is_empty());
        assert!(parse_block("Docs.\n---\n- just\n- a list").is_err());
        assert!(parse_block("Docs.\n---\ntags: [unclosed").is_err());
    }

    #[test]
    fn test_integer_keys_survive_conversion() {
        let raw = parse_block("---\nresponses:\n  404: missing").unwrap();
        assert_eq!(raw["responses"]["404"], json!("missing"));
    }

    #[test]
    fn test_method_block_overrides_handler_block() {
        let handler = Handler::resource("ProductView", "products.views", vec![HttpMethod::Get, HttpMethod::Post], true)
            .with_doc("Products.\n---\ntags: [catalog]\noperationId: fromHandler\ncreate:\n  operationId: createProduct\n")
            .with_method_doc("create", "Create.\n---\noperationId: fromMethod\nforce_pagination: true");

        let parser = AnnotationParser::new(&handler, &actions(&["list", "create"])).unwrap();

        let create = parser.for_action("create");
        assert_eq!(create.overrides.operation_id(), Some("fromMethod"));
        assert_eq!(create.overrides.tags, Some(vec!["catalog".to_string()]));
        assert!(create.overrides.forces_pagination());
        assert!(create.parse_error.is_none());

        let list = parser.for_action("list");
        assert_eq!(list.overrides.operation_id(), Some("fromHandler"));
        assert!(!list.overrides.forces_pagination());
    }

    #[test]
    fn test_section_beats_common_keys() {
        let handler = Handler::plain("PingView", "ops", vec![HttpMethod::Get])
            .with_doc("---\noperationId: common\nget:\n  operationId: ping\n");
        let parser = AnnotationParser::new(&handler, &actions(&["get"])).unwrap();
        assert_eq!(parser.for_action("get").overrides.operation_id(), Some("ping"));
    }

    #[test]
    fn test_unknown_action_section_is_fatal() {
        let handler = Handler::plain("PingView", "ops", vec![HttpMethod::Get])
            .with_doc("---\nput:\n  operationId: nope\n");
        let err = AnnotationParser::new(&handler, &actions(&["get"])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("put"));
    }

    #[test]
    fn test_unknown_structured_action_is_fatal() {
        let mut overrides = HandlerOverrides::default();
        overrides.actions.insert("destroy".to_string(), OverrideObject::default());
        let handler = Handler::resource("ProductView", "products.views", vec![HttpMethod::Get], false)
            .with_overrides(overrides);

        let err = AnnotationParser::new(&handler, &actions(&["retrieve"])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("destroy"));
    }

    #[test]
    fn test_unknown_method_doc_is_fatal() {
        let handler = Handler::resource("ProductView", "products.views", vec![HttpMethod::Get], false)
            .with_method_doc("retrieve", "Fetch one.")
            .with_method_doc("update", "---\noperationId: stale");

        let err = AnnotationParser::new(&handler, &actions(&["retrieve"])).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("update"));
        assert!(err.to_string().contains("[\"update\"]"));
    }

    #[test]
    fn test_malformed_block_is_recorded() {
        let handler = Handler::plain("PingView", "ops", vec![HttpMethod::Get])
            .with_method_doc("get", "Ping.\n---\nparameters: [unclosed");
        let parser = AnnotationParser::new(&handler, &actions(&["get"])).unwrap();
        let annotation = parser.for_action("get");
        assert!(annotation.parse_error.is_some());
        assert_eq!(annotation.overrides, OverrideObject::default());
    }

    #[test]
    fn test_wrong_shape_is_recorded() {
        let handler = Handler::plain("PingView", "ops", vec![HttpMethod::Get])
            .with_method_doc("get", "---\ntags: 12\noperationId: ping");
        let parser = AnnotationParser::new(&handler, &actions(&["get"])).unwrap();
        let annotation = parser.for_action("get");
        assert!(annotation.parse_error.is_some());
        assert_eq!(annotation.overrides.operation_id(), None);
    }

    #[test]
    fn test_structured_overrides_win() {
        let mut overrides = HandlerOverrides::default();
        overrides.all.tags = Some(vec!["structured".to_string()]);
        overrides.actions.insert(
            "get".to_string(),
            OverrideObject {
                operation_id: Some("structuredPing".to_string()),
                ..Default::default()
            },
        );
        let handler = Handler::plain("PingView", "ops", vec![HttpMethod::Get])
            .with_method_doc("get", "---\noperationId: docPing\ntags: [doc]\nproduces: [text/plain]")
            .with_overrides(overrides);

        let parser = AnnotationParser::new(&handler, &actions(&["get"])).unwrap();
        let resolved = parser.for_action("get").overrides;
        assert_eq!(resolved.operation_id(), Some("structuredPing"));
        assert_eq!(resolved.tags, Some(vec!["structured".to_string()]));
        assert_eq!(resolved.produces, Some(vec!["text/plain".to_string()]));
    }

    #[test]
    fn test_wrapped_function_uses_its_own_block() {
        let handler = Handler::new(
            "WrappedAPIView",
            "decorators",
            HandlerKind::WrappedFunction {
                function: FunctionInfo {
                    name: "health".to_string(),
                    module: "ops.views".to_string(),
                    doc: Some("Health.\n---\noperationId: health".to_string()),
                },
                methods: vec![HttpMethod::Get],
            },
        );
        let parser = AnnotationParser::new(&handler, &actions(&["get"])).unwrap();
        assert_eq!(parser.for_action("get").overrides.operation_id(), Some("health"));
    }

    #[test]
    fn test_parameters_and_strategies() {
        let raw = parse_block(
            "---\nparameters_strategy:\n  query: replace\nomit_parameters: [path]\nparameters:\n  - name: q\n    in: query\n    description: filter text\n    type: integer\n    minimum: 1",
        )
        .unwrap();
        let overrides = into_override(raw).unwrap();

        assert_eq!(overrides.strategy_for("query"), ParameterStrategy::Replace);
        assert_eq!(overrides.strategy_for("formData"), ParameterStrategy::Merge);
        assert!(overrides.omits_location("path"));
        assert!(!overrides.omits_location("query"));

        let parameter = &overrides.parameters.as_ref().unwrap()[0];
        assert_eq!(parameter.name, "q");
        assert_eq!(parameter.location.as_deref(), Some("query"));
        assert_eq!(parameter.minimum, Some(json!(1)));

        let global = OverrideObject {
            parameters_strategy: Some(StrategySpec::Global("bogus".to_string())),
            ..Default::default()
        };
        assert_eq!(global.strategy_for("query"), ParameterStrategy::Merge);
    }

    #[test]
    fn test_security_requirements() {
        let public = OverrideObject {
            security: Some(SecurityOverride::Keyword("public".to_string())),
            ..Default::default()
        };
        assert_eq!(public.security_requirements(), Some(vec![]));

        let explicit = OverrideObject {
            security: Some(SecurityOverride::Requirements(vec![json!({"api_key": []})])),
            ..Default::default()
        };
        assert_eq!(explicit.security_requirements(), Some(vec![json!({"api_key": []})]));

        let empty = OverrideObject {
            security: Some(SecurityOverride::Requirements(vec![])),
            ..Default::default()
        };
        assert_eq!(empty.security_requirements(), None);
        assert_eq!(OverrideObject::default().security_requirements(), None);
    }

    #[test]
    fn test_response_messages() {
        let raw = parse_block("---\nresponseMessages:\n  - code: 401\n    message: Not authenticated\n  - code: default\n    description: Oops").unwrap();
        let overrides = into_override(raw).unwrap();
        let messages = overrides.response_messages.unwrap();
        assert_eq!(messages[0].status(), "401");
        assert_eq!(messages[0].text(), "Not authenticated");
        assert_eq!(messages[1].status(), "default");
        assert_eq!(messages[1].text(), "Oops");
    }

    #[test]
    fn test_custom_response_type() {
        let raw = parse_block("---\ntype:\n  name:\n    required: true\n  url:\n    type: string\n    format: uri").unwrap();
        let overrides = into_override(raw).unwrap();
        let response_type = overrides.response_type.unwrap();
        let keys: Vec<_> = response_type.keys().cloned().collect();
        assert_eq!(keys, vec!["name", "url"]);
        assert!(response_type["name"].required);
        assert_eq!(response_type["name"].property_type, "string");
    }
}
