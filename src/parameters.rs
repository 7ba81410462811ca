//! Operation parameters.
//!
//! Reflected parameters come from the path template, `name -- description`
//! documentation lines, the pagination and filter capabilities and the
//! request DTO. Declared parameters come from overrides. [`ParameterResolver`]
//! combines both per location under the `merge` or `replace` strategy.

use crate::annotation::{OverrideObject, ParameterOverride, ParameterStrategy};
use crate::context::BuildContext;
use crate::error::Result;
use crate::handler::{FilterField, HttpMethod, Pagination};
use crate::registry::Registry;
use crate::schema_generator::{normalize_data_format, DtoRef, Schema};
use indexmap::IndexMap;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

static PATH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\{([^}]*)\}").unwrap());

/// Where a parameter travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Header,
    Path,
    FormData,
    Body,
    Query,
}

impl ParameterLocation {
    /// Every location, in the order resolved parameters are emitted
    pub const ALL: [ParameterLocation; 5] = [
        ParameterLocation::Header,
        ParameterLocation::Path,
        ParameterLocation::FormData,
        ParameterLocation::Body,
        ParameterLocation::Query,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Header => "header",
            ParameterLocation::Path => "path",
            ParameterLocation::FormData => "formData",
            ParameterLocation::Body => "body",
            ParameterLocation::Query => "query",
        }
    }

    /// Parse a declared location; anything unknown is `formData`
    pub fn parse_lenient(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|location| location.as_str() == name)
            .unwrap_or(ParameterLocation::FormData)
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Swagger 2.0 parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Schema>,
    #[serde(rename = "collectionFormat", default, skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
    #[serde(rename = "uniqueItems", default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    /// Body parameters only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation) -> Self {
        Self {
            name: name.into(),
            location,
            description: None,
            required: None,
            param_type: None,
            format: None,
            default: None,
            enum_values: None,
            items: None,
            collection_format: None,
            unique_items: None,
            minimum: None,
            maximum: None,
            schema: None,
            extensions: Map::new(),
        }
    }

    /// A query parameter of the given primitive type
    pub fn query(name: impl Into<String>, param_type: &str, description: Option<String>) -> Self {
        let (param_type, format) = normalize_data_format(param_type, None);
        Self {
            description,
            param_type: Some(param_type),
            format,
            ..Self::new(name, ParameterLocation::Query)
        }
    }

    /// Overlay the keys of a parameter fragment; a fragment that does not
    /// fit the parameter shape leaves the parameter untouched
    pub fn update_from(&mut self, fragment: &Map<String, Value>) {
        let Ok(Value::Object(mut merged)) = serde_json::to_value(&*self) else {
            return;
        };
        for (key, value) in fragment {
            merged.insert(key.clone(), value.clone());
        }
        match serde_json::from_value(Value::Object(merged)) {
            Ok(updated) => *self = updated,
            Err(e) => warn!("Ignoring parameter fragment for {}: {}", self.name, e),
        }
    }
}

/// Required string parameters for every `{placeholder}` of a path template
pub fn path_parameters(path: &str) -> Vec<Parameter> {
    PATH_PARAM
        .captures_iter(path)
        .map(|captures| Parameter {
            param_type: Some("string".to_string()),
            required: Some(true),
            ..Parameter::new(&captures[1], ParameterLocation::Path)
        })
        .collect()
}

/// Query parameters declared as `name -- description` documentation lines
pub fn doc_query_parameters(doc: &str) -> Vec<Parameter> {
    crate::formatting::param_lines(doc)
        .into_iter()
        .map(|(name, description)| {
            let mut parameter = Parameter::new(name, ParameterLocation::Query);
            parameter.description = Some(description);
            parameter.param_type = Some("string".to_string());
            parameter
        })
        .collect()
}

/// Page number and page size query parameters
pub fn pagination_parameters(handler_name: &str, pagination: &Pagination) -> Vec<Parameter> {
    let mut params = Vec::new();

    match &pagination.page_query_param {
        Some(page) => params.push(Parameter::query(page, "integer", Some("Page Number".to_string()))),
        None => error!("Paginator on view {} does not have a page query param", handler_name),
    }
    if let Some(size) = &pagination.page_size_query_param {
        params.push(Parameter::query(size, "integer", Some("Page Size".to_string())));
    }

    params
}

/// One string query parameter per filter, with an enum for fixed choice sets
pub fn filter_parameters(filters: &IndexMap<String, FilterField>) -> Vec<Parameter> {
    filters
        .iter()
        .map(|(name, filter)| {
            let mut parameter = Parameter::query(name, "string", filter.label.clone());
            if !filter.choices.is_empty() {
                parameter.enum_values = Some(filter.choices.iter().map(|choice| choice.0.clone()).collect());
            }
            parameter
        })
        .collect()
}

/// Required body parameter referencing a definition
pub fn body_parameter(definition: &str) -> Parameter {
    Parameter {
        required: Some(true),
        schema: Some(Schema::reference(definition)),
        ..Parameter::new(definition, ParameterLocation::Body)
    }
}

/// Combines reflected and declared parameters for one operation
pub struct ParameterResolver<'a> {
    registry: &'a Registry,
    /// Module references in overrides are resolved from
    module: &'a str,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(registry: &'a Registry, module: &'a str) -> Self {
        Self { registry, module }
    }

    /// Resolve the parameters of one operation.
    ///
    /// Declared parameters may move a same-named reflected parameter to a
    /// new location before the per-location strategies run. PATCH
    /// operations end up with every non-path parameter optional.
    pub fn resolve(
        &self,
        mut reflected: Vec<Parameter>,
        overrides: &OverrideObject,
        method: HttpMethod,
        context: &mut BuildContext,
    ) -> Result<Vec<Parameter>> {
        let declared = self.declared(overrides, &reflected, context)?;

        for parameter in reflected.iter_mut() {
            if let Some(relocated) = declared.iter().find(|d| d.name == parameter.name) {
                parameter.location = relocated.location;
            }
        }

        let mut parameters = Vec::new();
        for location in ParameterLocation::ALL {
            if overrides.omits_location(location.as_str()) {
                debug!("Omitting {} parameters", location);
                continue;
            }

            let reflected_here = reflected.iter().filter(|p| p.location == location).cloned();
            let declared_here: Vec<Parameter> =
                declared.iter().filter(|p| p.location == location).cloned().collect();

            match overrides.strategy_for(location.as_str()) {
                ParameterStrategy::Replace if !declared_here.is_empty() => parameters.extend(declared_here),
                ParameterStrategy::Replace => parameters.extend(reflected_here),
                ParameterStrategy::Merge => {
                    let mut merged: IndexMap<String, Parameter> = IndexMap::new();
                    for parameter in reflected_here.chain(declared_here) {
                        merged.insert(parameter.name.clone(), parameter);
                    }
                    parameters.extend(merged.into_values());
                }
            }
        }

        if method == HttpMethod::Patch {
            for parameter in parameters.iter_mut() {
                if parameter.location != ParameterLocation::Path {
                    parameter.required = Some(false);
                }
            }
        }

        Ok(parameters)
    }

    /// Declared parameters of an override, normalized
    pub fn declared(
        &self,
        overrides: &OverrideObject,
        reflected: &[Parameter],
        context: &mut BuildContext,
    ) -> Result<Vec<Parameter>> {
        overrides
            .parameters
            .iter()
            .flatten()
            .map(|declared| self.declared_parameter(declared, reflected, context))
            .collect()
    }

    fn declared_parameter(
        &self,
        declared: &ParameterOverride,
        reflected: &[Parameter],
        context: &mut BuildContext,
    ) -> Result<Parameter> {
        let location = match declared.location.as_deref() {
            Some(name) => ParameterLocation::parse_lenient(name),
            None => reflected
                .iter()
                .find(|p| p.name == declared.name)
                .map(|p| p.location)
                .unwrap_or(ParameterLocation::FormData),
        };

        let mut parameter = Parameter::new(&declared.name, location);
        parameter.description = Some(declared.description.clone().unwrap_or_default());
        parameter.required = Some(declared.required.unwrap_or(false));

        let data_type = declared.param_type.clone().unwrap_or_else(|| "string".to_string());

        if let Some(pytype) = &declared.pytype {
            let dto = self.registry.resolve_dto(pytype, self.module)?;
            context.add_dto(DtoRef::read(dto));
            if location == ParameterLocation::Body {
                parameter.schema = Some(Schema::reference(dto.canonical_name()));
            } else {
                parameter.param_type = Some(dto.canonical_name().to_string());
            }
        } else {
            let (param_type, format) = normalize_data_format(&data_type, declared.format.as_deref());
            parameter.param_type = Some(param_type);
            parameter.format = format;
        }

        parameter.collection_format = declared.collection_format.clone().filter(|f| !f.is_empty());
        parameter.default = declared.default.clone().filter(|value| !value.is_null());

        if parameter.param_type.as_deref() == Some("array") {
            let items = declared.items.clone().unwrap_or_default();
            let item_type = items.item_type.as_deref().unwrap_or("string");
            let (item_type, item_format) = normalize_data_format(item_type, items.format.as_deref());
            parameter.items = Some(Schema {
                schema_type: Some(item_type),
                format: item_format,
                ..Default::default()
            });
            parameter.unique_items = declared.unique_items;
        }

        if data_type == "integer" {
            parameter.minimum = declared.minimum.clone();
            parameter.maximum = declared.maximum.clone();
        }

        if let Some(values) = declared.enum_values.as_ref().filter(|values| !values.is_empty()) {
            parameter.enum_values = Some(values.clone());
        }

        if parameter.param_type.as_deref() == Some("file") {
            parameter.location = ParameterLocation::Body;
        }

        Ok(parameter)
    }
}
