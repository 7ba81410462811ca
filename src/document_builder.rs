use crate::annotation::{CustomProperty, OverrideObject};
use crate::config::SwaggerConfig;
use crate::context::BuildContext;
use crate::dto::Dto;
use crate::error::Result;
use crate::handler::{Handler, HttpMethod, User};
use crate::introspector::{HandlerIntrospector, MethodDescriptor};
use crate::parameters::{path_parameters, Parameter, ParameterResolver};
use crate::registry::Registry;
use crate::routes::Endpoint;
use crate::schema_generator::{
    definition_ref, normalize_data_format, pagination_envelope, DtoRef, Schema, SchemaGenerator,
};
use indexmap::IndexMap;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Version string of every generated document
pub const SWAGGER_VERSION: &str = "2.0";

/// Swagger 2.0 document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwaggerDocument {
    pub swagger: String,
    pub info: Value,
    #[serde(rename = "basePath")]
    pub base_path: String,
    pub host: String,
    pub schemes: Vec<String>,
    /// Path template -> operations, sorted by template
    pub paths: BTreeMap<String, PathItem>,
    pub definitions: BTreeMap<String, Schema>,
    #[serde(rename = "securityDefinitions")]
    pub security_definitions: Map<String, Value>,
    pub security: Vec<Value>,
}

/// Operations of one path, plus the parameters they share
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Options => None,
        }
    }

    fn operations_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        [
            &mut self.get,
            &mut self.post,
            &mut self.put,
            &mut self.patch,
            &mut self.delete,
            &mut self.head,
        ]
        .into_iter()
        .flatten()
    }

    fn set(&mut self, method: HttpMethod, operation: Operation) {
        let slot = match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Options => return,
        };
        *slot = Some(operation);
    }

    fn is_empty(&self) -> bool {
        self.get.is_none()
            && self.post.is_none()
            && self.put.is_none()
            && self.patch.is_none()
            && self.delete.is_none()
            && self.head.is_none()
    }
}

/// One documented operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub description: String,
    pub summary: String,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produces: Option<Vec<String>>,
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    /// Status code -> response
    pub responses: IndexMap<String, Response>,
    /// Overrides the document-level requirements when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Assembles a [`SwaggerDocument`] from collected endpoints
pub struct DocumentBuilder<'a> {
    config: &'a SwaggerConfig,
    /// Variant being built; operations restricted to another one are skipped
    config_name: String,
    registry: &'a Registry,
    user: User,
    version: Option<String>,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(config: &'a SwaggerConfig, config_name: impl Into<String>, registry: &'a Registry) -> Self {
        Self {
            config,
            config_name: config_name.into(),
            registry,
            user: User::anonymous(),
            version: None,
        }
    }

    /// Build the document as `user` would see it
    pub fn for_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// API version substituted into the base path
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Build the document.
    ///
    /// # Errors
    ///
    /// Any fatal introspection, consistency or reference error aborts the
    /// whole build; no partial document is returned.
    pub fn build(&self, endpoints: &[Endpoint]) -> Result<SwaggerDocument> {
        debug!("Building document {} over {} endpoints", self.config_name, endpoints.len());
        let mut context = BuildContext::new();
        if let Some((name, definition)) = self.config.default_payload() {
            context.add_response_type(name, definition.clone());
        }

        let mut paths = BTreeMap::new();
        for endpoint in endpoints {
            if let Some(item) = self.path_item(endpoint, &mut context)? {
                paths.insert(endpoint.path.clone(), item);
            }
        }

        let definitions = self.definitions(&context);
        debug!("Document has {} paths and {} definitions", paths.len(), definitions.len());

        Ok(SwaggerDocument {
            swagger: SWAGGER_VERSION.to_string(),
            info: self.config.info.clone(),
            base_path: self.config.base_path_for(self.version.as_deref()),
            host: self.config.host.clone(),
            schemes: self.config.schemes.clone(),
            paths,
            definitions,
            security_definitions: self.config.security_definitions.clone(),
            security: self.config.security.clone(),
        })
    }

    fn path_item(&self, endpoint: &Endpoint, context: &mut BuildContext) -> Result<Option<PathItem>> {
        let introspector = HandlerIntrospector::new(endpoint, self.registry, self.user)?;

        let mut item = PathItem::default();
        for descriptor in introspector.descriptors() {
            if let Some(operation) = self.operation(&introspector, descriptor, context)? {
                item.set(descriptor.method, operation);
            }
        }
        if item.is_empty() {
            debug!("No operations of {} belong to {}", endpoint.path, self.config_name);
            return Ok(None);
        }

        let shared = path_parameters(&endpoint.path);
        for operation in item.operations_mut() {
            operation.parameters.retain(|parameter| !shared.contains(parameter));
        }
        item.parameters = self.fill_path_parameters(shared);

        Ok(Some(item))
    }

    /// Enrich path parameters with same-named fragments of the global parameter docs
    pub fn fill_path_parameters(&self, mut parameters: Vec<Parameter>) -> Vec<Parameter> {
        for parameter in parameters.iter_mut() {
            if let Some(fragment) = self.config.global_parametters_docs.get(&parameter.name) {
                parameter.update_from(fragment);
            }
        }
        parameters
    }

    fn operation(
        &self,
        introspector: &HandlerIntrospector,
        descriptor: &MethodDescriptor,
        context: &mut BuildContext,
    ) -> Result<Option<Operation>> {
        let annotation = introspector.annotation(descriptor);
        let overrides = &annotation.overrides;
        let handler = introspector.handler();

        if let Some(name) = overrides.swagger_config_name.as_deref().filter(|name| !name.is_empty()) {
            if name != self.config_name {
                debug!("Skipping {} {}: restricted to {}", descriptor.method, descriptor.endpoint.path, name);
                return Ok(None);
            }
        }

        let request_dto = introspector.request_dto(descriptor, overrides)?;
        let response_dto = introspector.response_dto(descriptor, overrides)?;

        if let Some(dto) = request_dto.filter(|dto| dto.in_body && descriptor.method.has_body()) {
            context.add_dto(DtoRef::read(dto));
        }
        let reflected = introspector.reflected_parameters(descriptor, request_dto);
        let parameters = ParameterResolver::new(self.registry, handler.effective_module()).resolve(
            reflected,
            overrides,
            descriptor.method,
            context,
        )?;

        let mut description = introspector.description(descriptor);
        if let Some(err) = &annotation.parse_error {
            description.push_str(&format!("<pre>YAMLError:\n {}</pre>", err));
        }

        let operation_id = overrides.operation_id().map(str::to_string);
        if operation_id.is_none() {
            error!(
                "No operationId for {} {} ({})",
                descriptor.method, descriptor.endpoint.path, handler.name
            );
        }

        Ok(Some(Operation {
            description,
            summary: introspector.summary(descriptor),
            operation_id,
            produces: overrides.produces.clone().or_else(|| self.config.produces.clone()),
            tags: overrides.tags.clone().unwrap_or_default(),
            parameters,
            responses: self.responses(handler, descriptor, overrides, response_dto, context),
            security: overrides.security_requirements(),
        }))
    }

    fn responses(
        &self,
        handler: &Handler,
        descriptor: &MethodDescriptor,
        overrides: &OverrideObject,
        response_dto: Option<&Dto>,
        context: &mut BuildContext,
    ) -> IndexMap<String, Response> {
        let mut responses = IndexMap::new();

        if let Some((name, _)) = self.config.default_payload() {
            responses.insert(
                "default".to_string(),
                Response {
                    description: "error payload".to_string(),
                    schema: Some(Schema::reference(name)),
                },
            );
        }

        let (code, success) = self.success_response(handler, descriptor, overrides, response_dto, context);
        responses.insert(code, success);

        for message in overrides.response_messages.iter().flatten() {
            let schema = message.schema.clone().map(|mut schema| {
                self.close_references(&mut schema, handler.effective_module(), context);
                schema
            });
            responses.insert(
                message.status(),
                Response {
                    description: message.text(),
                    schema,
                },
            );
        }

        responses
    }

    fn success_response(
        &self,
        handler: &Handler,
        descriptor: &MethodDescriptor,
        overrides: &OverrideObject,
        response_dto: Option<&Dto>,
        context: &mut BuildContext,
    ) -> (String, Response) {
        if descriptor.method == HttpMethod::Delete {
            return (
                "204".to_string(),
                Response {
                    description: "Deleted".to_string(),
                    schema: None,
                },
            );
        }

        let code = if descriptor.method == HttpMethod::Post { "201" } else { "200" };

        let body = match overrides.response_type.as_ref().filter(|properties| !properties.is_empty()) {
            Some(properties) => {
                let name = format!("{}{}Response", handler.name, pascal_case(&descriptor.action));
                context.add_response_type(&name, custom_response_schema(properties));
                Some(Schema::reference(&name))
            }
            None => response_dto.map(|dto| {
                context.add_dto(DtoRef::read(dto));
                Schema::reference(dto.canonical_name())
            }),
        };

        let paginated = overrides.forces_pagination()
            || (code == "200"
                && handler.capabilities.pagination.is_some()
                && HandlerIntrospector::is_read_list(descriptor));

        let schema = body.map(|schema| if paginated { pagination_envelope(schema) } else { schema });

        (
            code.to_string(),
            Response {
                description: "Successful operation".to_string(),
                schema,
            },
        )
    }

    /// Point every `$ref` of a declared response schema at an emitted definition.
    ///
    /// Registered DTOs are pulled into the definitions under their published
    /// name; references to anything else are documented as plain objects.
    fn close_references(&self, schema: &mut Schema, module: &str, context: &mut BuildContext) {
        if let Some(reference) = schema.reference.take() {
            let name = reference.trim_start_matches("#/definitions/");
            let dto = self
                .registry
                .resolve_dto(name, module)
                .ok()
                .or_else(|| self.registry.dto_by_definition_name(name));

            if context.has_response_type(name) {
                schema.reference = Some(reference);
            } else if let Some(dto) = dto {
                context.add_dto(DtoRef::read(dto));
                schema.reference = Some(definition_ref(dto.canonical_name()));
            } else {
                warn!("Declared response references unknown definition {}, documenting it as an object", name);
                schema.schema_type.get_or_insert_with(|| "object".to_string());
            }
        }

        if let Some(items) = schema.items.as_mut() {
            self.close_references(items, module, context);
        }
        for property in schema.properties.values_mut() {
            self.close_references(property, module, context);
        }
    }

    fn definitions(&self, context: &BuildContext) -> BTreeMap<String, Schema> {
        let mut generator = SchemaGenerator::new(self.registry);
        for dto in context.dtos() {
            generator.add(dto.clone());
        }

        let mut definitions = generator.into_definitions();
        for (name, schema) in context.response_types() {
            definitions.insert(name.clone(), schema.clone());
        }
        definitions
    }
}

/// Definition of an inline response shape declared with `type`
fn custom_response_schema(properties: &IndexMap<String, CustomProperty>) -> Schema {
    let mut schema = Schema::typed("object");
    for (name, property) in properties {
        let (property_type, format) = normalize_data_format(&property.property_type, property.format.as_deref());
        if property.required {
            schema.required.push(name.clone());
        }
        schema.properties.insert(
            name.clone(),
            Schema {
                schema_type: Some(property_type),
                format,
                description: property.description.clone(),
                ..Default::default()
            },
        );
    }
    schema
}

fn pascal_case(action: &str) -> String {
    action
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
