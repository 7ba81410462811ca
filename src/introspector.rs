use crate::annotation::{Annotation, AnnotationParser, OverrideObject};
use crate::dto::Dto;
use crate::error::{Error, Result};
use crate::formatting;
use crate::handler::{Handler, HandlerKind, HttpMethod, User, ViewContext};
use crate::parameters::{
    body_parameter, doc_query_parameters, filter_parameters, pagination_parameters, path_parameters, Parameter,
};
use crate::registry::Registry;
use crate::routes::Endpoint;
use log::{debug, warn};

/// One operation exposed by an endpoint
#[derive(Debug, Clone)]
pub struct MethodDescriptor<'a> {
    pub endpoint: &'a Endpoint<'a>,
    pub method: HttpMethod,
    /// Logical action name (`list`, `create`, `get`, ...)
    pub action: String,
}

/// `(verb, action)` pairs a handler exposes, `OPTIONS` excluded.
///
/// # Errors
///
/// Returns [`Error::Reflection`] for an action-set handler registered
/// without its verb to action map.
pub fn handler_actions(handler: &Handler) -> Result<Vec<(HttpMethod, String)>> {
    let actions = match &handler.kind {
        HandlerKind::Plain { methods } | HandlerKind::WrappedFunction { methods, .. } => methods
            .iter()
            .filter(|m| **m != HttpMethod::Options)
            .map(|m| (*m, m.lowercase().to_string()))
            .collect(),
        HandlerKind::ResourceAction { methods, list } => methods
            .iter()
            .filter(|m| **m != HttpMethod::Options)
            .map(|m| (*m, resource_action(*m, *list).to_string()))
            .collect(),
        HandlerKind::ActionSet { actions: Some(actions) } => actions
            .iter()
            .filter(|(m, _)| **m != HttpMethod::Options)
            .map(|(m, action)| (*m, action.clone()))
            .collect(),
        HandlerKind::ActionSet { actions: None } => {
            return Err(Error::Reflection {
                handler: handler.name.clone(),
                message: "action-set handler registered without an action map".to_string(),
            })
        }
    };

    Ok(actions)
}

fn resource_action(method: HttpMethod, list: bool) -> &'static str {
    match method {
        HttpMethod::Get if list => "list",
        HttpMethod::Get => "retrieve",
        HttpMethod::Post => "create",
        HttpMethod::Put => "update",
        HttpMethod::Patch => "partial_update",
        HttpMethod::Delete => "destroy",
        other => other.lowercase(),
    }
}

/// Descriptors of every documented operation of an endpoint
pub fn enumerate_operations<'a>(endpoint: &'a Endpoint<'a>) -> Result<Vec<MethodDescriptor<'a>>> {
    Ok(handler_actions(endpoint.handler)?
        .into_iter()
        .map(|(method, action)| MethodDescriptor {
            endpoint,
            method,
            action,
        })
        .collect())
}

/// Reads everything the document needs from one endpoint's handler
pub struct HandlerIntrospector<'a> {
    endpoint: &'a Endpoint<'a>,
    registry: &'a Registry,
    user: User,
    descriptors: Vec<MethodDescriptor<'a>>,
    annotations: AnnotationParser<'a>,
}

impl<'a> HandlerIntrospector<'a> {
    /// Introspect the handler of `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails on handler shapes that cannot be introspected and on
    /// documentation naming actions the handler does not implement.
    pub fn new(endpoint: &'a Endpoint<'a>, registry: &'a Registry, user: User) -> Result<Self> {
        debug!("Introspecting {} at {}", endpoint.handler.name, endpoint.path);
        let descriptors = enumerate_operations(endpoint)?;
        let action_names: Vec<String> = descriptors.iter().map(|d| d.action.clone()).collect();
        let annotations = AnnotationParser::new(endpoint.handler, &action_names)?;

        Ok(Self {
            endpoint,
            registry,
            user,
            descriptors,
            annotations,
        })
    }

    pub fn handler(&self) -> &'a Handler {
        self.endpoint.handler
    }

    pub fn descriptors(&self) -> &[MethodDescriptor<'a>] {
        &self.descriptors
    }

    pub fn annotation(&self, descriptor: &MethodDescriptor) -> Annotation {
        self.annotations.for_action(&descriptor.action)
    }

    /// Method documentation; wrapped functions only have their own
    fn method_doc(&self, descriptor: &MethodDescriptor) -> Option<&'a str> {
        let handler = self.handler();
        match handler.kind {
            HandlerKind::WrappedFunction { .. } => handler.effective_doc(),
            _ => handler
                .method_docs
                .get(&descriptor.action)
                .map(String::as_str)
                .filter(|doc| !doc.trim().is_empty()),
        }
    }

    /// First sentence of the method documentation, or of the handler's
    pub fn summary(&self, descriptor: &MethodDescriptor) -> String {
        let doc = self
            .method_doc(descriptor)
            .or_else(|| self.handler().effective_doc())
            .unwrap_or_default();
        formatting::summary(doc)
    }

    pub fn description(&self, descriptor: &MethodDescriptor) -> String {
        match self.handler().kind {
            HandlerKind::WrappedFunction { .. } => formatting::description(self.handler().effective_doc(), None),
            _ => formatting::description(self.handler().doc.as_deref(), self.method_doc(descriptor)),
        }
    }

    /// Whether an operation reads a collection
    pub fn is_read_list(descriptor: &MethodDescriptor) -> bool {
        descriptor.method == HttpMethod::Get && descriptor.action != "retrieve"
    }

    /// DTO describing the response of an operation
    pub fn response_dto(&self, descriptor: &MethodDescriptor, overrides: &OverrideObject) -> Result<Option<&'a Dto>> {
        self.select_dto(descriptor, overrides, overrides.response_serializer.as_deref())
    }

    /// DTO describing the request payload of an operation
    pub fn request_dto(&self, descriptor: &MethodDescriptor, overrides: &OverrideObject) -> Result<Option<&'a Dto>> {
        self.select_dto(descriptor, overrides, overrides.request_serializer.as_deref())
    }

    fn select_dto(
        &self,
        descriptor: &MethodDescriptor,
        overrides: &OverrideObject,
        directional: Option<&str>,
    ) -> Result<Option<&'a Dto>> {
        if overrides.omits_serializer() {
            return Ok(None);
        }

        let module = self.handler().effective_module();
        if let Some(reference) = directional.or(overrides.serializer.as_deref()) {
            return self.registry.resolve_dto(reference, module).map(Some);
        }

        let capabilities = &self.handler().capabilities;
        if let Some(selector) = &capabilities.serializer_selector {
            let mut view = Some(self.view_context(descriptor));
            if let Some(mocker) = &overrides.view_mocker {
                let mocker = self.registry.resolve_mocker(mocker, module)?;
                view = view.and_then(|view| mocker.apply(view));
            }
            match view.and_then(|view| selector.select(&view)) {
                Some(reference) => {
                    return match self.registry.resolve_dto(&reference, module) {
                        Ok(dto) => Ok(Some(dto)),
                        Err(e) => {
                            warn!("Selected DTO of {} is unavailable: {}", self.handler().name, e);
                            Ok(None)
                        }
                    };
                }
                None => debug!("Selector of {} chose no DTO for {}", self.handler().name, descriptor.action),
            }
        }

        let Some(reference) = &capabilities.serializer else {
            return Ok(None);
        };
        match self.registry.resolve_dto(reference, module) {
            Ok(dto) => Ok(Some(dto)),
            Err(e) => {
                warn!("Declared DTO of {} is unavailable: {}", self.handler().name, e);
                Ok(None)
            }
        }
    }

    /// The state the handler would see serving `descriptor`
    pub fn view_context(&self, descriptor: &MethodDescriptor) -> ViewContext {
        ViewContext {
            action: descriptor.action.clone(),
            method: descriptor.method,
            user: self.user,
            kwargs: self.endpoint.route.default_args.clone(),
        }
    }

    /// Parameters discovered without overrides
    pub fn reflected_parameters(&self, descriptor: &MethodDescriptor, request_dto: Option<&Dto>) -> Vec<Parameter> {
        let handler = self.handler();
        let mut params = path_parameters(&self.endpoint.path);

        let mut doc = self.method_doc(descriptor).unwrap_or_default().to_string();
        if !matches!(handler.kind, HandlerKind::WrappedFunction { .. }) {
            doc.push('\n');
            doc.push_str(handler.doc.as_deref().unwrap_or_default());
        }
        params.extend(doc_query_parameters(&doc));
        params.extend(filter_parameters(&handler.capabilities.filters));

        if let Some(pagination) = &handler.capabilities.pagination {
            if Self::is_read_list(descriptor) {
                params.extend(pagination_parameters(&handler.name, pagination));
            }
        }

        if let Some(dto) = request_dto.filter(|dto| dto.in_body && descriptor.method.has_body()) {
            params.push(body_parameter(dto.canonical_name()));
        }

        params
    }
}
