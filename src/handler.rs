//! Handler registration surface.
//!
//! Every routed handler declares its shape up front through [`HandlerKind`]
//! and its capabilities (declared DTO, pagination, filters) through
//! [`Capabilities`]. Nothing is probed at document time: the introspector
//! reads these declarations directly.

use crate::annotation::OverrideObject;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// HTTP methods a handler can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "head")]
    Head,
    #[serde(alias = "options")]
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Lowercase form, used as the path-item key and as plain action name
    pub fn lowercase(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Patch => "patch",
            HttpMethod::Delete => "delete",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }

    /// Whether the method usually carries a request payload
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered handler bound to one or more URL patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handler {
    /// Handler type name, e.g. `ProductListCreateView`
    pub name: String,
    /// Dotted module the handler is declared in
    #[serde(default)]
    pub module: String,
    /// Handler-level documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Per-action documentation keyed by action name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub method_docs: BTreeMap<String, String>,
    #[serde(flatten)]
    pub kind: HandlerKind,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    /// Structured overrides attached at registration
    #[serde(default)]
    pub overrides: HandlerOverrides,
    /// The framework's own API root listing, never documented
    #[serde(default)]
    pub root_listing: bool,
}

/// The closed set of handler shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandlerKind {
    /// One action per allowed verb, named after the verb
    Plain { methods: Vec<HttpMethod> },
    /// Verbs mapped onto create/update/partial_update/destroy/list/retrieve
    ResourceAction {
        methods: Vec<HttpMethod>,
        #[serde(default)]
        list: bool,
    },
    /// Explicit verb to action map declared with the route
    ActionSet {
        #[serde(default)]
        actions: Option<IndexMap<HttpMethod, String>>,
    },
    /// A bare function wrapped to look like a handler
    WrappedFunction {
        function: FunctionInfo,
        methods: Vec<HttpMethod>,
    },
}

/// The function behind a wrapped-function handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    #[serde(default)]
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Capabilities a handler declares instead of being probed for them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Registry name or dotted path of the DTO the handler works with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serializer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Filterable query fields keyed by query parameter name
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub filters: IndexMap<String, FilterField>,
    /// Per-request DTO choice, when the declared DTO depends on the action
    #[serde(skip)]
    pub serializer_selector: Option<SerializerSelector>,
}

/// Page-number pagination descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_query_param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size_query_param: Option<String>,
}

/// One filterable field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<crate::dto::Choice>,
}

/// Overrides attached to a handler at registration time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerOverrides {
    /// Applies to every action of the handler
    #[serde(default)]
    pub all: OverrideObject,
    /// Keyed by action name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, OverrideObject>,
}

/// The caller a document is generated for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct User {
    pub authenticated: bool,
    pub superuser: bool,
}

impl User {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            superuser: false,
        }
    }

    pub fn superuser() -> Self {
        Self {
            authenticated: true,
            superuser: true,
        }
    }
}

/// The state a handler would see when serving one action
#[derive(Debug, Clone, PartialEq)]
pub struct ViewContext {
    pub action: String,
    pub method: HttpMethod,
    pub user: User,
    /// Default arguments bound by the URL pattern
    pub kwargs: BTreeMap<String, String>,
}

/// Chooses a DTO for a view context
#[derive(Clone)]
pub struct SerializerSelector(Arc<dyn Fn(&ViewContext) -> Option<String> + Send + Sync>);

impl SerializerSelector {
    pub fn new<F>(select: F) -> Self
    where
        F: Fn(&ViewContext) -> Option<String> + Send + Sync + 'static,
    {
        Self(Arc::new(select))
    }

    pub fn select(&self, view: &ViewContext) -> Option<String> {
        (self.0)(view)
    }
}

impl fmt::Debug for SerializerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SerializerSelector(..)")
    }
}

impl Handler {
    pub fn new(name: impl Into<String>, module: impl Into<String>, kind: HandlerKind) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            doc: None,
            method_docs: BTreeMap::new(),
            kind,
            capabilities: Capabilities::default(),
            overrides: HandlerOverrides::default(),
            root_listing: false,
        }
    }

    /// A plain handler answering `methods`
    pub fn plain(name: impl Into<String>, module: impl Into<String>, methods: Vec<HttpMethod>) -> Self {
        Self::new(name, module, HandlerKind::Plain { methods })
    }

    /// A resource-action handler; `list` selects `list` over `retrieve` for GET
    pub fn resource(
        name: impl Into<String>,
        module: impl Into<String>,
        methods: Vec<HttpMethod>,
        list: bool,
    ) -> Self {
        Self::new(name, module, HandlerKind::ResourceAction { methods, list })
    }

    /// An action-set handler with an explicit verb to action map
    pub fn action_set(
        name: impl Into<String>,
        module: impl Into<String>,
        actions: Vec<(HttpMethod, &str)>,
    ) -> Self {
        let actions = actions
            .into_iter()
            .map(|(method, action)| (method, action.to_string()))
            .collect();
        Self::new(name, module, HandlerKind::ActionSet { actions: Some(actions) })
    }

    /// The framework's own root listing
    pub fn api_root() -> Self {
        let mut handler = Self::plain("APIRoot", "routers", vec![HttpMethod::Get]);
        handler.root_listing = true;
        handler
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn with_method_doc(mut self, action: impl Into<String>, doc: impl Into<String>) -> Self {
        self.method_docs.insert(action.into(), doc.into());
        self
    }

    pub fn with_serializer(mut self, serializer: impl Into<String>) -> Self {
        self.capabilities.serializer = Some(serializer.into());
        self
    }

    pub fn with_pagination(mut self, page: Option<&str>, page_size: Option<&str>) -> Self {
        self.capabilities.pagination = Some(Pagination {
            page_query_param: page.map(str::to_string),
            page_size_query_param: page_size.map(str::to_string),
        });
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, filter: FilterField) -> Self {
        self.capabilities.filters.insert(name.into(), filter);
        self
    }

    pub fn with_selector(mut self, selector: SerializerSelector) -> Self {
        self.capabilities.serializer_selector = Some(selector);
        self
    }

    pub fn with_overrides(mut self, overrides: HandlerOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Module identity, read through the wrapped function when there is one
    pub fn effective_module(&self) -> &str {
        match &self.kind {
            HandlerKind::WrappedFunction { function, .. } => &function.module,
            _ => &self.module,
        }
    }

    /// Handler-level documentation, read through the wrapped function when there is one
    pub fn effective_doc(&self) -> Option<&str> {
        match &self.kind {
            HandlerKind::WrappedFunction { function, .. } => function.doc.as_deref(),
            _ => self.doc.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_strings() {
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
        assert_eq!(HttpMethod::Patch.lowercase(), "patch");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Get.has_body());
    }

    #[test]
    fn test_http_method_accepts_both_cases() {
        let upper: HttpMethod = serde_yaml::from_str("GET").unwrap();
        let lower: HttpMethod = serde_yaml::from_str("get").unwrap();
        assert_eq!(upper, HttpMethod::Get);
        assert_eq!(lower, HttpMethod::Get);
    }

    #[test]
    fn test_wrapped_function_reads_through() {
        let handler = Handler::new(
            "WrappedAPIView",
            "decorators",
            HandlerKind::WrappedFunction {
                function: FunctionInfo {
                    name: "health".to_string(),
                    module: "ops.views".to_string(),
                    doc: Some("Health check".to_string()),
                },
                methods: vec![HttpMethod::Get],
            },
        )
        .with_doc("wrapper");

        assert_eq!(handler.effective_module(), "ops.views");
        assert_eq!(handler.effective_doc(), Some("Health check"));
    }

    #[test]
    fn test_deserialize_resource_handler() {
        let yaml = r#"
name: ProductListCreateView
module: products.views
kind: resource_action
methods: [GET, POST]
list: true
serializer: products.serializers.ProductSerializer
pagination:
  page_query_param: page
  page_size_query_param: page_size
"#;
        let handler: Handler = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            handler.kind,
            HandlerKind::ResourceAction {
                methods: vec![HttpMethod::Get, HttpMethod::Post],
                list: true
            }
        );
        assert_eq!(
            handler.capabilities.serializer.as_deref(),
            Some("products.serializers.ProductSerializer")
        );
        assert_eq!(
            handler.capabilities.pagination.unwrap().page_query_param.as_deref(),
            Some("page")
        );
        assert!(!handler.root_listing);
    }

    #[test]
    fn test_deserialize_action_set_without_map() {
        let handler: Handler = serde_yaml::from_str("name: TagViewSet\nkind: action_set").unwrap();
        assert_eq!(handler.kind, HandlerKind::ActionSet { actions: None });
    }

    #[test]
    fn test_selector_is_invoked() {
        let selector = SerializerSelector::new(|view| {
            (view.action == "create").then(|| "WriteSerializer".to_string())
        });
        let view = ViewContext {
            action: "create".to_string(),
            method: HttpMethod::Post,
            user: User::anonymous(),
            kwargs: BTreeMap::new(),
        };
        assert_eq!(selector.select(&view).as_deref(), Some("WriteSerializer"));
    }
}
