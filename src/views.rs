//! HTTP surface of the generator.
//!
//! [`SwaggerJsonView`] answers `GET /swagger.json` with the `default`
//! document and `GET /{name}/swagger.json` with the named variant. Every
//! request rebuilds the document from the registered routes.

use crate::collector::{CollectorFilters, RouteCollector};
use crate::config::{SwaggerConfig, SwaggerSettings, DEFAULT_CONFIG_NAME};
use crate::document_builder::{DocumentBuilder, SwaggerDocument};
use crate::error::{Error, Result};
use crate::handler::User;
use crate::registry::Registry;
use crate::routes::RouteTree;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

static DOCUMENT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/?(?:(?P<swagger_config_name>\w+)/)?swagger\.json$").unwrap());

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A document request as seen by the view
#[derive(Debug, Clone, Default)]
pub struct DocumentRequest {
    /// Variant to build, `default` when absent
    pub config_name: Option<String>,
    pub user: User,
    /// API version substituted into the base path
    pub version: Option<String>,
}

impl DocumentRequest {
    pub fn new(user: User) -> Self {
        Self {
            user,
            ..Default::default()
        }
    }

    pub fn with_config_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: JSON_CONTENT_TYPE,
            body,
        }
    }

    fn detail(status: u16, detail: &str) -> Self {
        Self::json(status, json!({ "detail": detail }).to_string())
    }
}

/// Variant named by a document path: `Some(None)` for `swagger.json`,
/// `Some(Some(name))` for `name/swagger.json`, `None` for anything else
pub fn match_document_path(path: &str) -> Option<Option<String>> {
    let captures = DOCUMENT_PATH.captures(path)?;
    Some(captures.name("swagger_config_name").map(|name| name.as_str().to_string()))
}

/// Reject callers the configuration does not admit
pub fn check_permission(config: &SwaggerConfig, user: User) -> Result<()> {
    if config.requires_superuser && !user.superuser {
        return Err(Error::PermissionDenied("superuser required".to_string()));
    }
    if config.requires_authentication && !user.authenticated {
        return Err(Error::PermissionDenied("authentication required".to_string()));
    }
    Ok(())
}

pub struct SwaggerJsonView<'a> {
    settings: &'a SwaggerSettings,
    registry: &'a Registry,
    routes: &'a RouteTree,
}

impl<'a> SwaggerJsonView<'a> {
    pub fn new(settings: &'a SwaggerSettings, registry: &'a Registry, routes: &'a RouteTree) -> Self {
        Self {
            settings,
            registry,
            routes,
        }
    }

    /// Build the document a request asks for.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConfiguration`] for undeclared variants,
    /// [`Error::PermissionDenied`] when the gate rejects the caller, and any
    /// fatal build error.
    pub fn get(&self, request: &DocumentRequest) -> Result<SwaggerDocument> {
        let name = request
            .config_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CONFIG_NAME);
        let config = self.settings.get_config(Some(name))?;
        check_permission(&config, request.user)?;

        let mut filters = CollectorFilters::from(&config);
        filters.base_path = config.base_path_for(request.version.as_deref());
        let endpoints = RouteCollector::new(filters).collect(self.routes);

        DocumentBuilder::new(&config, name, self.registry)
            .for_user(request.user)
            .with_version(request.version.clone())
            .build(&endpoints)
    }

    /// Answer a GET on `path`
    pub fn dispatch(&self, path: &str, request: DocumentRequest) -> HttpResponse {
        let Some(config_name) = match_document_path(path) else {
            debug!("No document at {}", path);
            return HttpResponse::detail(404, "Not found.");
        };

        let request = DocumentRequest {
            config_name: Some(config_name.unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string())),
            ..request
        };

        match self.get(&request).and_then(|document| Ok(serde_json::to_string(&document)?)) {
            Ok(body) => HttpResponse::json(200, body),
            Err(e) if e.is_permission_denied() => {
                warn!("Refused document {}: {}", path, e);
                HttpResponse::detail(403, &e.to_string())
            }
            Err(e) => {
                error!("Failed to build document {}: {}", path, e);
                HttpResponse::detail(500, &e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{Dto, Field, FieldKind};
    use crate::handler::{Handler, HttpMethod};
    use crate::routes::{UrlInclude, UrlPattern};
    use serde_json::Value;

    const SETTINGS: &str = r#"
global:
  info: {title: Shop, version: "1"}
configs:
  default:
    exclude_namespaces: [admin]
  admin:
    requires_superuser: true
  partners:
    requires_authentication: true
    base_path: /{version}
"#;

    fn fixtures() -> (SwaggerSettings, Registry, RouteTree) {
        let settings = SwaggerSettings::from_yaml_str(SETTINGS).unwrap();
        let mut registry = Registry::new();
        registry.register_dto(
            Dto::new("ProductSerializer", "shop.serializers")
                .with_swagger_name("Product")
                .with_field("name", Field::new(FieldKind::Char)),
        );
        let products = Handler::resource("ProductList", "shop.views", vec![HttpMethod::Get], true)
            .with_serializer(".serializers.ProductSerializer");
        let stats = Handler::plain("StatsView", "admin.views", vec![HttpMethod::Get]);
        let routes = vec![
            UrlPattern::new("^v2/products$", products).into(),
            UrlInclude::new("^admin/", "admin.urls", vec![UrlPattern::new("^stats$", stats).into()])
                .with_namespace("admin")
                .into(),
        ];
        (settings, registry, routes)
    }

    #[test]
    fn test_match_document_path() {
        assert_eq!(match_document_path("/swagger.json"), Some(None));
        assert_eq!(match_document_path("swagger.json"), Some(None));
        assert_eq!(match_document_path("/admin/swagger.json"), Some(Some("admin".to_string())));
        assert_eq!(match_document_path("/a/b/swagger.json"), None);
        assert_eq!(match_document_path("/swagger.yaml"), None);
    }

    #[test]
    fn test_check_permission() {
        let mut config = SwaggerConfig::default();
        assert!(check_permission(&config, User::anonymous()).is_ok());

        config.requires_authentication = true;
        assert!(check_permission(&config, User::anonymous()).unwrap_err().is_permission_denied());
        assert!(check_permission(&config, User::authenticated()).is_ok());

        config.requires_superuser = true;
        assert!(check_permission(&config, User::authenticated()).is_err());
        assert!(check_permission(&config, User::superuser()).is_ok());
    }

    #[test]
    fn test_dispatch_default_document() {
        let (settings, registry, routes) = fixtures();
        let view = SwaggerJsonView::new(&settings, &registry, &routes);

        let response = view.dispatch("/swagger.json", DocumentRequest::new(User::anonymous()));
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["swagger"], "2.0");
        assert_eq!(body["info"]["title"], "Shop");
        assert!(body["paths"]["/v2/products"].is_object());
        assert!(body["paths"].get("/admin/stats").is_none());
        assert!(body["definitions"]["Product"].is_object());
    }

    #[test]
    fn test_bare_path_serves_default_variant() {
        let (settings, registry, routes) = fixtures();
        let view = SwaggerJsonView::new(&settings, &registry, &routes);

        let request = DocumentRequest::new(User::anonymous()).with_config_name("admin");
        let response = view.dispatch("/swagger.json", request);
        assert_eq!(response.status, 200);
        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["paths"].get("/admin/stats").is_none());

        let request = DocumentRequest::new(User::anonymous()).with_config_name("default");
        assert_eq!(view.dispatch("/admin/swagger.json", request).status, 403);
    }

    #[test]
    fn test_dispatch_statuses() {
        let (settings, registry, routes) = fixtures();
        let view = SwaggerJsonView::new(&settings, &registry, &routes);

        let refused = view.dispatch("/admin/swagger.json", DocumentRequest::new(User::authenticated()));
        assert_eq!(refused.status, 403);

        let admitted = view.dispatch("/admin/swagger.json", DocumentRequest::new(User::superuser()));
        assert_eq!(admitted.status, 200);
        let body: Value = serde_json::from_str(&admitted.body).unwrap();
        assert!(body["paths"]["/admin/stats"].is_object());

        let unknown = view.dispatch("/internal/swagger.json", DocumentRequest::new(User::superuser()));
        assert_eq!(unknown.status, 500);
        assert!(unknown.body.contains("internal swagger settings not defined"));

        let missing = view.dispatch("/docs", DocumentRequest::new(User::superuser()));
        assert_eq!(missing.status, 404);
    }

    #[test]
    fn test_versioned_base_path() {
        let (settings, registry, routes) = fixtures();
        let view = SwaggerJsonView::new(&settings, &registry, &routes);
        let request = DocumentRequest::new(User::authenticated())
            .with_config_name("partners")
            .with_version("v2");

        let document = view.get(&request).unwrap();
        assert_eq!(document.base_path, "/v2");
        assert!(document.paths.contains_key("/products"));
    }

    #[test]
    fn test_unknown_configuration_is_fatal() {
        let (settings, registry, routes) = fixtures();
        let view = SwaggerJsonView::new(&settings, &registry, &routes);
        let request = DocumentRequest::new(User::superuser()).with_config_name("missing");
        assert!(matches!(view.get(&request), Err(Error::UnknownConfiguration(_))));
    }
}
