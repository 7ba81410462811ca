use crate::config::SwaggerConfig;
use crate::routes::{
    simplify_pattern, strip_base_path, Endpoint, RouteNode, RouteTree, UrlInclude, UrlPattern,
    FORMAT_SUFFIX_MARKER,
};
use log::debug;

/// Which parts of the route tree a document covers
#[derive(Debug, Clone, Default)]
pub struct CollectorFilters {
    pub exclude_namespaces: Vec<String>,
    pub exclude_module_paths: Vec<String>,
    pub include_module_paths: Vec<String>,
    /// Substrings of normalized paths to leave out
    pub exclude_url_patterns: Vec<String>,
    /// Exact route names to leave out
    pub exclude_url_patterns_names: Vec<String>,
    pub base_path: String,
}

impl From<&SwaggerConfig> for CollectorFilters {
    fn from(config: &SwaggerConfig) -> Self {
        Self {
            exclude_namespaces: config.exclude_namespaces.clone(),
            exclude_module_paths: config.exclude_module_paths.clone(),
            include_module_paths: config.include_module_paths.clone(),
            exclude_url_patterns: config.exclude_url_patterns.clone(),
            exclude_url_patterns_names: config.exclude_url_patterns_names.clone(),
            base_path: config.base_path.clone(),
        }
    }
}

/// Flattens a route tree into documented endpoints.
///
/// Walks the tree depth-first, concatenating raw prefixes, and keeps leaves
/// bound to an API handler whose path survives the configured filters.
pub struct RouteCollector {
    filters: CollectorFilters,
}

impl RouteCollector {
    pub fn new(filters: CollectorFilters) -> Self {
        Self { filters }
    }

    /// Collect every documented endpoint of `tree`, in registration order
    pub fn collect<'a>(&self, tree: &'a RouteTree) -> Vec<Endpoint<'a>> {
        let mut endpoints = Vec::new();
        self.flatten(tree, "", &mut endpoints);
        debug!("Collected {} endpoints", endpoints.len());
        endpoints
    }

    fn flatten<'a>(&self, nodes: &'a [RouteNode], prefix: &str, out: &mut Vec<Endpoint<'a>>) {
        for node in nodes {
            match node {
                RouteNode::Pattern(route) => {
                    let Some(endpoint) = self.assemble_endpoint(route, prefix) else {
                        continue;
                    };

                    if self
                        .filters
                        .exclude_url_patterns
                        .iter()
                        .any(|excluded| endpoint.path.contains(excluded.as_str()))
                    {
                        debug!("Excluding {} by path fragment", endpoint.path);
                        continue;
                    }

                    if let Some(name) = &route.name {
                        if self.filters.exclude_url_patterns_names.contains(name) {
                            debug!("Excluding {} by route name {}", endpoint.path, name);
                            continue;
                        }
                    }

                    out.push(endpoint);
                }
                RouteNode::Include(include) => {
                    if self.skip_include(include) {
                        continue;
                    }
                    let nested_prefix = format!("{}{}", prefix, include.prefix);
                    self.flatten(&include.routes, &nested_prefix, out);
                }
            }
        }
    }

    fn skip_include(&self, include: &UrlInclude) -> bool {
        let filters = &self.filters;

        if !filters.include_module_paths.is_empty()
            && !filters.include_module_paths.contains(&include.module)
        {
            debug!("Skipping sub-tree {}: module not included", include.module);
            return true;
        }

        if filters.exclude_module_paths.contains(&include.module) {
            debug!("Skipping sub-tree {}: module excluded", include.module);
            return true;
        }

        if let Some(namespace) = &include.namespace {
            if filters.exclude_namespaces.contains(namespace) {
                debug!("Skipping sub-tree under namespace {}", namespace);
                return true;
            }
        }

        false
    }

    fn assemble_endpoint<'a>(&self, route: &'a UrlPattern, prefix: &str) -> Option<Endpoint<'a>> {
        let handler = route.handler.as_ref()?;
        if handler.root_listing {
            return None;
        }

        let pattern = format!("{}{}", prefix, route.pattern);
        let path = simplify_pattern(&pattern);
        if path.contains(FORMAT_SUFFIX_MARKER) {
            return None;
        }

        Some(Endpoint {
            path: strip_base_path(&path, &self.filters.base_path),
            pattern,
            route,
            handler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Handler, HttpMethod};

    fn handler(name: &str) -> Handler {
        Handler::plain(name, "app.views", vec![HttpMethod::Get])
    }

    fn tree() -> RouteTree {
        vec![
            UrlPattern::new("^health$", handler("HealthView")).named("health").into(),
            UrlPattern::non_api("^admin/$").into(),
            UrlInclude::new(
                "^api/",
                "shop.urls",
                vec![
                    UrlPattern::new("^$", Handler::api_root()).into(),
                    UrlPattern::new("^products$", handler("ProductList")).named("product-list").into(),
                    UrlPattern::new("^products\\.(?P<format>[a-z0-9]+)/?$", handler("ProductList")).into(),
                    UrlPattern::new("^products/(?P<pk>[0-9]+)$", handler("ProductDetail"))
                        .named("product-detail")
                        .into(),
                ],
            )
            .with_namespace("shop")
            .into(),
            UrlInclude::new(
                "^internal/",
                "internal.urls",
                vec![UrlPattern::new("^stats$", handler("StatsView")).into()],
            )
            .with_namespace("internal")
            .into(),
        ]
    }

    fn paths(endpoints: &[Endpoint]) -> Vec<String> {
        endpoints.iter().map(|e| e.path.clone()).collect()
    }

    #[test]
    fn test_collect_flattens_tree() {
        let tree = tree();
        let collector = RouteCollector::new(CollectorFilters::default());
        let endpoints = collector.collect(&tree);

        assert_eq!(
            paths(&endpoints),
            vec!["/health", "/api/products", "/api/products/{pk}", "/internal/stats"]
        );
        assert_eq!(endpoints[2].handler.name, "ProductDetail");
        assert_eq!(endpoints[2].pattern, "^api/^products/(?P<pk>[0-9]+)$");
    }

    #[test]
    fn test_exclude_namespace() {
        let tree = tree();
        let collector = RouteCollector::new(CollectorFilters {
            exclude_namespaces: vec!["internal".to_string()],
            ..Default::default()
        });
        let endpoints = collector.collect(&tree);
        assert!(!paths(&endpoints).contains(&"/internal/stats".to_string()));
        assert_eq!(endpoints.len(), 3);
    }

    #[test]
    fn test_include_and_exclude_module_paths() {
        let tree = tree();

        let included = RouteCollector::new(CollectorFilters {
            include_module_paths: vec!["shop.urls".to_string()],
            ..Default::default()
        })
        .collect(&tree);
        // top-level leaves are not inside any sub-tree and stay
        assert_eq!(paths(&included), vec!["/health", "/api/products", "/api/products/{pk}"]);

        let excluded = RouteCollector::new(CollectorFilters {
            exclude_module_paths: vec!["shop.urls".to_string()],
            ..Default::default()
        })
        .collect(&tree);
        assert_eq!(paths(&excluded), vec!["/health", "/internal/stats"]);
    }

    #[test]
    fn test_exclude_url_patterns_and_names() {
        let tree = tree();
        let endpoints = RouteCollector::new(CollectorFilters {
            exclude_url_patterns: vec!["/internal".to_string()],
            exclude_url_patterns_names: vec!["product-detail".to_string()],
            ..Default::default()
        })
        .collect(&tree);
        assert_eq!(paths(&endpoints), vec!["/health", "/api/products"]);
    }

    #[test]
    fn test_base_path_is_stripped() {
        let tree = tree();
        let endpoints = RouteCollector::new(CollectorFilters {
            base_path: "/api".to_string(),
            ..Default::default()
        })
        .collect(&tree);
        assert_eq!(
            paths(&endpoints),
            vec!["/health", "/products", "/products/{pk}", "/internal/stats"]
        );
    }

    #[test]
    fn test_no_format_suffix_endpoints() {
        let tree = tree();
        let endpoints = RouteCollector::new(CollectorFilters::default()).collect(&tree);
        assert!(endpoints.iter().all(|e| !e.path.contains(FORMAT_SUFFIX_MARKER)));
    }
}
