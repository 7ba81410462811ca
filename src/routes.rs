//! Route tree registered by the host application.
//!
//! A [`RouteTree`] is an ordered list of [`RouteNode`]s. Leaves bind a URL
//! pattern to a [`Handler`]; includes nest a sub-tree under a prefix and
//! carry the namespace and module identity used by the collector's
//! filters. Patterns may be written as anchored regular expressions
//! (`^products/(?P<product_id>[0-9]+)$`), with angle-bracket converters
//! (`products/<int:product_id>`), colon segments (`/products/:product_id`)
//! or already in template form (`/products/{product_id}`).

use crate::handler::Handler;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Marker left in a normalized path by format-suffix patterns
pub const FORMAT_SUFFIX_MARKER: &str = ".{format}";

/// Ordered, possibly nested, route registrations
pub type RouteTree = Vec<RouteNode>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteNode {
    Include(UrlInclude),
    Pattern(UrlPattern),
}

/// A leaf route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlPattern {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `None` for routes served by something other than an API handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<Handler>,
    /// Arguments the pattern passes to its handler
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_args: BTreeMap<String, String>,
}

/// A sub-tree mounted under a prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlInclude {
    #[serde(rename = "include")]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Dotted module that declared the sub-tree
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub routes: RouteTree,
}

/// One routed URL template bound to a handler
#[derive(Debug, Clone)]
pub struct Endpoint<'a> {
    /// Normalized, base-path-stripped template with `{param}` placeholders
    pub path: String,
    /// Raw pattern, prefixes included
    pub pattern: String,
    pub route: &'a UrlPattern,
    pub handler: &'a Handler,
}

impl UrlPattern {
    pub fn new(pattern: impl Into<String>, handler: Handler) -> Self {
        Self {
            pattern: pattern.into(),
            name: None,
            handler: Some(handler),
            default_args: BTreeMap::new(),
        }
    }

    /// A route that is not served by an API handler
    pub fn non_api(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: None,
            handler: None,
            default_args: BTreeMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_default_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_args.insert(key.into(), value.into());
        self
    }
}

impl UrlInclude {
    pub fn new(prefix: impl Into<String>, module: impl Into<String>, routes: RouteTree) -> Self {
        Self {
            prefix: prefix.into(),
            namespace: None,
            module: module.into(),
            routes,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl From<UrlPattern> for RouteNode {
    fn from(pattern: UrlPattern) -> Self {
        RouteNode::Pattern(pattern)
    }
}

impl From<UrlInclude> for RouteNode {
    fn from(include: UrlInclude) -> Self {
        RouteNode::Include(include)
    }
}

/// Turn a raw pattern into a `{param}` path template.
///
/// Named regex groups become `{name}`, unnamed groups `{var}`; angle-bracket
/// and colon parameters become `{name}`; anchors, `?` and escapes are
/// dropped; doubled slashes are collapsed and a leading `/` is enforced.
pub fn simplify_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '(' => {
                let Some(end) = closing_paren(&chars, i) else {
                    // an unclosed group swallows the rest of the pattern
                    out.push_str("{var}");
                    break;
                };
                let group: String = chars[i + 1..end].iter().collect();
                if let Some(rest) = group.strip_prefix("?P<") {
                    let name = rest.split('>').next().unwrap_or_default();
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                } else if group.starts_with("?:") {
                    // non-capturing groups keep their literal text
                    out.push_str(&simplify_literal(&group[2..]));
                } else {
                    out.push_str("{var}");
                }
                i = end + 1;
            }
            '<' => {
                let end = chars[i..].iter().position(|c| *c == '>').map(|p| i + p);
                match end {
                    Some(end) => {
                        let inner: String = chars[i + 1..end].iter().collect();
                        let name = inner.rsplit(':').next().unwrap_or_default();
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                        i = end + 1;
                    }
                    None => {
                        out.push('{');
                        i += 1;
                    }
                }
            }
            ':' if i == 0 || chars[i - 1] == '/' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == '/')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                let name: String = chars[i + 1..end].iter().collect();
                out.push('{');
                out.push_str(&name);
                out.push('}');
                i = end;
            }
            '^' | '$' | '?' | '\\' => i += 1,
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    while out.contains("//") {
        out = out.replace("//", "/");
    }
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    out
}

fn simplify_literal(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '^' | '$' | '?' | '\\'))
        .collect()
}

/// Index of the parenthesis closing the group opened at `open`, `None` when unbalanced
fn closing_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (offset, c) in chars[open..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip a configured base path from the front of a template
pub fn strip_base_path(path: &str, base_path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(base) {
        Some("") => "/".to_string(),
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HttpMethod;

    #[test]
    fn test_simplify_named_group() {
        assert_eq!(
            simplify_pattern("^products/(?P<product_id>[0-9]+)$"),
            "/products/{product_id}"
        );
    }

    #[test]
    fn test_simplify_nested_groups() {
        assert_eq!(
            simplify_pattern("^files/(?P<path>(a|b)+)/(\\d+)$"),
            "/files/{path}/{var}"
        );
    }

    #[test]
    fn test_simplify_concatenated_prefixes() {
        assert_eq!(
            simplify_pattern("^api/^products/(?P<pk>[^/.]+)/$"),
            "/api/products/{pk}/"
        );
    }

    #[test]
    fn test_simplify_format_suffix() {
        let path = simplify_pattern("^products\\.(?P<format>[a-z0-9]+)/?$");
        assert_eq!(path, "/products.{format}/");
        assert!(path.contains(FORMAT_SUFFIX_MARKER));
    }

    #[test]
    fn test_simplify_converters_and_colons() {
        assert_eq!(simplify_pattern("products/<int:product_id>"), "/products/{product_id}");
        assert_eq!(simplify_pattern("/users/:id/posts/:post_id"), "/users/{id}/posts/{post_id}");
        assert_eq!(simplify_pattern("/users/{id}"), "/users/{id}");
    }

    #[test]
    fn test_simplify_unclosed_group() {
        assert_eq!(simplify_pattern("^products/("), "/products/{var}");
        assert_eq!(simplify_pattern("^products/(?P<pk>[0-9]+$"), "/products/{var}");
        assert_eq!(simplify_pattern("^a/(b)/(c"), "/a/{var}/{var}");
    }

    #[test]
    fn test_strip_base_path() {
        assert_eq!(strip_base_path("/api/products", "/api"), "/products");
        assert_eq!(strip_base_path("/api/products", "/api/"), "/products");
        assert_eq!(strip_base_path("/api", "/api"), "/");
        assert_eq!(strip_base_path("/apiary/bees", "/api"), "/apiary/bees");
        assert_eq!(strip_base_path("/products", ""), "/products");
    }

    #[test]
    fn test_deserialize_route_nodes() {
        let yaml = r#"
- include: '^api/'
  namespace: v1
  module: shop.urls
  routes:
    - pattern: '^products$'
      name: product-list
      handler:
        name: ProductView
        kind: plain
        methods: [GET]
- pattern: '^admin/$'
"#;
        let tree: RouteTree = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(tree.len(), 2);

        match &tree[0] {
            RouteNode::Include(include) => {
                assert_eq!(include.prefix, "^api/");
                assert_eq!(include.namespace.as_deref(), Some("v1"));
                match &include.routes[0] {
                    RouteNode::Pattern(pattern) => {
                        let handler = pattern.handler.as_ref().unwrap();
                        assert_eq!(handler.name, "ProductView");
                        assert_eq!(pattern.name.as_deref(), Some("product-list"));
                    }
                    other => panic!("expected pattern, got {:?}", other),
                }
            }
            other => panic!("expected include, got {:?}", other),
        }

        match &tree[1] {
            RouteNode::Pattern(pattern) => assert!(pattern.handler.is_none()),
            other => panic!("expected pattern, got {:?}", other),
        }
    }

    #[test]
    fn test_builders() {
        let handler = crate::handler::Handler::plain("Ping", "ops", vec![HttpMethod::Get]);
        let route = UrlPattern::new("^ping$", handler).named("ping").with_default_arg("version", "v1");
        assert_eq!(route.name.as_deref(), Some("ping"));
        assert_eq!(route.default_args["version"], "v1");
    }
}
