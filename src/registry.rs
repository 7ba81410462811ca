//! Name-based lookup of DTOs and view mockers.
//!
//! Overrides name DTOs by dotted path (`products.serializers.ProductSerializer`,
//! `.serializers.ProductSerializer`, `ProductSerializer`). The registry is
//! populated at startup and resolves those references relative to the
//! module of the handler that made them.

use crate::dto::Dto;
use crate::error::{Error, Result};
use crate::handler::ViewContext;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Adjusts a view context before its DTO is selected; `None` skips selection
#[derive(Clone)]
pub struct ViewMocker(Arc<dyn Fn(ViewContext) -> Option<ViewContext> + Send + Sync>);

impl ViewMocker {
    pub fn new<F>(mock: F) -> Self
    where
        F: Fn(ViewContext) -> Option<ViewContext> + Send + Sync + 'static,
    {
        Self(Arc::new(mock))
    }

    pub fn apply(&self, view: ViewContext) -> Option<ViewContext> {
        (self.0)(view)
    }
}

impl fmt::Debug for ViewMocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ViewMocker(..)")
    }
}

/// Startup-time registry shared read-only by every document build
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Keyed by dotted path
    dtos: HashMap<String, Dto>,
    mockers: HashMap<String, ViewMocker>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DTO under its dotted path; a later registration replaces an earlier one
    pub fn register_dto(&mut self, dto: Dto) {
        debug!("Registering DTO {}", dto.path());
        self.dtos.insert(dto.path(), dto);
    }

    pub fn register_mocker(&mut self, name: impl Into<String>, mocker: ViewMocker) {
        self.mockers.insert(name.into(), mocker);
    }

    pub fn len(&self) -> usize {
        self.dtos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dtos.is_empty()
    }

    /// Find a DTO by dotted path, or by type name when exactly one DTO has it
    pub fn dto(&self, name: &str) -> Option<&Dto> {
        if let Some(dto) = self.dtos.get(name) {
            return Some(dto);
        }

        let mut by_name = self.dtos.values().filter(|dto| dto.name == name);
        match (by_name.next(), by_name.next()) {
            (Some(dto), None) => Some(dto),
            _ => None,
        }
    }

    /// The DTO published under definition name `name`, when exactly one is
    pub fn dto_by_definition_name(&self, name: &str) -> Option<&Dto> {
        let mut published = self.dtos.values().filter(|dto| dto.canonical_name() == name);
        match (published.next(), published.next()) {
            (Some(dto), None) => Some(dto),
            _ => None,
        }
    }

    /// Resolve a DTO reference made from `module`.
    ///
    /// Bare names are looked up inside `module` first, leading dots are
    /// relative to `module`, anything else is an absolute dotted path.
    /// The final fallback treats the reference as a path re-exported by
    /// `module` (`submodule.FooSerializer`).
    pub fn resolve_dto(&self, reference: &str, module: &str) -> Result<&Dto> {
        debug!("Resolving DTO reference {} from {}", reference, module);

        let candidates = Self::candidate_paths(reference, module);
        for candidate in &candidates {
            if let Some(dto) = self.dtos.get(candidate) {
                return Ok(dto);
            }
        }

        let class_name = reference.rsplit('.').next().unwrap_or(reference);
        let mut by_suffix = self
            .dtos
            .iter()
            .filter(|(path, dto)| dto.name == class_name && path.ends_with(reference.trim_start_matches('.')));
        if let (Some((_, dto)), None) = (by_suffix.next(), by_suffix.next()) {
            return Ok(dto);
        }

        if !reference.contains('.') {
            if let Some(dto) = self.dto(reference) {
                return Ok(dto);
            }
        }

        Err(Error::DynamicReference {
            reference: reference.to_string(),
            module: module.to_string(),
        })
    }

    pub fn resolve_mocker(&self, reference: &str, module: &str) -> Result<&ViewMocker> {
        Self::candidate_paths(reference, module)
            .iter()
            .find_map(|candidate| self.mockers.get(candidate))
            .or_else(|| self.mockers.get(reference))
            .ok_or_else(|| Error::DynamicReference {
                reference: reference.to_string(),
                module: module.to_string(),
            })
    }

    fn candidate_paths(reference: &str, module: &str) -> Vec<String> {
        let join = |prefix: &str, rest: &str| {
            if prefix.is_empty() {
                rest.to_string()
            } else {
                format!("{}.{}", prefix, rest)
            }
        };

        if !reference.contains('.') {
            return vec![join(module, reference)];
        }

        if reference.starts_with('.') {
            // one leading dot is the current package, each further dot climbs one level
            let rest = reference.trim_start_matches('.');
            let levels = reference.len() - rest.len();
            let mut package: Vec<&str> = module.split('.').filter(|part| !part.is_empty()).collect();
            package.pop();
            for _ in 1..levels {
                package.pop();
            }
            return vec![join(&package.join("."), rest), join(module, rest)];
        }

        vec![reference.to_string(), join(module, reference)]
    }
}
