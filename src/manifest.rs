//! Declarative registration.
//!
//! A manifest is a YAML (or JSON) file declaring DTOs and a route tree:
//!
//! ```yaml
//! dtos:
//!   - name: ProductSerializer
//!     module: products.serializers
//!     swagger_name: Product
//!     fields:
//!       name: {kind: char, required: true}
//! routes:
//!   - pattern: '^products$'
//!     handler:
//!       name: ProductList
//!       module: products.views
//!       kind: resource_action
//!       methods: [GET, POST]
//!       list: true
//!       serializer: .serializers.ProductSerializer
//! ```
//!
//! Several manifests merge into one [`Registry`] and one [`RouteTree`].

use crate::dto::Dto;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::routes::RouteTree;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub dtos: Vec<Dto>,
    #[serde(default)]
    pub routes: RouteTree,
}

impl Manifest {
    /// Parse manifest text; JSON is accepted as YAML
    pub fn parse(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        debug!("Loading manifest {}", path.display());
        let content = fs::read_to_string(path)?;
        let manifest = Self::parse(&content).map_err(|e| Error::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(
            "Manifest {} declares {} DTOs and {} routes",
            path.display(),
            manifest.dtos.len(),
            manifest.routes.len()
        );
        Ok(manifest)
    }

    /// Load and merge manifests in order, carrying on past broken ones.
    ///
    /// Returns the merged manifest and the errors of the files that were left out.
    pub fn load_files(paths: &[PathBuf]) -> (Self, Vec<Error>) {
        let mut merged = Self::default();
        let mut errors = Vec::new();

        for path in paths {
            match Self::load_file(path) {
                Ok(manifest) => merged.merge(manifest),
                Err(e) => {
                    warn!("Skipping manifest {}: {}", path.display(), e);
                    errors.push(e);
                }
            }
        }

        debug!(
            "Loaded {} of {} manifests",
            paths.len() - errors.len(),
            paths.len()
        );
        (merged, errors)
    }

    /// Append the declarations of `other`; later DTOs replace same-path ones
    pub fn merge(&mut self, other: Manifest) {
        self.dtos.extend(other.dtos);
        self.routes.extend(other.routes);
    }

    /// Registry of the declared DTOs, and the route tree
    pub fn into_parts(self) -> (Registry, RouteTree) {
        let mut registry = Registry::new();
        for dto in self.dtos {
            registry.register_dto(dto);
        }
        (registry, self.routes)
    }
}
