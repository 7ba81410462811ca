//! Per-build accumulator.
//!
//! DTOs and inline response types discovered while operations are built are
//! recorded here and turned into definitions once every operation is done.
//! A context lives for exactly one document build.

use crate::schema_generator::{DtoRef, Schema};
use indexmap::{IndexMap, IndexSet};
use log::debug;

#[derive(Debug, Default)]
pub struct BuildContext {
    dtos: IndexSet<DtoRef>,
    response_types: IndexMap<String, Schema>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a DTO whose definition the document needs
    pub fn add_dto(&mut self, dto: DtoRef) {
        if self.dtos.insert(dto.clone()) {
            debug!("Discovered DTO {:?}", dto);
        }
    }

    /// Record a named inline definition; a later one under the same name wins
    pub fn add_response_type(&mut self, name: impl Into<String>, schema: Schema) {
        self.response_types.insert(name.into(), schema);
    }

    pub fn dtos(&self) -> impl Iterator<Item = &DtoRef> {
        self.dtos.iter()
    }

    pub fn response_types(&self) -> impl Iterator<Item = (&String, &Schema)> {
        self.response_types.iter()
    }

    pub fn has_response_type(&self, name: &str) -> bool {
        self.response_types.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_generator::Variant;

    #[test]
    fn test_dtos_are_deduplicated() {
        let mut context = BuildContext::new();
        let dto = DtoRef {
            path: "shop.Product".to_string(),
            variant: Variant::Read,
        };
        context.add_dto(dto.clone());
        context.add_dto(dto);
        context.add_dto(DtoRef {
            path: "shop.Product".to_string(),
            variant: Variant::Write,
        });
        assert_eq!(context.dtos().count(), 2);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut first = BuildContext::new();
        first.add_response_type("PingGetResponse", Schema::typed("object"));
        let second = BuildContext::new();

        assert!(first.has_response_type("PingGetResponse"));
        assert!(!second.has_response_type("PingGetResponse"));
        assert_eq!(second.response_types().count(), 0);
    }
}
