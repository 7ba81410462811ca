use crate::dto::{Dto, Field, FieldKind};
use crate::registry::Registry;
use indexmap::{IndexMap, IndexSet};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Primitive types and the formats each accepts, first format being the default
pub const PRIMITIVES: &[(&str, &[&str])] = &[
    ("integer", &["int32", "int64"]),
    ("number", &["float", "double"]),
    ("string", &["string", "byte", "date", "date-time"]),
    ("boolean", &["boolean"]),
];

/// Marker type of fields that never appear in a definition
const HIDDEN: &str = "hidden";

/// Swagger 2.0 schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a definition
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Properties of object schemas, in declaration order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Element schema of array schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "readOnly", default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<Value>,
    #[serde(rename = "x-nullable", default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Any other keys, kept verbatim
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Schema {
    /// A `$ref` to a named definition
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(definition_ref(name)),
            ..Default::default()
        }
    }

    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    /// Every `$ref` in this schema and its children
    pub fn references(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        if let Some(reference) = &self.reference {
            refs.push(reference);
        }
        if let Some(items) = &self.items {
            items.collect_references(refs);
        }
        for property in self.properties.values() {
            property.collect_references(refs);
        }
    }
}

/// JSON pointer of a definition
pub fn definition_ref(name: &str) -> String {
    format!("#/definitions/{}", name)
}

/// Resolve a `(type, format)` pair against the primitive table.
///
/// An unknown format falls back to the first format of the type, a format
/// equal to its type is dropped and arrays never carry a format.
pub fn normalize_data_format(data_type: &str, data_format: Option<&str>) -> (String, Option<String>) {
    let mut format = if data_type == "array" { None } else { data_format };

    let known = format.map_or(false, |format| {
        PRIMITIVES.iter().any(|(_, formats)| formats.contains(&format))
    });
    if !known {
        format = PRIMITIVES
            .iter()
            .find(|(primitive, _)| *primitive == data_type)
            .map(|(_, formats)| formats[0]);
    }
    if format == Some(data_type) {
        format = None;
    }

    (data_type.to_string(), format.map(str::to_string))
}

/// Swagger `(type, format)` of a field
pub fn data_type(field: &Field) -> (&'static str, &'static str) {
    kind_data_type(&field.kind, field)
}

fn kind_data_type(kind: &FieldKind, field: &Field) -> (&'static str, &'static str) {
    match kind {
        FieldKind::Boolean | FieldKind::NullBoolean => ("boolean", "boolean"),
        FieldKind::Json | FieldKind::Dict | FieldKind::Model => ("object", "object"),
        FieldKind::List { .. } => ("array", "array"),
        FieldKind::Choice | FieldKind::MultipleChoice => {
            let integer_keys = field
                .choices
                .first()
                .map_or(false, |choice| choice.0.is_i64() || choice.0.is_u64());
            if integer_keys {
                ("integer", "int64")
            } else {
                ("string", "string")
            }
        }
        FieldKind::Date => ("string", "date"),
        FieldKind::DateTime => ("string", "date-time"),
        FieldKind::Integer => ("integer", "int64"),
        FieldKind::Float => ("number", "float"),
        FieldKind::Hidden => (HIDDEN, HIDDEN),
        _ => ("string", "string"),
    }
}

/// Which direction a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// Response-shaped: write-only fields left out
    Read,
    /// Request-shaped: read-only fields left out, published as `Write<Name>`
    Write,
}

/// A DTO reachable from the document, by registry path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DtoRef {
    pub path: String,
    pub variant: Variant,
}

impl DtoRef {
    pub fn read(dto: &Dto) -> Self {
        Self {
            path: dto.path(),
            variant: Variant::Read,
        }
    }

    pub fn write(dto: &Dto) -> Self {
        Self {
            path: dto.path(),
            variant: Variant::Write,
        }
    }
}

/// Name a DTO's definition is published under for a variant
pub fn definition_name(dto: &Dto, variant: Variant) -> String {
    match variant {
        Variant::Read => dto.canonical_name().to_string(),
        Variant::Write => format!("Write{}", dto.canonical_name()),
    }
}

/// Builds the closed set of definitions reachable from a set of DTOs
pub struct SchemaGenerator<'a> {
    registry: &'a Registry,
    /// Generated definitions (name -> schema)
    definitions: BTreeMap<String, Schema>,
    /// Every DTO already synthesized or queued
    seen: IndexSet<DtoRef>,
    pending: Vec<DtoRef>,
}

impl<'a> SchemaGenerator<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            registry,
            definitions: BTreeMap::new(),
            seen: IndexSet::new(),
            pending: Vec::new(),
        }
    }

    /// Queue a DTO for synthesis; already-seen DTOs are ignored
    pub fn add(&mut self, dto_ref: DtoRef) {
        if self.seen.insert(dto_ref.clone()) {
            self.pending.push(dto_ref);
        }
    }

    /// Synthesize every queued DTO and everything it reaches, until nothing new turns up
    pub fn generate(&mut self) {
        while let Some(dto_ref) = self.pending.pop() {
            let Some(dto) = self.registry.dto(&dto_ref.path) else {
                warn!("DTO {} is not registered, skipping its definition", dto_ref.path);
                continue;
            };

            let name = definition_name(dto, dto_ref.variant);
            if self.definitions.contains_key(&name) {
                debug!("Definition {} already generated", name);
                continue;
            }

            debug!("Generating definition {}", name);
            let definition = self.definition(dto, dto_ref.variant);
            self.definitions.insert(name, definition);
        }
    }

    /// Finish generation and hand over the definition map
    pub fn into_definitions(mut self) -> BTreeMap<String, Schema> {
        self.generate();
        self.definitions
    }

    /// Type definition of one DTO; referenced DTOs are queued for the closure
    pub fn definition(&mut self, dto: &Dto, variant: Variant) -> Schema {
        if let Some(child) = &dto.child {
            return match self.lookup(child, &dto.module) {
                Some(child_dto) => {
                    let child_ref = DtoRef {
                        path: child_dto.path(),
                        variant,
                    };
                    let name = definition_name(child_dto, variant);
                    self.add(child_ref);
                    Schema::array_of(Schema::reference(&name))
                }
                None => Schema::array_of(Schema::typed("object")),
            };
        }

        let mut schema = Schema::typed("object");
        for (name, field) in &dto.fields {
            let excluded = match variant {
                Variant::Read => field.write_only,
                Variant::Write => field.read_only,
            };
            if excluded {
                continue;
            }

            let Some(property) = self.property(field, &dto.module) else {
                continue;
            };
            if field.required {
                schema.required.push(name.clone());
            }
            schema.properties.insert(name.clone(), property);
        }
        schema
    }

    /// Property schema of a field, `None` for hidden fields
    fn property(&mut self, field: &Field, module: &str) -> Option<Schema> {
        let (field_type, field_format) = data_type(field);
        if field_type == HIDDEN {
            return None;
        }

        let mut property = Schema {
            schema_type: Some(field_type.to_string()),
            format: (field_format != field_type).then(|| field_format.to_string()),
            description: Some(field.help_text.clone().unwrap_or_default()),
            default: field.default.clone().filter(|value| !value.is_null()),
            read_only: field.read_only.then_some(true),
            nullable: field.allow_null.then_some(true),
            ..Default::default()
        };

        if field_type == "integer" {
            property.minimum = field.min_value.clone();
            property.maximum = field.max_value.clone();
        }

        if matches!(field.kind, FieldKind::Choice | FieldKind::MultipleChoice) && !field.choices.is_empty() {
            property.enum_values = Some(field.choices.iter().map(|choice| choice.0.clone()).collect());
        }

        match &field.kind {
            FieldKind::Nested { dto, many } => {
                property.format = None;
                if !field.documented {
                    property.schema_type = Some("object".to_string());
                    return Some(property);
                }

                let target = match self.lookup(dto, module) {
                    Some(nested) => {
                        let variant = if field.write_only { Variant::Write } else { Variant::Read };
                        let name = definition_name(nested, variant);
                        self.add(DtoRef {
                            path: nested.path(),
                            variant,
                        });
                        Schema::reference(&name)
                    }
                    None => {
                        warn!("Nested DTO {} is not registered, documenting it as an object", dto);
                        Schema::typed("object")
                    }
                };

                if *many {
                    property.schema_type = Some("array".to_string());
                    property.items = Some(Box::new(target));
                } else if target.reference.is_some() {
                    property.schema_type = None;
                    property.reference = target.reference;
                } else {
                    property.schema_type = Some("object".to_string());
                }
            }
            FieldKind::ManyRelated => {
                property.schema_type = Some("array".to_string());
                property.format = None;
                property.items = Some(Box::new(Schema::typed("string")));
            }
            FieldKind::List { child } => {
                let item_type = child
                    .as_deref()
                    .map(|kind| kind_data_type(kind, field).0)
                    .filter(|item_type| *item_type != HIDDEN)
                    .unwrap_or("string");
                property.items = Some(Box::new(Schema::typed(item_type)));
            }
            _ => {}
        }

        Some(property)
    }

    fn lookup(&self, name: &str, module: &str) -> Option<&'a Dto> {
        self.registry
            .resolve_dto(name, module)
            .ok()
            .or_else(|| self.registry.dto(name))
    }
}

/// Standard wrapper of paginated list responses
pub fn pagination_envelope(items: Schema) -> Schema {
    let field = |schema_type: &str| Schema {
        schema_type: Some(schema_type.to_string()),
        description: Some(String::new()),
        read_only: Some(true),
        ..Default::default()
    };

    let mut results = field("array");
    results.items = Some(Box::new(items));

    let mut envelope = Schema::typed("object");
    envelope.properties.insert("next".to_string(), field("string"));
    envelope.properties.insert("previous".to_string(), field("string"));
    envelope.properties.insert("count".to_string(), field("integer"));
    envelope.properties.insert("results".to_string(), results);
    envelope.properties.insert("page".to_string(), field("integer"));
    envelope.properties.insert("size".to_string(), field("integer"));
    envelope
}
