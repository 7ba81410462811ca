//! Data-transfer object descriptions.
//!
//! A [`Dto`] is the registered shape of a request or response payload: an
//! ordered map of named [`Field`]s, each carrying its kind and visibility
//! flags. DTOs are declared once at startup (in code or in a manifest) and
//! looked up by name through the [`crate::registry::Registry`] while a
//! document is built.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registered payload shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dto {
    /// Type name, e.g. `ProductSerializer`
    pub name: String,
    /// Dotted module the DTO is declared in, e.g. `products.serializers`
    #[serde(default)]
    pub module: String,
    /// Name to publish the definition under instead of `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swagger_name: Option<String>,
    /// Ordered field map
    #[serde(default)]
    pub fields: IndexMap<String, Field>,
    /// Element DTO name when this DTO describes a list of another DTO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child: Option<String>,
    /// Whether write operations send this DTO as a JSON body
    #[serde(default)]
    pub in_body: bool,
}

/// A single DTO field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(default)]
    pub allow_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<Value>,
    /// Nested DTOs flagged as undocumented render as opaque objects
    #[serde(default = "default_documented")]
    pub documented: bool,
}

fn default_documented() -> bool {
    true
}

/// The kind of value a field holds.
///
/// Kinds without a dedicated entry in the primitive lookup table
/// (`Email`, `Url`, `Decimal`, ...) are documented as plain strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Boolean,
    NullBoolean,
    Integer,
    Float,
    Decimal,
    Char,
    Email,
    Url,
    Slug,
    Uuid,
    File,
    Date,
    DateTime,
    Time,
    Json,
    Dict,
    Model,
    Choice,
    MultipleChoice,
    List {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        child: Option<Box<FieldKind>>,
    },
    /// Never exposed to API clients
    Hidden,
    /// Another DTO, single or repeated
    Nested {
        dto: String,
        #[serde(default)]
        many: bool,
    },
    /// A repeated relation rendered by key
    ManyRelated,
}

/// One `(key, label)` pair of a fixed choice set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice(pub Value, pub String);

impl Dto {
    /// Create an empty DTO
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            swagger_name: None,
            fields: IndexMap::new(),
            child: None,
            in_body: false,
        }
    }

    /// Publish the definition under a different name
    pub fn with_swagger_name(mut self, name: impl Into<String>) -> Self {
        self.swagger_name = Some(name.into());
        self
    }

    /// Append a field, keeping declaration order
    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Mark this DTO as a list of `child`
    pub fn list_of(mut self, child: impl Into<String>) -> Self {
        self.child = Some(child.into());
        self
    }

    /// Send this DTO as the request body of write operations
    pub fn in_body(mut self) -> Self {
        self.in_body = true;
        self
    }

    /// Dotted registration path, `module.Name`
    pub fn path(&self) -> String {
        if self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.module, self.name)
        }
    }

    /// Name the definition is published under
    pub fn canonical_name(&self) -> &str {
        self.swagger_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            read_only: false,
            write_only: false,
            allow_null: false,
            default: None,
            help_text: None,
            choices: Vec::new(),
            min_value: None,
            max_value: None,
            documented: true,
        }
    }

    /// A single nested DTO
    pub fn nested(dto: impl Into<String>) -> Self {
        Self::new(FieldKind::Nested {
            dto: dto.into(),
            many: false,
        })
    }

    /// A repeated nested DTO
    pub fn nested_many(dto: impl Into<String>) -> Self {
        Self::new(FieldKind::Nested {
            dto: dto.into(),
            many: true,
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.allow_null = true;
        self
    }

    pub fn undocumented(mut self) -> Self {
        self.documented = false;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_range(mut self, min: Option<Value>, max: Option<Value>) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }
}
