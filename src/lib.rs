//! rest-swagger - Swagger 2.0 documents from declared REST handlers.
//!
//! Handlers, their DTOs and the route tree are declared up front (in code or
//! in manifest files). Every document request walks those declarations and
//! compiles a fresh Swagger 2.0 document: paths, operations, parameters,
//! responses and the closed set of type definitions they reference.
//!
//! # Architecture
//!
//! 1. [`collector`] - flattens the [`routes`] tree into endpoints, applying filters
//! 2. [`introspector`] - enumerates the operations of each [`handler`]
//! 3. [`annotation`] - resolves the override blocks of every operation
//! 4. [`parameters`] - combines reflected and declared parameters
//! 5. [`schema_generator`] - turns [`dto`]s into definitions, to a fixed point
//! 6. [`document_builder`] - assembles the document
//! 7. [`views`] - permission gate and the `swagger.json` HTTP surface
//!
//! [`config`] holds the layered settings, [`manifest`] and [`scanner`] load
//! declarations from disk and [`serializer`] writes the result out.
//!
//! # Example Usage
//!
//! ```no_run
//! use rest_swagger::{
//!     config::SwaggerSettings,
//!     dto::{Dto, Field, FieldKind},
//!     handler::{Handler, HttpMethod, User},
//!     registry::Registry,
//!     routes::{RouteTree, UrlPattern},
//!     serializer::serialize_json,
//!     views::{DocumentRequest, SwaggerJsonView},
//! };
//!
//! let mut registry = Registry::new();
//! registry.register_dto(
//!     Dto::new("ProductSerializer", "products.serializers")
//!         .with_swagger_name("Product")
//!         .with_field("name", Field::new(FieldKind::Char).required()),
//! );
//!
//! let handler = Handler::resource("ProductList", "products.views", vec![HttpMethod::Get], true)
//!     .with_serializer(".serializers.ProductSerializer");
//! let routes: RouteTree = vec![UrlPattern::new("^products$", handler).into()];
//!
//! let settings = SwaggerSettings::from_yaml_str("configs: {default: {}}").unwrap();
//! let view = SwaggerJsonView::new(&settings, &registry, &routes);
//! let document = view.get(&DocumentRequest::new(User::anonymous())).unwrap();
//! println!("{}", serialize_json(&document).unwrap());
//! ```

pub mod annotation;
pub mod cli;
pub mod collector;
pub mod config;
pub mod context;
pub mod document_builder;
pub mod dto;
pub mod error;
pub mod formatting;
pub mod handler;
pub mod introspector;
pub mod manifest;
pub mod parameters;
pub mod registry;
pub mod routes;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod views;
