//! Core of an OpenAPI → Protocol Buffers converter.
//!
//! `openapi2proto` covers the two parts of the conversion that are not plain
//! field-by-field translation:
//!
//! - **Reference resolution**: a decoded OpenAPI document (JSON or YAML) is
//!   normalized into a string-keyed [`value::Value`] tree, and every `$ref` that
//!   names another document (relative path or HTTP(S) URL) is fetched, cached
//!   per call, evaluated as a JSON Pointer, and spliced back in, recursively.
//!   In-document (`#/...`) and vendored (`google/protobuf/...`) references are
//!   left for the translation layer.
//! - **The output type graph**: [`protobuf`] models enums, messages, maps,
//!   extensions and services under a root [`protobuf::Package`], with
//!   [`protobuf::Reference`] placeholders for forward and circular type
//!   references that [`registry::TypeRegistry`] binds in a second phase.
//!
//! # Usage
//!
//! ```no_run
//! use openapi2proto::loader::load_document;
//! use openapi2proto::resolver::{ResolveOptions, Resolver};
//!
//! let document = load_document(std::path::Path::new("specs/petstore.yaml"))?;
//! let resolved = Resolver::new().resolve(document, &ResolveOptions::new().with_dir("specs"))?;
//! println!("{}", serde_json::to_string_pretty(&resolved).unwrap_or_default());
//! # Ok::<(), openapi2proto::error::Error>(())
//! ```

pub mod error;
pub mod loader;
pub mod pointer;
pub mod protobuf;
pub mod reference;
pub mod registry;
pub mod resolver;
pub mod value;
