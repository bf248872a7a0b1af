//! # Formats
//!
//! Serde shapes for bootstrap input. The engine never reads files itself;
//! the app layer decodes JSON or TOML into these types and hands them over.

pub mod document;

pub use document::{ElementDocument, LinkDocument, ModelDocument, SchemaDocument};
