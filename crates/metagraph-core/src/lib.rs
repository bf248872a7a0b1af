//! # metagraph-core
//!
//! A metamodel-driven object graph with a declarative pattern query language.
//!
//! A `SchemaRegistry` describes metaclasses, associations and inheritance.
//! A `Store` holds instances conforming to that schema and the links that
//! realize its associations, enforcing endpoint types, multiplicity and
//! composite exclusivity on every write. Stores federate read-only through
//! named mounts. GQL queries match graph patterns over the federated view
//! and return binding tables.
//!
//! ```text
//! let table = store.query(
//!     "MATCH (n:Namespace)-[:Membership]->(c:Classifier) RETURN c.name",
//! )?;
//! ```
//!
//! ## Architectural Constraints
//!
//! - In-memory only: nothing is persisted
//! - No async, no network dependencies (pure Rust)
//! - No global state: schema, evaluators and mounts are passed explicitly
//! - Single-threaded mutation: writes take `&mut self`, callers synchronize
//! - Ordered collections only (`BTreeMap`/`BTreeSet`), no hashed containers

// =============================================================================
// MODULES
// =============================================================================

pub mod evaluator;
pub mod formats;
pub mod gql;
pub mod link;
pub mod mount;
pub mod ownership;
pub mod primitives;
pub mod schema;
pub mod store;
pub mod types;
pub mod view;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ElementId, Literal, MetagraphError, Value};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use evaluator::{DerivedFn, EvaluatorRegistry, OperationFn};
pub use link::{Link, LinkIndex};
pub use mount::Mount;
pub use ownership::{OwnedElement, OwnershipBinding, OwnershipResolver};
pub use schema::{
    AggregationKind, Direction, MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty,
    Multiplicity, OperationDescriptor, SchemaRegistry,
};
pub use store::{Instance, Store};
pub use view::ModelView;

// =============================================================================
// RE-EXPORTS: Query Language
// =============================================================================

pub use gql::{BindingTable, Query, Row, execute, parse_query};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{ElementDocument, LinkDocument, ModelDocument, SchemaDocument};
