//! # Graph Query Language
//!
//! A Cypher/GQL-like pattern-matching dialect over the object store.
//!
//! ```text
//! MATCH (n:Namespace)-[:Membership]->(c:Classifier)
//! OPTIONAL MATCH (f:Feature)-[:FeatureTyping]->(c)
//! FILTER WHERE c.name <> 'Anything'
//! RETURN DISTINCT c.name, count(f)
//! ```
//!
//! Text is parsed completely before any graph access; a parse failure
//! never produces a partial result.

pub mod ast;
pub mod executor;
pub mod functions;
pub mod parser;
pub mod table;

pub use ast::Query;
pub use executor::execute;
pub use parser::parse_query;
pub use table::{BindingTable, Row};

use crate::store::Store;
use crate::MetagraphError;

impl Store {
    /// Parse and execute a GQL query.
    pub fn query(&self, text: &str) -> Result<BindingTable, MetagraphError> {
        let query = parse_query(text)?;
        let table = execute(self, &query);
        tracing::debug!(
            clauses = query.clauses.len(),
            rows = table.len(),
            "query executed"
        );
        Ok(table)
    }
}
