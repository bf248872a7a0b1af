//! # GQL Executor
//!
//! AST -> [`BindingTable`] over a store.
//!
//! Execution threads a table of rows through the clauses, starting from a
//! single empty row:
//! - `MATCH` replaces every row with its matches (nested-loop join).
//!   Variables already bound in the row constrain the match.
//! - `OPTIONAL MATCH` keeps an unmatched row once, with the pattern's new
//!   variables set to null.
//! - `FILTER` keeps rows whose condition is exactly `true`.
//! - `RETURN` projects rows onto its items; later clauses see only the
//!   projected columns.
//!
//! Cost per clause is O(rows x pattern fan-out). No reordering or indexing
//! beyond the link index is attempted.
//!
//! Expression failures never abort a query: the failing cell is null.

use super::ast::{
    Clause, CompareOp, EdgePattern, Expr, NodePattern, PathPattern, Query, ReturnClause,
    ReturnItem, ReturnItems,
};
use super::table::{BindingTable, Row};
use crate::schema::{Direction, SchemaRegistry};
use crate::store::Store;
use crate::{ElementId, MetagraphError, Value};
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Execute a parsed query against `store`.
#[must_use]
pub fn execute(store: &Store, query: &Query) -> BindingTable {
    Executor::new(store).run(query)
}

struct Executor<'s> {
    store: &'s Store,
    schema: &'s SchemaRegistry,
    /// Every visible element, computed on first unbound node pattern.
    elements: OnceCell<Vec<ElementId>>,
}

impl<'s> Executor<'s> {
    fn new(store: &'s Store) -> Self {
        Self {
            store,
            schema: store.schema(),
            elements: OnceCell::new(),
        }
    }

    fn run(&self, query: &Query) -> BindingTable {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = vec![Row::new()];

        for clause in &query.clauses {
            match clause {
                Clause::Match { optional, pattern } => {
                    rows = self.match_clause(rows, pattern, *optional);
                    for var in pattern.variables() {
                        if !columns.iter().any(|c| c == var) {
                            columns.push(var.to_string());
                        }
                    }
                }
                Clause::Filter(condition) => {
                    rows.retain(|row| self.cell(condition, row) == Value::Bool(true));
                }
                Clause::Return(ret) => {
                    (columns, rows) = self.project(columns, rows, ret);
                }
            }
            tracing::trace!(rows = rows.len(), "clause executed");
        }

        BindingTable::new(columns, rows)
    }

    // -------------------------------------------------------------------------
    // MATCH
    // -------------------------------------------------------------------------

    fn match_clause(&self, rows: Vec<Row>, pattern: &PathPattern, optional: bool) -> Vec<Row> {
        let mut out = Vec::new();
        for row in rows {
            let matches = self.match_path(&row, pattern);
            if matches.is_empty() && optional {
                let mut row = row;
                for var in pattern.variables() {
                    row.entry(var.to_string()).or_insert(Value::Null);
                }
                out.push(row);
            } else {
                out.extend(matches);
            }
        }
        out
    }

    /// All extensions of `row` matching `pattern`, left to right.
    fn match_path(&self, row: &Row, pattern: &PathPattern) -> Vec<Row> {
        let mut partial: Vec<(Row, ElementId)> = self
            .node_candidates(row, &pattern.start)
            .into_iter()
            .filter_map(|id| {
                bind(row.clone(), pattern.start.variable.as_deref(), Value::Ref(id))
                    .map(|r| (r, id))
            })
            .collect();

        for (edge, node) in &pattern.steps {
            let mut next = Vec::new();
            for (row, current) in partial {
                let Some(instance) = self.store.get_instance(current) else {
                    continue;
                };
                for (association, direction) in self.hops(&instance.class_name, edge, node) {
                    for neighbor in self.neighbors(association, direction, current) {
                        if !self.node_matches(neighbor, node) {
                            continue;
                        }
                        let bound = bind(
                            row.clone(),
                            edge.variable.as_deref(),
                            Value::from(association),
                        )
                        .and_then(|r| bind(r, node.variable.as_deref(), Value::Ref(neighbor)));
                        if let Some(r) = bound {
                            next.push((r, neighbor));
                        }
                    }
                }
            }
            partial = next;
        }

        partial.into_iter().map(|(row, _)| row).collect()
    }

    fn node_candidates(&self, row: &Row, node: &NodePattern) -> Vec<ElementId> {
        if let Some(bound) = node.variable.as_ref().and_then(|v| row.get(v)) {
            return match bound {
                Value::Ref(id) if self.node_matches(*id, node) => vec![*id],
                _ => Vec::new(),
            };
        }
        self.elements
            .get_or_init(|| self.store.get_all_elements())
            .iter()
            .copied()
            .filter(|id| self.node_matches(*id, node))
            .collect()
    }

    fn node_matches(&self, id: ElementId, node: &NodePattern) -> bool {
        let Some(instance) = self.store.get_instance(id) else {
            return false;
        };
        let labelled = node.labels.is_empty()
            || node
                .labels
                .iter()
                .any(|label| self.schema.is_subclass_of(&instance.class_name, label));
        labelled
            && node
                .properties
                .iter()
                .all(|(key, expected)| self.store.get_property(id, key) == *expected)
    }

    /// Associations an edge step may follow from an instance of `class`.
    ///
    /// Source to target steps need a navigable target end.
    fn hops(&self, class: &str, edge: &EdgePattern, node: &NodePattern) -> Vec<(&'s str, Direction)> {
        let schema = self.schema;
        let Some(label) = edge.label.as_deref() else {
            return schema
                .get_all_associations()
                .filter(|a| a.target.navigable)
                .filter(|a| schema.is_subclass_of(class, &a.source.type_name))
                .filter(|a| {
                    node.labels.is_empty()
                        || node.labels.iter().any(|l| {
                            schema.is_subclass_of(l, &a.target.type_name)
                                || schema.is_subclass_of(&a.target.type_name, l)
                        })
                })
                .map(|a| (a.name.as_str(), Direction::Forward))
                .collect();
        };

        if let Some(association) = schema.get_association(label) {
            if !association.target.navigable {
                return Vec::new();
            }
            return vec![(association.name.as_str(), Direction::Forward)];
        }
        schema
            .ends_named(label)
            .into_iter()
            .map(|end| (end.association.name.as_str(), end.direction))
            .collect()
    }

    fn neighbors(&self, association: &str, direction: Direction, id: ElementId) -> Vec<ElementId> {
        match direction {
            Direction::Forward => self.store.get_linked_targets(association, id),
            Direction::Backward => self.store.get_linked_sources(association, id),
        }
    }

    // -------------------------------------------------------------------------
    // RETURN
    // -------------------------------------------------------------------------

    fn project(
        &self,
        columns: Vec<String>,
        rows: Vec<Row>,
        clause: &ReturnClause,
    ) -> (Vec<String>, Vec<Row>) {
        let (columns, rows) = match &clause.items {
            ReturnItems::All => (columns, rows),
            ReturnItems::Items(items) => {
                let names: Vec<String> = items.iter().map(ReturnItem::column_name).collect();
                let projected = rows
                    .iter()
                    .map(|row| {
                        names
                            .iter()
                            .zip(items)
                            .map(|(name, item)| (name.clone(), self.cell(&item.expr, row)))
                            .collect()
                    })
                    .collect();
                (names, projected)
            }
        };
        if !clause.distinct {
            return (columns, rows);
        }

        let mut seen = BTreeSet::new();
        let rows = rows
            .into_iter()
            .filter(|row| {
                let mut key = String::new();
                for column in &columns {
                    write_key(row.get(column).unwrap_or(&Value::Null), &mut key);
                    key.push('\u{1f}');
                }
                seen.insert(key)
            })
            .collect();
        (columns, rows)
    }

    // -------------------------------------------------------------------------
    // EXPRESSIONS
    // -------------------------------------------------------------------------

    /// Evaluate for one row; failures become null.
    fn cell(&self, expr: &Expr, row: &Row) -> Value {
        match self.eval(expr, row) {
            Ok(value) => value,
            Err(e) => {
                tracing::trace!(error = %e, expr = %expr, "expression evaluated to null");
                Value::Null
            }
        }
    }

    fn eval(&self, expr: &Expr, row: &Row) -> Result<Value, MetagraphError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => row
                .get(name)
                .cloned()
                .ok_or_else(|| MetagraphError::Evaluation(format!("unbound variable '{}'", name))),
            Expr::Property { base, name } => match self.eval(base, row)? {
                Value::Ref(id) => Ok(self.store.get_property(id, name)),
                Value::Null => Ok(Value::Null),
                other => Err(MetagraphError::Evaluation(format!(
                    "cannot read property '{}' of {}",
                    name,
                    other.kind()
                ))),
            },
            Expr::Function { function, args, .. } => {
                let values = args
                    .iter()
                    .map(|arg| self.eval(arg, row))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(values, self.store)
            }
            // No grouping: every row is its own group.
            Expr::CountStar => Ok(Value::Int(1)),
            Expr::Not(inner) => Ok(match truth(self.eval(inner, row)?)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),
            Expr::And(l, r) => {
                let l = truth(self.eval(l, row)?)?;
                let r = truth(self.eval(r, row)?)?;
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Bool(false),
                    (Some(true), Some(true)) => Value::Bool(true),
                    _ => Value::Null,
                })
            }
            Expr::Or(l, r) => {
                let l = truth(self.eval(l, row)?)?;
                let r = truth(self.eval(r, row)?)?;
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Bool(true),
                    (Some(false), Some(false)) => Value::Bool(false),
                    _ => Value::Null,
                })
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left, row)?;
                let right = self.eval(right, row)?;
                Ok(compare(*op, &left, &right))
            }
            Expr::IsNull { expr, negated } => {
                Ok(Value::Bool(self.eval(expr, row)?.is_null() != *negated))
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Bind `variable` to `value`, or check consistency if already bound.
fn bind(mut row: Row, variable: Option<&str>, value: Value) -> Option<Row> {
    let Some(name) = variable else {
        return Some(row);
    };
    if row.get(name).is_some_and(|existing| *existing != value) {
        return None;
    }
    row.entry(name.to_string()).or_insert(value);
    Some(row)
}

/// Three-valued truth of a condition operand.
fn truth(value: Value) -> Result<Option<bool>, MetagraphError> {
    match value {
        Value::Bool(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        other => Err(MetagraphError::Evaluation(format!(
            "expected a boolean, got {}",
            other.kind()
        ))),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Value {
    if left.is_null() || right.is_null() {
        return Value::Null;
    }
    if let Some(ordering) = left.compare(right) {
        let result = match op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        };
        return Value::Bool(result);
    }
    match (op, left, right) {
        (CompareOp::Eq, Value::Ref(_), Value::Ref(_))
        | (CompareOp::Eq, Value::List(_), Value::List(_)) => Value::Bool(left == right),
        (CompareOp::Ne, Value::Ref(_), Value::Ref(_))
        | (CompareOp::Ne, Value::List(_), Value::List(_)) => Value::Bool(left != right),
        _ => Value::Null,
    }
}

/// Canonical text of a value; equal values (`1` and `1.0` included) share a key.
fn write_key(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push('n'),
        Value::Bool(b) => out.push_str(&format!("b{}", b)),
        Value::Int(i) => out.push_str(&format!("i{}", i)),
        Value::Real(r)
            if r.fract() == 0.0 && *r >= i64::MIN as f64 && *r <= i64::MAX as f64 =>
        {
            out.push_str(&format!("i{}", *r as i64));
        }
        Value::Real(r) => out.push_str(&format!("f{:?}", r)),
        Value::Str(s) => out.push_str(&format!("s{:?}", s)),
        Value::Ref(id) => out.push_str(&format!("r{}", id)),
        Value::List(items) => {
            out.push('[');
            for item in items {
                write_key(item, out);
                out.push(',');
            }
            out.push(']');
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gql::parse_query;
    use crate::schema::{MetaAssociation, MetaAssociationEnd, MetaClass, MetaProperty};
    use std::sync::Arc;

    struct Fixture {
        store: Store,
        n: ElementId,
        c1: ElementId,
        c2: ElementId,
        f: ElementId,
    }

    fn fixture() -> Fixture {
        let mut schema = SchemaRegistry::new();
        schema
            .register_class(
                MetaClass::new("Element")
                    .with_attribute(MetaProperty::new("name", "String"))
                    .with_attribute(MetaProperty::new("rank", "Integer")),
            )
            .expect("register");
        schema
            .register_class(MetaClass::new("Namespace").with_superclass("Element"))
            .expect("register");
        schema
            .register_class(MetaClass::new("Classifier").with_superclass("Element"))
            .expect("register");
        schema
            .register_class(MetaClass::new("Feature").with_superclass("Classifier"))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "Membership",
                MetaAssociationEnd::new("namespace", "Namespace").single(),
                MetaAssociationEnd::new("member", "Element").composite(),
            ))
            .expect("register");
        schema
            .register_association(MetaAssociation::new(
                "FeatureTyping",
                MetaAssociationEnd::new("typedFeature", "Feature").non_navigable(),
                MetaAssociationEnd::new("type", "Classifier").single(),
            ))
            .expect("register");

        let mut store = Store::new(Arc::new(schema));
        let mut named = |class: &str, name: &str, rank: i64| {
            let id = store.create_element(class).expect("create");
            store.set_property(id, "name", Value::from(name)).expect("name");
            store.set_property(id, "rank", Value::Int(rank)).expect("rank");
            id
        };
        let n = named("Namespace", "N", 0);
        let c1 = named("Classifier", "C1", 1);
        let c2 = named("Classifier", "C2", 2);
        let f = named("Feature", "F", 3);
        store.create_link("Membership", n, c1).expect("link");
        store.create_link("Membership", n, c2).expect("link");
        store.create_link("FeatureTyping", f, c1).expect("link");
        Fixture { store, n, c1, c2, f }
    }

    fn run(store: &Store, text: &str) -> BindingTable {
        execute(store, &parse_query(text).expect("parse"))
    }

    #[test]
    fn unlabelled_node_matches_everything() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (n) RETURN n");
        assert_eq!(t.columns(), ["n"]);
        assert_eq!(
            t.column("n"),
            vec![
                Value::Ref(fx.n),
                Value::Ref(fx.c1),
                Value::Ref(fx.c2),
                Value::Ref(fx.f)
            ]
        );
    }

    #[test]
    fn label_matches_subclasses() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (c:Classifier) RETURN c.name");
        assert_eq!(
            t.column("c.name"),
            vec![Value::from("C1"), Value::from("C2"), Value::from("F")]
        );
    }

    #[test]
    fn typed_edge_by_association_name() {
        let fx = fixture();
        let t = run(
            &fx.store,
            "MATCH (n:Namespace)-[:Membership]->(c:Classifier) RETURN c.name",
        );
        assert_eq!(t.column("c.name"), vec![Value::from("C1"), Value::from("C2")]);
    }

    #[test]
    fn typed_edge_by_end_name_both_directions() {
        let fx = fixture();
        let forward = run(&fx.store, "MATCH (f)-[:type]->(t) RETURN f.name, t.name");
        assert_eq!(forward.len(), 1);
        assert_eq!(forward.get(0, "t.name"), Some(&Value::from("C1")));

        let backward = run(&fx.store, "MATCH (c)-[:namespace]->(n) RETURN c.name, n.name");
        assert_eq!(backward.len(), 2);
        assert_eq!(backward.get(0, "n.name"), Some(&Value::from("N")));

        // non-navigable end
        let hidden = run(&fx.store, "MATCH (c)-[:typedFeature]->(f) RETURN f");
        assert!(hidden.is_empty());

        let mut schema = SchemaRegistry::new();
        schema.register_class(MetaClass::new("Element")).expect("register");
        schema
            .register_association(MetaAssociation::new(
                "Annotation",
                MetaAssociationEnd::new("annotated", "Element"),
                MetaAssociationEnd::new("annotation", "Element").non_navigable(),
            ))
            .expect("register");
        let mut store = Store::new(Arc::new(schema));
        let a = store.create_element("Element").expect("create");
        let b = store.create_element("Element").expect("create");
        store.create_link("Annotation", a, b).expect("link");

        assert!(run(&store, "MATCH (x)-[:Annotation]->(y) RETURN y").is_empty());
        assert!(run(&store, "MATCH (x)-[:annotation]->(y) RETURN y").is_empty());
        assert!(run(&store, "MATCH (x)-[r]->(y) RETURN y").is_empty());
        let back = run(&store, "MATCH (y)-[:annotated]->(x) RETURN x");
        assert_eq!(back.column("x"), vec![Value::Ref(a)]);
    }

    #[test]
    fn untyped_edge_binds_association_name() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (f:Feature)-[r]->(x) RETURN r, x");
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(0, "r"), Some(&Value::from("FeatureTyping")));
        assert_eq!(t.get(0, "x"), Some(&Value::Ref(fx.c1)));
    }

    #[test]
    fn unknown_labels_match_nothing() {
        let fx = fixture();
        assert!(run(&fx.store, "MATCH (x:Nope) RETURN x").is_empty());
        assert!(run(&fx.store, "MATCH (a)-[:Nope]->(b) RETURN a").is_empty());
    }

    #[test]
    fn bound_variables_filter_later_matches() {
        let fx = fixture();
        let t = run(
            &fx.store,
            "MATCH (c {name: 'C1'}) MATCH (n)-[:Membership]->(c) RETURN n.name",
        );
        assert_eq!(t.column("n.name"), vec![Value::from("N")]);
    }

    #[test]
    fn optional_match_keeps_rows() {
        let fx = fixture();
        let t = run(
            &fx.store,
            "MATCH (c:Classifier) OPTIONAL MATCH (f)-[:FeatureTyping]->(c) RETURN c.name, f.name",
        );
        assert_eq!(t.len(), 3);
        assert_eq!(
            t.column("f.name"),
            vec![Value::from("F"), Value::Null, Value::Null]
        );
    }

    #[test]
    fn filter_uses_three_valued_logic() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (e) FILTER WHERE e.rank >= 2 RETURN e.name");
        assert_eq!(t.column("e.name"), vec![Value::from("C2"), Value::from("F")]);

        // comparison with null is never true
        let none = run(&fx.store, "MATCH (e) FILTER WHERE e.missing = 1 OR e.missing <> 1 RETURN e");
        assert!(none.is_empty());

        let negated = run(&fx.store, "MATCH (e) FILTER WHERE NOT e.rank < 3 RETURN e.name");
        assert_eq!(negated.column("e.name"), vec![Value::from("F")]);
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let fx = fixture();
        let t = run(
            &fx.store,
            "MATCH (n)-[:Membership]->(c) RETURN DISTINCT n.name AS owner",
        );
        assert_eq!(t.column("owner"), vec![Value::from("N")]);

        let mixed = run(&fx.store, "MATCH (e) RETURN DISTINCT className(e) AS k");
        assert_eq!(
            mixed.column("k"),
            vec![
                Value::from("Namespace"),
                Value::from("Classifier"),
                Value::from("Feature")
            ]
        );
    }

    #[test]
    fn per_row_errors_become_null() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (e {name: 'N'}) RETURN upper(e.rank) AS u, upper(e.name) AS v");
        assert_eq!(t.get(0, "u"), Some(&Value::Null));
        assert_eq!(t.get(0, "v"), Some(&Value::from("N")));
    }

    #[test]
    fn no_return_yields_bound_variables() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (f:Feature)-[r:FeatureTyping]->(c)");
        assert_eq!(t.columns(), ["f", "r", "c"]);
        assert_eq!(t.get(0, "c"), Some(&Value::Ref(fx.c1)));
    }

    #[test]
    fn return_then_more_clauses_projects() {
        let fx = fixture();
        let t = run(
            &fx.store,
            "MATCH (n:Namespace) RETURN n AS owner MATCH (owner)-[:member]->(m) RETURN m.name",
        );
        assert_eq!(t.column("m.name"), vec![Value::from("C1"), Value::from("C2")]);
    }

    #[test]
    fn chained_property_navigation() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (f:Feature) RETURN f.type.name AS t");
        assert_eq!(t.get(0, "t"), Some(&Value::from("C1")));
    }

    #[test]
    fn count_star_is_per_row() {
        let fx = fixture();
        let t = run(&fx.store, "MATCH (c:Classifier) RETURN DISTINCT count(*)");
        assert_eq!(t.column("count(*)"), vec![Value::Int(1)]);
    }

    #[test]
    fn compare_mixed_kinds_is_null() {
        assert_eq!(compare(CompareOp::Eq, &Value::Int(1), &Value::from("1")), Value::Null);
        assert_eq!(compare(CompareOp::Eq, &Value::Int(1), &Value::Real(1.0)), Value::Bool(true));
        let id = ElementId::new();
        assert_eq!(compare(CompareOp::Ne, &Value::Ref(id), &Value::Ref(id)), Value::Bool(false));
    }
}
