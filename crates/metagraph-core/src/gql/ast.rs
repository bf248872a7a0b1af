//! # Query AST
//!
//! Parsed form of a GQL query. `Display` renders the canonical text of an
//! expression, which doubles as the default column name of a RETURN item.

use super::functions::Function;
use crate::Value;
use std::fmt;

/// A parsed query: clauses in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `[OPTIONAL] MATCH pattern`
    Match { optional: bool, pattern: PathPattern },
    /// `FILTER [WHERE] expr`
    Filter(Expr),
    /// `RETURN [DISTINCT] items`
    Return(ReturnClause),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnClause {
    pub distinct: bool,
    pub items: ReturnItems,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnItems {
    /// `RETURN *`
    All,
    Items(Vec<ReturnItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl ReturnItem {
    /// Output column name: the alias, or the canonical expression text.
    #[must_use]
    pub fn column_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.expr.to_string())
    }
}

/// `node (edge node)*`
#[derive(Debug, Clone, PartialEq)]
pub struct PathPattern {
    pub start: NodePattern,
    pub steps: Vec<(EdgePattern, NodePattern)>,
}

impl PathPattern {
    /// Named variables in left-to-right order.
    pub fn variables(&self) -> impl Iterator<Item = &str> + '_ {
        let start = self.start.variable.as_deref();
        let steps = self
            .steps
            .iter()
            .flat_map(|(edge, node)| [edge.variable.as_deref(), node.variable.as_deref()]);
        std::iter::once(start).chain(steps).flatten()
    }
}

/// `(var:LabelA|LabelB {key: value})`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodePattern {
    pub variable: Option<String>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Value)>,
}

/// `-[var:Type]->`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgePattern {
    pub variable: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    /// `base.name`
    Property { base: Box<Expr>, name: String },
    /// `name(args)`; `name` keeps the spelling used in the query.
    Function {
        function: Function,
        name: String,
        args: Vec<Expr>,
    },
    /// `count(*)`
    CountStar,
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `expr IS [NOT] NULL`
    IsNull { expr: Box<Expr>, negated: bool },
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(Value::Str(s)) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            Self::Literal(Value::Real(r)) => write!(f, "{:?}", r),
            Self::Literal(v) => write!(f, "{}", v),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Property { base, name } => write!(f, "{}.{}", base, name),
            Self::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Self::CountStar => write!(f, "count(*)"),
            Self::Not(inner) => write!(f, "NOT {}", inner),
            Self::And(l, r) => write!(f, "({} AND {})", l, r),
            Self::Or(l, r) => write!(f, "({} OR {})", l, r),
            Self::Compare { op, left, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            Self::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
        }
    }
}
