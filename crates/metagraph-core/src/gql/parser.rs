//! # GQL Parser
//!
//! Text -> [`Query`] with nom combinators.
//!
//! ```text
//! Query   = Clause+ [";"]
//! Clause  = ["OPTIONAL"] "MATCH" Path | "FILTER" ["WHERE"] Expr | "WHERE" Expr
//!         | "RETURN" ["DISTINCT"] ("*" | Item ("," Item)*)
//! Path    = Node (Edge Node)*
//! Node    = "(" [var] [":" label ("|" label)*] ["{" key ":" literal ("," ...)* "}"] ")"
//! Edge    = "-[" [var] [":" type] "]->"
//! Item    = Expr ["AS" alias]
//! ```
//!
//! Expression precedence, loosest first: `OR`, `AND`, `NOT`, comparison /
//! `IS [NOT] NULL`, primary. Keywords are case-insensitive.
//!
//! Parsing never touches the graph. Every failure is reported as
//! `MetagraphError::GqlParse` with the byte offset where it was detected.

use super::ast::{
    Clause, CompareOp, EdgePattern, Expr, NodePattern, PathPattern, Query, ReturnClause,
    ReturnItem, ReturnItems,
};
use super::functions::Function;
use crate::primitives::{MAX_EXPRESSION_DEPTH, MAX_QUERY_LENGTH};
use crate::{MetagraphError, Value};
use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case, take_while, take_while1};
use nom::character::complete::{char as pchar, digit1, multispace0, one_of, satisfy};
use nom::combinator::{all_consuming, cut, map, not, opt, recognize, value, verify};
use nom::error::{ContextError, ErrorKind, ParseError, context};
use nom::multi::{many0, many1, separated_list0, separated_list1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use std::collections::BTreeSet;

/// Words that cannot be used as bare variable names.
const RESERVED: &[&str] = &[
    "MATCH", "OPTIONAL", "FILTER", "WHERE", "RETURN", "DISTINCT", "AS", "AND", "OR", "NOT",
    "IS", "NULL", "TRUE", "FALSE",
];

// =============================================================================
// ERRORS
// =============================================================================

/// Parse error carrying the remaining input at the failure point.
#[derive(Debug)]
struct SyntaxError<'a> {
    input: &'a str,
    expected: Option<&'static str>,
    message: Option<String>,
}

impl<'a> SyntaxError<'a> {
    fn message(input: &'a str, message: String) -> Self {
        Self {
            input,
            expected: None,
            message: Some(message),
        }
    }

    fn into_error(self, text: &str) -> MetagraphError {
        let offset = text.len().saturating_sub(self.input.len());
        let near = match self.input.trim_start() {
            "" => "at end of query".to_string(),
            rest => format!("near '{}'", rest.chars().take(16).collect::<String>()),
        };
        let message = match (self.message, self.expected) {
            (Some(message), _) => message,
            (None, Some(expected)) => format!("expected {} {}", expected, near),
            (None, None) => format!("unexpected input {}", near),
        };
        MetagraphError::GqlParse { offset, message }
    }
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            expected: None,
            message: None,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    /// Keep whichever alternative got further.
    fn or(self, other: Self) -> Self {
        if other.input.len() <= self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a> ContextError<&'a str> for SyntaxError<'a> {
    fn add_context(_input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        if other.expected.is_none() {
            other.expected = Some(ctx);
        }
        other
    }
}

type PResult<'a, T> = IResult<&'a str, T, SyntaxError<'a>>;

fn fail<T>(input: &str, message: String) -> PResult<'_, T> {
    Err(nom::Err::Failure(SyntaxError::message(input, message)))
}

/// Every nesting step (parentheses, `NOT`, call arguments, chained `OR`/`AND`
/// operands and `.name` steps) adds one level to the expression tree.
fn too_deep<T>(input: &str) -> PResult<'_, T> {
    fail(
        input,
        format!("expression nesting exceeds {} levels", MAX_EXPRESSION_DEPTH),
    )
}

// =============================================================================
// ENTRY POINT
// =============================================================================

/// Parse query text into an AST.
pub fn parse_query(text: &str) -> Result<Query, MetagraphError> {
    if text.len() > MAX_QUERY_LENGTH {
        return Err(MetagraphError::GqlParse {
            offset: MAX_QUERY_LENGTH,
            message: format!("query exceeds {} bytes", MAX_QUERY_LENGTH),
        });
    }
    if text.trim().is_empty() {
        return Err(MetagraphError::GqlParse {
            offset: 0,
            message: "empty query".to_string(),
        });
    }

    let parsed = all_consuming(terminated(
        many1(ws(clause)),
        pair(opt(pchar(';')), multispace0),
    ))(text);

    match parsed {
        Ok((_, clauses)) => Ok(Query { clauses }),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(e.into_error(text)),
        Err(nom::Err::Incomplete(_)) => Err(MetagraphError::GqlParse {
            offset: text.len(),
            message: "unexpected end of query".to_string(),
        }),
    }
}

// =============================================================================
// LEXICAL
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that does not run into a following identifier.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(tag_no_case(word), not(satisfy(is_ident_char)))
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

fn bare_identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_ident_start), take_while(is_ident_char)))(input)
}

fn quoted_identifier(input: &str) -> PResult<'_, &str> {
    delimited(pchar('`'), take_while1(|c| c != '`'), cut(pchar('`')))(input)
}

/// Any name: labels, property names, aliases.
fn identifier(input: &str) -> PResult<'_, String> {
    map(alt((quoted_identifier, bare_identifier)), str::to_string)(input)
}

/// A variable name; bare reserved words are rejected.
fn variable(input: &str) -> PResult<'_, String> {
    map(
        alt((
            quoted_identifier,
            verify(bare_identifier, |s: &str| !is_reserved(s)),
        )),
        str::to_string,
    )(input)
}

fn string_literal(input: &str) -> PResult<'_, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => {
            return Err(nom::Err::Error(SyntaxError::from_error_kind(
                input,
                ErrorKind::Char,
            )));
        }
    };

    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    fail(input, "unterminated string literal".to_string())
}

fn number(input: &str) -> PResult<'_, Value> {
    let (rest, text) = recognize(tuple((
        opt(pchar('-')),
        digit1,
        opt(pair(pchar('.'), digit1)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let parsed = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().ok().map(Value::Real)
    } else {
        text.parse::<i64>().ok().map(Value::Int)
    };
    match parsed {
        Some(v) => Ok((rest, v)),
        None => fail(input, format!("invalid number '{}'", text)),
    }
}

fn literal(input: &str) -> PResult<'_, Value> {
    alt((
        value(Value::Null, keyword("null")),
        value(Value::Bool(true), keyword("true")),
        value(Value::Bool(false), keyword("false")),
        map(string_literal, Value::Str),
        number,
    ))(input)
}

// =============================================================================
// CLAUSES
// =============================================================================

fn clause(input: &str) -> PResult<'_, Clause> {
    alt((match_clause, filter_clause, return_clause))(input)
}

fn match_clause(input: &str) -> PResult<'_, Clause> {
    let (input, optional) = opt(ws(keyword("OPTIONAL")))(input)?;
    let (input, _) = ws(keyword("MATCH"))(input)?;
    let (input, pattern) = cut(context("a node pattern", path_pattern))(input)?;
    Ok((
        input,
        Clause::Match {
            optional: optional.is_some(),
            pattern,
        },
    ))
}

fn filter_clause(input: &str) -> PResult<'_, Clause> {
    let (input, _) = alt((
        value((), pair(ws(keyword("FILTER")), opt(ws(keyword("WHERE"))))),
        value((), ws(keyword("WHERE"))),
    ))(input)?;
    let (input, condition) = cut(context("an expression", |i| expr(i, 0)))(input)?;
    Ok((input, Clause::Filter(condition)))
}

fn return_clause(input: &str) -> PResult<'_, Clause> {
    let (input, _) = ws(keyword("RETURN"))(input)?;
    let (input, distinct) = opt(ws(keyword("DISTINCT")))(input)?;
    let start = input;
    let (input, items) = cut(context(
        "'*' or a return item",
        alt((
            value(ReturnItems::All, ws(pchar('*'))),
            map(
                separated_list1(ws(pchar(',')), ws(return_item)),
                ReturnItems::Items,
            ),
        )),
    ))(input)?;

    if let ReturnItems::Items(items) = &items {
        let mut seen = BTreeSet::new();
        for item in items {
            let name = item.column_name();
            if !seen.insert(name.clone()) {
                return fail(start, format!("duplicate column name '{}'", name));
            }
        }
    }

    Ok((
        input,
        Clause::Return(ReturnClause {
            distinct: distinct.is_some(),
            items,
        }),
    ))
}

fn return_item(input: &str) -> PResult<'_, ReturnItem> {
    map(
        pair(
            |i| expr(i, 0),
            opt(preceded(
                ws(keyword("AS")),
                cut(context("an alias", ws(identifier))),
            )),
        ),
        |(expr, alias)| ReturnItem { expr, alias },
    )(input)
}

// =============================================================================
// PATTERNS
// =============================================================================

fn path_pattern(input: &str) -> PResult<'_, PathPattern> {
    map(
        pair(
            ws(node_pattern),
            many0(pair(
                ws(edge_pattern),
                cut(context("a node pattern", ws(node_pattern))),
            )),
        ),
        |(start, steps)| PathPattern { start, steps },
    )(input)
}

fn node_pattern(input: &str) -> PResult<'_, NodePattern> {
    let labels = preceded(
        ws(pchar(':')),
        cut(separated_list1(ws(pchar('|')), ws(identifier))),
    );
    map(
        preceded(
            pchar('('),
            cut(terminated(
                tuple((ws(opt(variable)), opt(labels), opt(ws(property_map)))),
                context("')' to close the node pattern", pchar(')')),
            )),
        ),
        |(variable, labels, properties)| NodePattern {
            variable,
            labels: labels.unwrap_or_default(),
            properties: properties.unwrap_or_default(),
        },
    )(input)
}

fn property_map(input: &str) -> PResult<'_, Vec<(String, Value)>> {
    preceded(
        pchar('{'),
        cut(terminated(
            separated_list0(
                ws(pchar(',')),
                pair(
                    ws(identifier),
                    preceded(ws(pchar(':')), context("a literal", ws(literal))),
                ),
            ),
            context("'}' to close the property map", pchar('}')),
        )),
    )(input)
}

fn edge_pattern(input: &str) -> PResult<'_, EdgePattern> {
    let label = preceded(ws(pchar(':')), cut(ws(identifier)));
    map(
        preceded(
            tag("-["),
            cut(terminated(
                pair(ws(opt(variable)), opt(label)),
                context("']->' to close the edge pattern", tag("]->")),
            )),
        ),
        |(variable, label)| EdgePattern { variable, label },
    )(input)
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

fn expr(input: &str, depth: usize) -> PResult<'_, Expr> {
    let start = input;
    let (input, first) = and_expr(input, depth)?;
    let (input, rest) = many0(preceded(
        ws(keyword("OR")),
        cut(|i| and_expr(i, depth)),
    ))(input)?;
    if depth.saturating_add(rest.len()) > MAX_EXPRESSION_DEPTH {
        return too_deep(start);
    }
    let folded = rest
        .into_iter()
        .fold(first, |l, r| Expr::Or(Box::new(l), Box::new(r)));
    Ok((input, folded))
}

fn and_expr(input: &str, depth: usize) -> PResult<'_, Expr> {
    let start = input;
    let (input, first) = not_expr(input, depth)?;
    let (input, rest) = many0(preceded(
        ws(keyword("AND")),
        cut(|i| not_expr(i, depth)),
    ))(input)?;
    if depth.saturating_add(rest.len()) > MAX_EXPRESSION_DEPTH {
        return too_deep(start);
    }
    let folded = rest
        .into_iter()
        .fold(first, |l, r| Expr::And(Box::new(l), Box::new(r)));
    Ok((input, folded))
}

fn not_expr(input: &str, depth: usize) -> PResult<'_, Expr> {
    if depth > MAX_EXPRESSION_DEPTH {
        return too_deep(input);
    }
    alt((
        map(
            preceded(
                ws(keyword("NOT")),
                cut(|i| not_expr(i, depth.saturating_add(1))),
            ),
            |inner| Expr::Not(Box::new(inner)),
        ),
        |i| comparison(i, depth),
    ))(input)
}

fn comparison(input: &str, depth: usize) -> PResult<'_, Expr> {
    let (input, left) = ws(|i| primary(i, depth))(input)?;

    let (input, null_check) = opt(is_null_suffix)(input)?;
    if let Some(negated) = null_check {
        return Ok((
            input,
            Expr::IsNull {
                expr: Box::new(left),
                negated,
            },
        ));
    }

    let (input, tail) = opt(pair(
        ws(compare_op),
        cut(context("an operand", ws(|i| primary(i, depth)))),
    ))(input)?;
    let expr = match tail {
        Some((op, right)) => Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        None => left,
    };
    Ok((input, expr))
}

fn is_null_suffix(input: &str) -> PResult<'_, bool> {
    map(
        tuple((
            ws(keyword("IS")),
            opt(ws(keyword("NOT"))),
            cut(context("NULL", ws(keyword("NULL")))),
        )),
        |(_, not, _)| not.is_some(),
    )(input)
}

fn compare_op(input: &str) -> PResult<'_, CompareOp> {
    alt((
        value(CompareOp::Le, tag("<=")),
        value(CompareOp::Ge, tag(">=")),
        value(CompareOp::Ne, tag("<>")),
        value(CompareOp::Ne, tag("!=")),
        value(CompareOp::Eq, tag("=")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Gt, tag(">")),
    ))(input)
}

fn primary(input: &str, depth: usize) -> PResult<'_, Expr> {
    alt((
        map(literal, Expr::Literal),
        count_star,
        |i| function_call(i, depth),
        |i| parenthesized(i, depth),
        |i| property_chain(i, depth),
    ))(input)
}

fn count_star(input: &str) -> PResult<'_, Expr> {
    value(
        Expr::CountStar,
        tuple((
            keyword("count"),
            ws(pchar('(')),
            ws(pchar('*')),
            pchar(')'),
        )),
    )(input)
}

fn function_call(input: &str, depth: usize) -> PResult<'_, Expr> {
    let start = input;
    let (input, name) = terminated(bare_identifier, ws(pchar('(')))(input)?;
    let (input, args) = cut(terminated(
        separated_list0(ws(pchar(',')), |i| expr(i, depth.saturating_add(1))),
        context("')' to close the argument list", ws(pchar(')'))),
    ))(input)?;

    let Some(function) = Function::lookup(name) else {
        return fail(start, format!("unknown function '{}'", name));
    };
    if !function.accepts(args.len()) {
        return fail(
            start,
            format!("function '{}' does not take {} argument(s)", name, args.len()),
        );
    }
    Ok((
        input,
        Expr::Function {
            function,
            name: name.to_string(),
            args,
        },
    ))
}

fn parenthesized(input: &str, depth: usize) -> PResult<'_, Expr> {
    preceded(
        pchar('('),
        cut(terminated(
            ws(|i| expr(i, depth.saturating_add(1))),
            context("')'", pchar(')')),
        )),
    )(input)
}

fn property_chain(input: &str, depth: usize) -> PResult<'_, Expr> {
    let start = input;
    let (input, base) = variable(input)?;
    let (input, names) = many0(preceded(
        pchar('.'),
        cut(context("a property name", identifier)),
    ))(input)?;
    if depth.saturating_add(names.len()) > MAX_EXPRESSION_DEPTH {
        return too_deep(start);
    }
    let expr = names
        .into_iter()
        .fold(Expr::Variable(base), |base, name| Expr::Property {
            base: Box::new(base),
            name,
        });
    Ok((input, expr))
}

// =============================================================================
// TESTS
// =============================================================================
