//! # Engine Primitives
//!
//! Hardcoded limits and well-known names for the metagraph engine.
//!
//! These are compiled into the binary and are immutable at runtime.

/// Maximum length of GQL query text, in bytes.
///
/// Longer input is rejected by the parser before any graph access.
pub const MAX_QUERY_LENGTH: usize = 64 * 1024;

/// Maximum nesting depth of parenthesized GQL expressions.
///
/// Bounds parser recursion on adversarial input.
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/// Primitive attribute type names whose values are kind-checked on write.
///
/// Attributes declared with any other type name accept any value.
pub const PRIMITIVE_BOOLEAN: &str = "Boolean";
pub const PRIMITIVE_INTEGER: &str = "Integer";
pub const PRIMITIVE_REAL: &str = "Real";
pub const PRIMITIVE_STRING: &str = "String";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_length_limit_is_64k() {
        assert_eq!(MAX_QUERY_LENGTH, 65536);
    }
}
