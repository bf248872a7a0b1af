//! # Built-in Functions
//!
//! Scalar functions available in GQL expressions. Names are matched
//! case-insensitively; several have a Cypher-style alias.

use crate::view::ModelView;
use crate::{MetagraphError, Value};

/// A built-in scalar function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Upper,
    Lower,
    Length,
    Trim,
    Coalesce,
    ElementId,
    ClassName,
    Count,
}

impl Function {
    /// Resolve a function name as written in a query.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        let function = match name.to_ascii_lowercase().as_str() {
            "upper" | "toupper" => Self::Upper,
            "lower" | "tolower" => Self::Lower,
            "length" | "size" => Self::Length,
            "trim" => Self::Trim,
            "coalesce" => Self::Coalesce,
            "elementid" | "id" => Self::ElementId,
            "classname" | "label" => Self::ClassName,
            "count" => Self::Count,
            _ => return None,
        };
        Some(function)
    }

    /// Accepted argument counts: `(min, max)`, `max = None` for variadic.
    #[must_use]
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Self::Coalesce => (1, None),
            _ => (1, Some(1)),
        }
    }

    /// True when `count` arguments are accepted.
    #[must_use]
    pub fn accepts(self, count: usize) -> bool {
        let (min, max) = self.arity();
        count >= min && max.is_none_or(|max| count <= max)
    }

    /// Apply the function to already-evaluated arguments.
    ///
    /// Null inputs propagate as null, except for `coalesce` and `count`.
    pub fn apply(self, args: Vec<Value>, view: &dyn ModelView) -> Result<Value, MetagraphError> {
        let mut args = args.into_iter();
        if self == Self::Coalesce {
            return Ok(args.find(|v| !v.is_null()).unwrap_or_default());
        }
        let arg = args.next().unwrap_or_default();
        if self == Self::Count {
            return Ok(Value::Int(i64::from(!arg.is_null())));
        }
        if arg.is_null() {
            return Ok(Value::Null);
        }

        match (self, arg) {
            (Self::Upper, Value::Str(s)) => Ok(Value::Str(s.to_uppercase())),
            (Self::Lower, Value::Str(s)) => Ok(Value::Str(s.to_lowercase())),
            (Self::Trim, Value::Str(s)) => Ok(Value::Str(s.trim().to_string())),
            (Self::Length, Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
            (Self::Length, Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            (Self::ElementId, Value::Ref(id)) => Ok(Value::Str(id.to_string())),
            (Self::ClassName, Value::Ref(id)) => Ok(view
                .get_instance(id)
                .map(|i| Value::Str(i.class_name.clone()))
                .unwrap_or_default()),
            (function, other) => Err(MetagraphError::Evaluation(format!(
                "{:?} is not defined for {}",
                function,
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MetaClass, SchemaRegistry};
    use crate::store::Store;
    use std::sync::Arc;

    fn store() -> Store {
        let mut schema = SchemaRegistry::new();
        schema.register_class(MetaClass::new("Element")).expect("register");
        Store::new(Arc::new(schema))
    }

    #[test]
    fn names_are_case_insensitive_with_aliases() {
        assert_eq!(Function::lookup("toUpper"), Some(Function::Upper));
        assert_eq!(Function::lookup("UPPER"), Some(Function::Upper));
        assert_eq!(Function::lookup("size"), Some(Function::Length));
        assert_eq!(Function::lookup("nope"), None);
    }

    #[test]
    fn string_functions() {
        let store = store();
        let s = Value::from("  Car ");
        assert_eq!(
            Function::Trim.apply(vec![s.clone()], &store).expect("trim"),
            Value::from("Car")
        );
        assert_eq!(
            Function::Upper.apply(vec![s.clone()], &store).expect("upper"),
            Value::from("  CAR ")
        );
        assert_eq!(
            Function::Length.apply(vec![s], &store).expect("length"),
            Value::Int(6)
        );
    }

    #[test]
    fn wrong_kind_is_an_error() {
        let store = store();
        let result = Function::Upper.apply(vec![Value::Int(1)], &store);
        assert!(matches!(result, Err(MetagraphError::Evaluation(_))));
    }

    #[test]
    fn null_handling() {
        let store = store();
        assert_eq!(
            Function::Lower.apply(vec![Value::Null], &store).expect("lower"),
            Value::Null
        );
        assert_eq!(
            Function::Coalesce
                .apply(vec![Value::Null, Value::Int(2), Value::Int(3)], &store)
                .expect("coalesce"),
            Value::Int(2)
        );
        assert_eq!(
            Function::Count.apply(vec![Value::Null], &store).expect("count"),
            Value::Int(0)
        );
    }

    #[test]
    fn element_functions() {
        let mut store = store();
        let id = store.create_element("Element").expect("create");
        assert_eq!(
            Function::ClassName
                .apply(vec![Value::Ref(id)], &store)
                .expect("class"),
            Value::from("Element")
        );
        assert_eq!(
            Function::ElementId
                .apply(vec![Value::Ref(id)], &store)
                .expect("id"),
            Value::Str(id.to_string())
        );
    }
}
