//! Typed extraction of tool arguments.
//!
//! Each tool declares a `Deserialize + JsonSchema` input struct. [`parse`]
//! turns the untyped argument object into that struct, and the `require_*`
//! helpers check what serde cannot express (blank strings, duplicates,
//! minimum sizes). All failures are [`InvocationError::Validation`].

use crate::error::InvocationError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

/// Deserializes tool arguments. A missing argument object counts as `{}`.
pub fn parse<T: DeserializeOwned>(input: Value) -> Result<T, InvocationError> {
    let input = match input {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => input,
        other => {
            return Err(InvocationError::validation(format!(
                "arguments must be an object, got {}",
                type_name(&other)
            )));
        }
    };
    serde_json::from_value(input).map_err(|e| InvocationError::validation(e.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn require_non_blank(field: &str, value: &str) -> Result<(), InvocationError> {
    if value.trim().is_empty() {
        return Err(InvocationError::validation(format!(
            "`{}` must not be blank",
            field
        )));
    }
    Ok(())
}

pub fn require_non_empty<T>(field: &str, values: &[T]) -> Result<(), InvocationError> {
    if values.is_empty() {
        return Err(InvocationError::validation(format!(
            "`{}` must contain at least one item",
            field
        )));
    }
    Ok(())
}

pub fn require_unique<T: Eq + Hash + Debug>(field: &str, values: &[T]) -> Result<(), InvocationError> {
    let mut seen = HashSet::with_capacity(values.len());
    for value in values {
        if !seen.insert(value) {
            return Err(InvocationError::validation(format!(
                "`{}` must not contain duplicates, found {:?} twice",
                field, value
            )));
        }
    }
    Ok(())
}

/// Checks every entry of a string list is non-blank and unique.
pub fn require_names(field: &str, values: &[String]) -> Result<(), InvocationError> {
    for value in values {
        require_non_blank(field, value)?;
    }
    require_unique(field, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Input {
        principal_name: String,
        #[serde(default)]
        roles: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Empty {}

    #[test]
    fn test_parse_camel_case() {
        let input: Input = parse(json!({"principalName": "alice", "roles": ["ADMIN"]})).unwrap();
        assert_eq!(input.principal_name, "alice");
        assert_eq!(input.roles, vec!["ADMIN"]);
    }

    #[test]
    fn test_parse_missing_field() {
        let error = parse::<Input>(json!({"roles": []})).unwrap_err();
        assert!(matches!(error, InvocationError::Validation(_)));
        assert!(error.to_string().contains("principalName"));
    }

    #[test]
    fn test_parse_wrong_type() {
        let error = parse::<Input>(json!({"principalName": 7})).unwrap_err();
        assert!(error.to_string().contains("invalid type"));
    }

    #[test]
    fn test_parse_null_is_empty_object() {
        assert!(parse::<Empty>(Value::Null).is_ok());
        assert!(parse::<Empty>(json!("x")).is_err());
    }

    #[test]
    fn test_require_unique() {
        assert!(require_unique("roles", &["A", "B"]).is_ok());
        let error = require_unique("roles", &["A", "A"]).unwrap_err();
        assert!(error.to_string().contains("`roles`"));
    }

    #[test]
    fn test_require_non_blank() {
        assert!(require_non_blank("path", "secure/").is_ok());
        assert!(require_non_blank("path", "   ").is_err());
    }

    proptest! {
        #[test]
        fn prop_unique_accepts_sets(values in proptest::collection::hash_set("[A-Z]{1,8}", 0..16)) {
            let values: Vec<String> = values.into_iter().collect();
            prop_assert!(require_names("roles", &values).is_ok());
        }

        #[test]
        fn prop_unique_rejects_repeats(values in proptest::collection::vec("[A-Z]{1,8}", 1..16), index in any::<prop::sample::Index>()) {
            let mut values = values;
            let repeated = values[index.index(values.len())].clone();
            values.push(repeated);
            prop_assert!(require_unique("roles", &values).is_err());
        }

        #[test]
        fn prop_parse_never_panics(value in any::<i64>()) {
            let result = parse::<Input>(json!({"principalName": value}));
            prop_assert!(result.is_err());
        }
    }
}
