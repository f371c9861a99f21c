//! Query requests recovered from logs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Variable bindings of a query: name to string value.
///
/// Keys are unique. Order carries no meaning; the map is sorted so that
/// logged output is stable.
pub type Variables = BTreeMap<String, String>;

/// A query plus its variable bindings.
///
/// Immutable once built. The same request is sent to both backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    text: String,
    variables: Variables,
}

impl QueryRequest {
    /// Create a request without variables
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            variables: Variables::new(),
        }
    }

    /// Create a request with variable bindings
    #[must_use]
    pub fn with_variables(text: impl Into<String>, variables: Variables) -> Self {
        Self {
            text: text.into(),
            variables,
        }
    }

    /// Query text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Variable bindings
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Whether the query binds any variables
    #[must_use]
    pub fn has_variables(&self) -> bool {
        !self.variables.is_empty()
    }
}

impl fmt::Display for QueryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)?;
        if self.has_variables() {
            write!(f, " vars={:?}", self.variables)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_variables() {
        let req = QueryRequest::new("{ q(func: has(name)) { uid } }");
        assert_eq!(req.text(), "{ q(func: has(name)) { uid } }");
        assert!(!req.has_variables());
        assert_eq!(req.to_string(), "{ q(func: has(name)) { uid } }");
    }

    #[test]
    fn test_request_with_variables() {
        let mut vars = Variables::new();
        vars.insert("$b".to_string(), "2".to_string());
        vars.insert("$a".to_string(), "1".to_string());
        let req = QueryRequest::with_variables("query q($a: int, $b: int) { }", vars);

        assert_eq!(req.variables().len(), 2);
        assert_eq!(req.variables()["$a"], "1");
        assert!(req.to_string().ends_with(r#"vars={"$a": "1", "$b": "2"}"#));
    }

    #[test]
    fn test_request_serialization() {
        let req = QueryRequest::new("{ me() }");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"text":"{ me() }","variables":{}}"#);
    }
}
