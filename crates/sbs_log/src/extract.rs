//! Query extraction from raw log lines.
//!
//! A query line carries [`QUERY_MARKER`] followed by a request record in
//! protobuf text-format style:
//!
//! ```text
//! record := field*                   ; stops at the first token that cannot start a field
//! field  := IDENT [":"] value
//! value  := STRING | SCALAR | "{" field* "}" | "<" field* ">"
//! ```
//!
//! If the record has a `query` field holding a message, that message is the
//! request (`query:{query:"..." vars:<...>}`). Otherwise the record itself is
//! the request (`query:"..." vars:<...>`). The request's first `query` field
//! must be a string. Every `vars` field must be a message with string `key`
//! and `value` fields; a binding missing either rejects the whole line.
//! Messages nest at most [`MAX_DEPTH`] deep.

use crate::lexer::{Lexer, Token};
use sbs_core::{QueryRequest, Variables};

/// Phrase that introduces a logged query
pub const QUERY_MARKER: &str = "Got a query: ";

/// Deepest message nesting accepted in a record
pub const MAX_DEPTH: usize = 64;

/// Why a line was not turned into a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Reason {
    /// The marker phrase is absent
    #[error("marker phrase not found")]
    MissingMarker,
    /// No string `query` field in the record
    #[error("no quoted query string")]
    MissingQuery,
    /// A quoted string never closes
    #[error("unterminated string")]
    UnterminatedString,
    /// Unknown or out-of-range escape sequence
    #[error("invalid escape sequence")]
    InvalidEscape,
    /// Unescaped bytes are not UTF-8
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    /// A message is not closed, or closed with the wrong bracket
    #[error("unbalanced brackets")]
    UnbalancedBrackets,
    /// A token that cannot appear at this position
    #[error("unexpected token")]
    UnexpectedToken,
    /// A `vars` entry without a string key or value
    #[error("variable binding without key or value")]
    MalformedBinding,
    /// Messages nest deeper than [`MAX_DEPTH`]
    #[error("messages nested too deeply")]
    TooDeep,
}

/// The line does not hold a replayable query.
///
/// This is the common case for most log lines; callers filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not a query line: {reason}")]
pub struct NotAQuery {
    /// Why extraction stopped
    pub reason: Reason,
}

impl From<Reason> for NotAQuery {
    fn from(reason: Reason) -> Self {
        Self { reason }
    }
}

#[derive(Debug)]
enum Value<'a> {
    Str(String),
    Scalar,
    Message(Vec<Field<'a>>),
}

#[derive(Debug)]
struct Field<'a> {
    name: &'a str,
    value: Value<'a>,
}

/// Extract a query request from one log line
///
/// # Errors
///
/// Returns [`NotAQuery`] when the line has no marker or its record does not
/// follow the grammar above.
pub fn extract(line: &str) -> Result<QueryRequest, NotAQuery> {
    let start = line.find(QUERY_MARKER).ok_or(Reason::MissingMarker)?;
    let mut lexer = Lexer::new(&line[start + QUERY_MARKER.len()..]);
    let record = parse_record(&mut lexer)?;

    let request = match first(&record, "query") {
        Some(Value::Message(inner)) => inner.as_slice(),
        Some(Value::Str(_)) => record.as_slice(),
        _ => return Err(Reason::MissingQuery.into()),
    };

    let text = match first(request, "query") {
        Some(Value::Str(text)) => text.clone(),
        _ => return Err(Reason::MissingQuery.into()),
    };

    let mut variables = Variables::new();
    for field in request.iter().filter(|f| f.name == "vars") {
        let Value::Message(binding) = &field.value else {
            return Err(Reason::MalformedBinding.into());
        };
        match (first(binding, "key"), first(binding, "value")) {
            (Some(Value::Str(key)), Some(Value::Str(value))) => {
                variables.insert(key.clone(), value.clone());
            }
            _ => return Err(Reason::MalformedBinding.into()),
        }
    }

    Ok(QueryRequest::with_variables(text, variables))
}

fn first<'f, 'a>(fields: &'f [Field<'a>], name: &str) -> Option<&'f Value<'a>> {
    fields.iter().find(|f| f.name == name).map(|f| &f.value)
}

fn closing(open: char) -> char {
    if open == '<' { '>' } else { '}' }
}

/// Parse the top-level record.
///
/// Once a nested `query` message is complete the rest of the line is log
/// decoration, so a later parse failure ends the record instead of
/// rejecting it.
fn parse_record<'a>(lexer: &mut Lexer<'a>) -> Result<Vec<Field<'a>>, Reason> {
    let mut fields = Vec::new();
    loop {
        match parse_field(lexer, None, 0) {
            Ok(Some(field)) => fields.push(field),
            Ok(None) => return Ok(fields),
            Err(_) if matches!(first(&fields, "query"), Some(Value::Message(_))) => {
                return Ok(fields);
            }
            Err(reason) => return Err(reason),
        }
    }
}

/// Parse the fields of a message up to and including `close`.
fn parse_message<'a>(
    lexer: &mut Lexer<'a>,
    close: char,
    depth: usize,
) -> Result<Vec<Field<'a>>, Reason> {
    if depth > MAX_DEPTH {
        return Err(Reason::TooDeep);
    }
    let mut fields = Vec::new();
    while let Some(field) = parse_field(lexer, Some(close), depth)? {
        fields.push(field);
    }
    Ok(fields)
}

/// Parse one field. `None` means the enclosing message closed, or at the top
/// level that the next token cannot start a field.
fn parse_field<'a>(
    lexer: &mut Lexer<'a>,
    close: Option<char>,
    depth: usize,
) -> Result<Option<Field<'a>>, Reason> {
    let name = match lexer.peek() {
        None if close.is_some() => return Err(Reason::UnbalancedBrackets),
        None => return Ok(None),
        Some(Err(reason)) => return Err(*reason),
        Some(Ok(Token::Ident(name))) => *name,
        Some(Ok(Token::Close(c))) if close.is_some() => {
            let c = *c;
            lexer.next();
            return if Some(c) == close {
                Ok(None)
            } else {
                Err(Reason::UnbalancedBrackets)
            };
        }
        Some(Ok(_)) if close.is_some() => return Err(Reason::UnexpectedToken),
        Some(Ok(_)) => return Ok(None),
    };
    lexer.next();

    if matches!(lexer.peek(), Some(Ok(Token::Colon))) {
        lexer.next();
    }

    let value = match lexer.next() {
        Some(Ok(Token::Str(s))) => Value::Str(s),
        Some(Ok(Token::Scalar(_) | Token::Ident(_))) => Value::Scalar,
        Some(Ok(Token::Open(open))) => Value::Message(parse_message(lexer, closing(open), depth + 1)?),
        Some(Err(reason)) => return Err(reason),
        Some(Ok(_)) => return Err(Reason::UnexpectedToken),
        None if close.is_some() => return Err(Reason::UnbalancedBrackets),
        None => return Err(Reason::UnexpectedToken),
    };
    Ok(Some(Field { name, value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Render a request the way the server logs it
    fn log_line(text: &str, bindings: &[(String, String)]) -> String {
        let mut line = format!(
            "I1019 12:00:00.000000 1 server.go:1200] {}query:{{query:{}",
            QUERY_MARKER,
            quote(text)
        );
        for (k, v) in bindings {
            line.push_str(&format!(" vars:<key:{} value:{}>", quote(k), quote(v)));
        }
        line.push('}');
        line
    }

    fn quote(s: &str) -> String {
        let mut out = String::from("\"");
        for b in s.bytes() {
            match b {
                b'"' => out.push_str("\\\""),
                b'\\' => out.push_str("\\\\"),
                b'\n' => out.push_str("\\n"),
                b'\t' => out.push_str("\\t"),
                0x20..=0x7e => out.push(b as char),
                _ => out.push_str(&format!("\\{:03o}", b)),
            }
        }
        out.push('"');
        out
    }

    #[test]
    fn test_extract_nested_record() {
        let line = r#"Got a query: query:{query:"{q(func: has(name)){count(uid)}}" vars:<key:"$a" value:"1">}"#;
        let req = extract(line).unwrap();
        assert_eq!(req.text(), "{q(func: has(name)){count(uid)}}");
        assert_eq!(req.variables().len(), 1);
        assert_eq!(req.variables()["$a"], "1");
    }

    #[test]
    fn test_extract_flat_record() {
        let line = r#"I0101 alpha.go:10] Got a query: query:"{ me(func: uid(0x1)) { name } }" "#;
        let req = extract(line).unwrap();
        assert_eq!(req.text(), "{ me(func: uid(0x1)) { name } }");
        assert!(!req.has_variables());
    }

    #[test]
    fn test_extract_multiple_bindings() {
        let line = r#"Got a query: query:{query:"query q($a: string, $b: int)" vars:<key:"$a" value:"alice" > vars:<key:"$b" value:"30" > start_ts:12 }"#;
        let req = extract(line).unwrap();
        assert_eq!(req.variables()["$a"], "alice");
        assert_eq!(req.variables()["$b"], "30");
    }

    #[test]
    fn test_extract_escaped_query() {
        let line = r#"Got a query: query:{query:"{ q(func: eq(name, \"Bob\")) {\n uid\n} }"}"#;
        let req = extract(line).unwrap();
        assert_eq!(req.text(), "{ q(func: eq(name, \"Bob\")) {\n uid\n} }");
    }

    #[test]
    fn test_extract_ignores_trailing_text() {
        let line = r#"Got a query: query:{query:"{ q() }"} took 3ms (p99) ["ok"]"#;
        assert_eq!(extract(line).unwrap().text(), "{ q() }");

        let line = r#"Got a query: query:{query:"{ q() }"} latency:(p99) "unterminated"#;
        assert_eq!(extract(line).unwrap().text(), "{ q() }");
    }

    #[test]
    fn test_flat_record_trailing_binding_must_be_complete() {
        let line = r#"Got a query: query:"q" vars:<key:"$a""#;
        assert_eq!(extract(line).unwrap_err().reason, Reason::UnbalancedBrackets);
    }

    #[test]
    fn test_extract_duplicate_key_keeps_last() {
        let line = r#"Got a query: query:{query:"q" vars:<key:"$a" value:"1"> vars:<key:"$a" value:"2">}"#;
        assert_eq!(extract(line).unwrap().variables()["$a"], "2");
    }

    #[test]
    fn test_unrelated_line() {
        let err = extract("some unrelated text").unwrap_err();
        assert_eq!(err.reason, Reason::MissingMarker);
    }

    #[test]
    fn test_marker_without_query() {
        let err = extract("Got a query: nothing to see here").unwrap_err();
        assert_eq!(err.reason, Reason::MissingQuery);
    }

    #[test]
    fn test_query_not_a_string() {
        let err = extract("Got a query: query:{query:42}").unwrap_err();
        assert_eq!(err.reason, Reason::MissingQuery);
    }

    #[test]
    fn test_unterminated_query() {
        let err = extract(r#"Got a query: query:{query:"{ q(func: has(name)) "#).unwrap_err();
        assert_eq!(err.reason, Reason::UnterminatedString);
    }

    #[test]
    fn test_unclosed_message() {
        let err = extract(r#"Got a query: query:{query:"{ q() }" vars:<key:"$a" value:"1">"#).unwrap_err();
        assert_eq!(err.reason, Reason::UnbalancedBrackets);
    }

    #[test]
    fn test_mismatched_brackets() {
        let err = extract(r#"Got a query: query:{query:"q" vars:<key:"$a" value:"1"}}"#).unwrap_err();
        assert_eq!(err.reason, Reason::UnbalancedBrackets);
    }

    #[test]
    fn test_binding_missing_value_rejects_line() {
        let err = extract(r#"Got a query: query:{query:"q" vars:<key:"$a">}"#).unwrap_err();
        assert_eq!(err.reason, Reason::MalformedBinding);
    }

    #[test]
    fn test_binding_missing_key_rejects_line() {
        let err = extract(r#"Got a query: query:{query:"q" vars:<value:"1">}"#).unwrap_err();
        assert_eq!(err.reason, Reason::MalformedBinding);
    }

    #[test]
    fn test_binding_not_a_message() {
        let err = extract(r#"Got a query: query:{query:"q" vars:"$a=1"}"#).unwrap_err();
        assert_eq!(err.reason, Reason::MalformedBinding);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let line = format!("Got a query: query:{{query:\"q\" {}", "a:<".repeat(200_000));
        assert_eq!(extract(&line).unwrap_err().reason, Reason::TooDeep);
    }

    #[test]
    fn test_deep_trailing_text_is_ignored() {
        let line = format!("Got a query: query:{{query:\"q\"}} {}", "a:<".repeat(200_000));
        assert_eq!(extract(&line).unwrap().text(), "q");
    }

    #[test]
    fn test_nesting_at_limit_is_accepted() {
        let inner = format!("{}{}", "a:<".repeat(MAX_DEPTH - 1), ">".repeat(MAX_DEPTH - 1));
        let line = format!("Got a query: query:{{query:\"q\" {inner}}}");
        assert_eq!(extract(&line).unwrap().text(), "q");

        let inner = format!("{}{}", "a:<".repeat(MAX_DEPTH), ">".repeat(MAX_DEPTH));
        let line = format!("Got a query: query:{{query:\"q\" {inner}}}");
        assert_eq!(extract(&line).unwrap_err().reason, Reason::TooDeep);
    }

    #[test]
    fn test_not_a_query_display() {
        let err = NotAQuery::from(Reason::MissingMarker);
        assert_eq!(err.to_string(), "not a query line: marker phrase not found");
    }

    #[test]
    fn test_log_line_helper_matches_server_shape() {
        let line = log_line("{ q() }", &[("$a".to_string(), "1".to_string())]);
        assert!(line.ends_with(r#"Got a query: query:{query:"{ q() }" vars:<key:"$a" value:"1">}"#));
    }

    proptest! {
        #[test]
        fn prop_extract_round_trips(
            text in "\\PC{0,64}",
            bindings in proptest::collection::btree_map("\\$[a-z]{1,8}", "\\PC{0,16}", 0..5),
            seed in any::<u64>(),
        ) {
            let mut pairs: Vec<(String, String)> = bindings.clone().into_iter().collect();
            // rotate by an arbitrary amount so binding order varies
            if !pairs.is_empty() {
                let k = (seed % pairs.len() as u64) as usize;
                pairs.rotate_left(k);
            }

            let req = extract(&log_line(&text, &pairs)).unwrap();
            prop_assert_eq!(req.text(), text.as_str());
            prop_assert_eq!(req.variables(), &bindings);
        }

        #[test]
        fn prop_lines_without_marker_are_rejected(line in "[^G]{0,80}") {
            prop_assert_eq!(extract(&line).unwrap_err().reason, Reason::MissingMarker);
        }

        #[test]
        fn prop_extract_never_panics(line in "Got a query: \\PC{0,80}") {
            let _ = extract(&line);
        }
    }
}
