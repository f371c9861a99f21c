//! Structural comparison of JSON results.
//!
//! Object members compare without regard to order, arrays compare element by
//! element in order, scalars compare exactly. Text that does not parse as
//! JSON never equals anything, including identical text.
//!
//! Results of recursive queries nest deeply, so parsing runs on a stack sized
//! to the payload and the walks below use an explicit work list. Payloads
//! nested deeper than [`MAX_JSON_DEPTH`] count as unparsable.

use serde::Deserialize;
use serde_json::{Number, Value};

/// Deepest array/object nesting accepted in a payload
pub const MAX_JSON_DEPTH: usize = 10_000;

/// Nesting handled on the caller's stack
const INLINE_DEPTH: usize = 64;
/// Stack reserved per nesting level beyond [`INLINE_DEPTH`]
const STACK_PER_LEVEL: usize = 16 * 1024;
const STACK_BASE: usize = 256 * 1024;

/// Whether two raw JSON texts denote the same value
#[must_use]
pub fn json_equal(left: &str, right: &str) -> bool {
    with_values(left, right, values_equal).unwrap_or(false)
}

/// Locate the first difference between two raw JSON texts.
///
/// Returns `None` when they are equal, otherwise a JSON pointer to the first
/// divergent location. A parse failure on either side diverges at the root
/// (`""`).
#[must_use]
pub fn first_divergence(left: &str, right: &str) -> Option<String> {
    with_values(left, right, divergence).unwrap_or_else(|| Some(String::new()))
}

/// Deep structural equality of two parsed values
#[must_use]
pub fn values_equal(left: &Value, right: &Value) -> bool {
    let mut pending = vec![(left, right)];
    while let Some((left, right)) = pending.pop() {
        match (left, right) {
            (Value::Object(l), Value::Object(r)) => {
                if l.len() != r.len() {
                    return false;
                }
                for (key, lv) in l {
                    match r.get(key) {
                        Some(rv) => pending.push((lv, rv)),
                        None => return false,
                    }
                }
            }
            (Value::Array(l), Value::Array(r)) => {
                if l.len() != r.len() {
                    return false;
                }
                pending.extend(l.iter().zip(r));
            }
            (Value::Number(l), Value::Number(r)) => {
                if !numbers_equal(l, r) {
                    return false;
                }
            }
            _ => {
                if left != right {
                    return false;
                }
            }
        }
    }
    true
}

/// Parse both texts and hand them to `f`.
///
/// `None` if either side does not parse. Parsing and dropping the values both
/// recurse once per nesting level, so deep payloads get a dedicated stack.
fn with_values<T>(left: &str, right: &str, f: impl FnOnce(&Value, &Value) -> T) -> Option<T> {
    let depth = nesting_depth(left)?.max(nesting_depth(right)?);
    let run = || {
        let l = parse(left)?;
        let r = parse(right)?;
        Some(f(&l, &r))
    };
    if depth <= INLINE_DEPTH {
        run()
    } else {
        stacker::grow(STACK_BASE + depth * STACK_PER_LEVEL, run)
    }
}

fn parse(text: &str) -> Option<Value> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de).ok()?;
    de.end().ok()?;
    Some(value)
}

/// Deepest bracket nesting outside strings, or `None` past [`MAX_JSON_DEPTH`]
fn nesting_depth(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for b in text.bytes() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                deepest = deepest.max(depth);
                if deepest > MAX_JSON_DEPTH {
                    return None;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Some(deepest)
}

/// Integers compare exactly; anything involving a float compares as `f64`.
fn numbers_equal(left: &Number, right: &Number) -> bool {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return l == r;
    }
    if left.is_f64() || right.is_f64() {
        return match (left.as_f64(), right.as_f64()) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        };
    }
    // one negative i64, one u64 above i64::MAX
    false
}

enum Step<'v> {
    Compare(&'v Value, &'v Value, String),
    /// Divergence already known at this path
    Differs(String),
}

/// Depth-first walk in document order: sorted keys, then array indices, with
/// a length difference reported after the shared prefix.
fn divergence(left: &Value, right: &Value) -> Option<String> {
    let mut pending = vec![Step::Compare(left, right, String::new())];
    while let Some(step) = pending.pop() {
        let (left, right, path) = match step {
            Step::Differs(path) => return Some(path),
            Step::Compare(left, right, path) => (left, right, path),
        };
        match (left, right) {
            (Value::Object(l), Value::Object(r)) => {
                let mut keys: Vec<&String> = l.keys().chain(r.keys()).collect();
                keys.sort();
                keys.dedup();
                for key in keys.into_iter().rev() {
                    let child = format!("{}/{}", path, escape_pointer(key));
                    pending.push(match (l.get(key), r.get(key)) {
                        (Some(lv), Some(rv)) => Step::Compare(lv, rv, child),
                        _ => Step::Differs(child),
                    });
                }
            }
            (Value::Array(l), Value::Array(r)) => {
                if l.len() != r.len() {
                    pending.push(Step::Differs(format!("{}/{}", path, l.len().min(r.len()))));
                }
                for (i, (lv, rv)) in l.iter().zip(r).enumerate().rev() {
                    pending.push(Step::Compare(lv, rv, format!("{path}/{i}")));
                }
            }
            _ if values_equal(left, right) => {}
            _ => return Some(path),
        }
    }
    None
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
