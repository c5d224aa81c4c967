//! Structured-output extraction from model text.
//!
//! Model responses usually wrap a JSON value in prose, and while a response
//! is streaming the JSON is truncated. [`JsonParser`] looks at each JSON
//! container in the text in turn and takes the first that parses as a whole
//! value. Failing that, it closes a container at the latest point where the
//! truncated prefix still forms valid JSON, preferring a non-empty result.
//!
//! The result is wrapped in an envelope:
//!
//! ```json
//! {"status": "completed", "object_type": "object", "data": {"completion": {...}}}
//! ```
//!
//! `status` is `"completed"` when the text held a whole value and `"partial"`
//! when closing brackets had to be supplied. The completion lives at
//! [`COMPLETION_POINTER`](crate::types::COMPLETION_POINTER).

use serde_json::{Deserializer, Value, json};

/// Default maximum container nesting accepted by the parser.
pub const DEFAULT_JSON_DEPTH_LIMIT: usize = 20;

/// Upper bound on repair attempts per call. Each attempt is one
/// `serde_json` parse of a prefix, so this bounds the work per snapshot.
const MAX_COMPLETION_ATTEMPTS: usize = 64;

/// Upper bound on containers tried per call when earlier ones are not JSON.
const MAX_CANDIDATES: usize = 16;

/// Extracts structured data from (possibly incomplete) model text.
///
/// Implementations return `None` for text that holds nothing parseable;
/// they never fail on incomplete input.
pub trait OutputParser: Send + Sync {
    fn fit(&self, text: &str, depth_limit: usize) -> Option<Value>;
}

/// Depth-limited, truncation-tolerant JSON parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl OutputParser for JsonParser {
    fn fit(&self, text: &str, depth_limit: usize) -> Option<Value> {
        // First repaired value, replaced once by a non-empty one if it was empty.
        let mut fallback: Option<Value> = None;
        let mut offset = 0;

        for _ in 0..MAX_CANDIDATES {
            let Some(found) = text[offset..].find(['{', '[']) else {
                break;
            };
            let start = offset + found;
            let body = text[start..].trim_end();

            // Whole value present; anything after it is ignored.
            if let Some(Ok(value)) = Deserializer::from_str(body).into_iter::<Value>().next() {
                return (depth(&value) <= depth_limit).then(|| envelope("completed", value));
            }

            let Some(scanned) = scan(body, depth_limit) else {
                break;
            };
            if let Some(value) = repair(body, &scanned.cuts) {
                match &fallback {
                    None => fallback = Some(value),
                    Some(prev) if is_empty_container(prev) && !is_empty_container(&value) => {
                        fallback = Some(value)
                    }
                    Some(_) => {}
                }
            }

            // A truncated container runs to the end of the text.
            match scanned.closed_at {
                Some(end) => offset = start + end,
                None => break,
            }
        }

        fallback.map(|value| envelope("partial", value))
    }
}

/// Close `body` at the latest cut that yields valid JSON.
fn repair(body: &str, cuts: &[Cut]) -> Option<Value> {
    cuts.iter()
        .rev()
        .take(MAX_COMPLETION_ATTEMPTS)
        .find_map(|cut| {
            let prefix = body[..cut.end].trim_end();
            let prefix = prefix.strip_suffix(',').unwrap_or(prefix);
            let candidate = format!("{prefix}{}", cut.closers);
            serde_json::from_str::<Value>(&candidate).ok()
        })
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// A point where `body[..end]` followed by `closers` may be valid JSON.
struct Cut {
    end: usize,
    closers: String,
}

/// Cut points of the container opening `body`, and where it closes.
struct Scan {
    cuts: Vec<Cut>,
    /// Byte offset just past the closing bracket; `None` if truncated.
    closed_at: Option<usize>,
}

/// Walk the first JSON container in `body`, recording candidate cut points.
///
/// Returns `None` when nesting exceeds `depth_limit`.
fn scan(body: &str, depth_limit: usize) -> Option<Scan> {
    let mut stack: Vec<char> = Vec::new();
    let mut cuts = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    let closers = |stack: &[char]| stack.iter().rev().collect::<String>();

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                cuts.push(Cut {
                    end: i + 1,
                    closers: closers(&stack),
                });
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => {
                stack.push(if c == '{' { '}' } else { ']' });
                if stack.len() > depth_limit {
                    return None;
                }
                cuts.push(Cut {
                    end: i + 1,
                    closers: closers(&stack),
                });
            }
            '}' | ']' => {
                stack.pop();
                cuts.push(Cut {
                    end: i + 1,
                    closers: closers(&stack),
                });
                if stack.is_empty() {
                    return Some(Scan {
                        cuts,
                        closed_at: Some(i + 1),
                    });
                }
            }
            ',' => cuts.push(Cut {
                end: i,
                closers: closers(&stack),
            }),
            _ => {}
        }
    }

    // Truncated mid-token: close an open string, then the containers.
    let mut tail = closers(&stack);
    if in_string {
        if escaped {
            return Some(Scan {
                cuts,
                closed_at: None,
            });
        }
        tail.insert(0, '"');
    }
    cuts.push(Cut {
        end: body.len(),
        closers: tail,
    });
    Some(Scan {
        cuts,
        closed_at: None,
    })
}

/// Container nesting depth of a value; scalars are depth 0.
fn depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

fn envelope(status: &str, value: Value) -> Value {
    let object_type = match value {
        Value::Array(_) => "array",
        _ => "object",
    };
    json!({
        "status": status,
        "object_type": object_type,
        "data": { "completion": value },
    })
}
