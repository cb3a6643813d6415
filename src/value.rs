//! The value attached to a node: a scalar string, a parenthesized list, or a
//! fixed array of juxtaposed items.
//!
//! `Display` writes a value back in configuration syntax, quoting strings
//! that would not survive as bare words, so formatted output reparses to an
//! equal value.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    String(String),
    List(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Build a value from a sequence of juxtaposed items: one item stands for
    /// itself, several become an array.
    pub fn collapse(mut items: Vec<Value>) -> Self {
        if items.len() == 1 {
            items.remove(0)
        } else {
            Value::Array(items)
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Array(_) => "array",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// Characters that may appear in an unquoted word.
pub(crate) fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | '{' | '}' | '(' | ')' | ',' | '"' | '\'')
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || !s.chars().all(is_word_char)
        || s.starts_with('#')
        || s.starts_with("//")
        || s.starts_with("/*")
        || s.starts_with("<<")
}

fn write_quoted(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    if !needs_quoting(s) {
        return f.write_str(s);
    }
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write_quoted(f, s),
            Value::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::string(v)
    }

    #[test]
    fn equality_requires_same_tag() {
        assert_ne!(Value::List(vec![s("a")]), Value::Array(vec![s("a")]));
        assert_ne!(s("a"), Value::List(vec![s("a")]));
    }

    #[test]
    fn lists_compare_length_then_elements() {
        assert_eq!(
            Value::List(vec![s("a"), s("b")]),
            Value::List(vec![s("a"), s("b")])
        );
        assert_ne!(
            Value::List(vec![s("a"), s("b")]),
            Value::List(vec![s("a")])
        );
        assert_ne!(
            Value::Array(vec![s("a"), s("b")]),
            Value::Array(vec![s("a"), s("c")])
        );
    }

    #[test]
    fn collapse_single_item() {
        assert_eq!(Value::collapse(vec![s("x")]), s("x"));
        assert_eq!(
            Value::collapse(vec![s("x"), s("y")]),
            Value::Array(vec![s("x"), s("y")])
        );
    }

    #[test]
    fn display_quotes_only_when_needed() {
        assert_eq!(s("mail").to_string(), "mail");
        assert_eq!(s("127.0.0.1/8").to_string(), "127.0.0.1/8");
        assert_eq!(s("two words").to_string(), "\"two words\"");
        assert_eq!(s("").to_string(), "\"\"");
        assert_eq!(s("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
        assert_eq!(s("#not-a-comment").to_string(), "\"#not-a-comment\"");
    }

    #[test]
    fn display_list_and_array() {
        let list = Value::List(vec![s("a"), s("b c")]);
        assert_eq!(list.to_string(), "(a, \"b c\")");
        let array = Value::Array(vec![s("from"), s("10.0.0.0/8")]);
        assert_eq!(array.to_string(), "from 10.0.0.0/8");
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(Value::List(vec![s("x")])).unwrap();
        assert_eq!(json["type"], "list");
        assert_eq!(json["value"][0]["type"], "string");
        assert_eq!(json["value"][0]["value"], "x");
    }
}
