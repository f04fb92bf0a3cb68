//! The server's search DSL: `field="value"` clauses joined by commas.
//!
//! Commas between clauses mean AND. Values are quoted and may contain
//! commas; quotes and backslashes inside values are backslash-escaped.

use std::fmt;

/// A search expression built from field/value equality clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    clauses: Vec<(String, String)>,
}

impl SearchQuery {
    /// An empty query matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field="value"` clause, builder style.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    /// True when no clause has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (field, value)) in self.clauses.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{field}=\"{}\"", escape(value))?;
        }
        Ok(())
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parse a rendered query back into clauses. Used by the mock client to
/// match records the way the server would; clauses that are not plain
/// quoted equality are skipped.
pub(crate) fn parse(query: &str) -> Vec<(String, String)> {
    let mut clauses = Vec::new();
    let mut field = String::new();
    let mut value = String::new();
    let mut saw_quotes = false;
    let mut in_quotes = false;
    let mut escaped = false;

    let mut flush = |field: &mut String, value: &mut String, saw_quotes: &mut bool| {
        let name = field.trim().trim_end_matches('=').trim().to_string();
        if !name.is_empty() && *saw_quotes {
            clauses.push((name, std::mem::take(value)));
        }
        field.clear();
        value.clear();
        *saw_quotes = false;
    };

    for c in query.chars() {
        if in_quotes {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_quotes = false;
            } else {
                value.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
            saw_quotes = true;
        } else if c == ',' {
            flush(&mut field, &mut value, &mut saw_quotes);
        } else {
            field.push(c);
        }
    }
    flush(&mut field, &mut value, &mut saw_quotes);
    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_clause() {
        let query = SearchQuery::new().eq("name", "Default Organization");
        assert_eq!(query.to_string(), r#"name="Default Organization""#);
    }

    #[test]
    fn test_render_joins_clauses_with_commas() {
        let query = SearchQuery::new().eq("name", "recent").eq("controller", "job_invocations");
        assert_eq!(query.to_string(), r#"name="recent",controller="job_invocations""#);
    }

    #[test]
    fn test_render_escapes_quotes_and_backslashes() {
        let query = SearchQuery::new().eq("name", r#"say "hi" \now"#);
        assert_eq!(query.to_string(), r#"name="say \"hi\" \\now""#);
    }

    #[test]
    fn test_empty_query_renders_empty() {
        let query = SearchQuery::new();
        assert!(query.is_empty());
        assert_eq!(query.to_string(), "");
    }

    #[test]
    fn test_parse_roundtrip() {
        let rendered = SearchQuery::new()
            .eq("name", "recent")
            .eq("controller", "job_invocations")
            .to_string();
        assert_eq!(
            parse(&rendered),
            vec![
                ("name".to_string(), "recent".to_string()),
                ("controller".to_string(), "job_invocations".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_commas_inside_quotes() {
        let clauses = parse(r#"name="a, b",title="c""#);
        assert_eq!(
            clauses,
            vec![
                ("name".to_string(), "a, b".to_string()),
                ("title".to_string(), "c".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_unescapes_values() {
        let rendered = SearchQuery::new().eq("name", r#"say "hi""#).to_string();
        let clauses = parse(&rendered);
        assert_eq!(clauses[0].1, r#"say "hi""#);
    }

    #[test]
    fn test_parse_skips_unquoted_clauses() {
        let clauses = parse("name ~ prod");
        assert!(clauses.is_empty());
    }
}
