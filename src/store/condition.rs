//! Boolean condition tree over record fields.
//!
//! Conditions are plain data: the predicate compiler builds them, the query
//! handle carries them, and a store either translates them into its own
//! query language or evaluates them directly with [`Condition::evaluate`].

use crate::store::Record;
use crate::value::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Lte => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Gte => ordering != Ordering::Less,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayMatch {
    /// Shares at least one element.
    Overlaps,
    /// Holds every given element.
    Contains,
    /// Every element is among the given ones.
    ContainedBy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyMatch {
    Any,
    All,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    /// SQL `LIKE` with `%`, `_` wildcards and `\` escapes.
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
        negated: bool,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
        negated: bool,
    },
    Null {
        field: String,
        negated: bool,
    },
    /// Null, blank text, or an empty collection.
    Blank {
        field: String,
        negated: bool,
    },
    Array {
        field: String,
        op: ArrayMatch,
        values: Vec<Value>,
    },
    HasKeys {
        field: String,
        keys: Vec<String>,
        mode: KeyMatch,
    },
    DocContains {
        field: String,
        document: BTreeMap<String, Value>,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn compare(field: &str, op: Comparison, value: impl Into<Value>) -> Self {
        Condition::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// Conjunction; nested conjunctions are flattened.
    pub fn and(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::And(mut left), Condition::And(right)) => {
                left.extend(right);
                Condition::And(left)
            }
            (Condition::And(mut left), right) => {
                left.push(right);
                Condition::And(left)
            }
            (left, right) => Condition::And(vec![left, right]),
        }
    }

    /// Disjunction; nested disjunctions are flattened.
    pub fn or(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::Or(mut left), Condition::Or(right)) => {
                left.extend(right);
                Condition::Or(left)
            }
            (Condition::Or(mut left), right) => {
                left.push(right);
                Condition::Or(left)
            }
            (left, right) => Condition::Or(vec![left, right]),
        }
    }

    pub fn negate(self) -> Condition {
        match self {
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }

    /// Fold a list of conditions into one conjunction, `None` when empty.
    pub fn all(conditions: Vec<Condition>) -> Option<Condition> {
        conditions.into_iter().reduce(Condition::and)
    }

    /// Fold a list of conditions into one disjunction, `None` when empty.
    pub fn any(conditions: Vec<Condition>) -> Option<Condition> {
        conditions.into_iter().reduce(Condition::or)
    }

    /// Evaluate against a record. Comparisons against null fields are false.
    pub fn evaluate(&self, record: &dyn Record) -> bool {
        match self {
            Condition::Compare { field, op, value } => {
                let actual = record.field(field);
                if actual.is_null() || value.is_null() {
                    return false;
                }
                match actual.compare(value) {
                    Some(ordering) => op.holds(ordering),
                    None => match op {
                        Comparison::Eq => actual == *value,
                        Comparison::NotEq => actual != *value,
                        _ => false,
                    },
                }
            }
            Condition::Like {
                field,
                pattern,
                case_insensitive,
                negated,
            } => match record.field(field) {
                Value::Text(text) => like_match(pattern, &text, *case_insensitive) != *negated,
                _ => false,
            },
            Condition::In {
                field,
                values,
                negated,
            } => {
                let actual = record.field(field);
                if actual.is_null() {
                    return false;
                }
                values.iter().any(|v| actual.loosely_eq(v)) != *negated
            }
            Condition::Between {
                field,
                low,
                high,
                negated,
            } => {
                let actual = record.field(field);
                let inside = matches!(
                    actual.compare(low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(actual.compare(high), Some(Ordering::Less | Ordering::Equal));
                if actual.is_null() {
                    false
                } else {
                    inside != *negated
                }
            }
            Condition::Null { field, negated } => record.field(field).is_null() != *negated,
            Condition::Blank { field, negated } => record.field(field).is_blank() != *negated,
            Condition::Array { field, op, values } => match record.field(field) {
                Value::List(items) => {
                    let holds = |v: &Value| items.iter().any(|i| i.loosely_eq(v));
                    match op {
                        ArrayMatch::Overlaps => values.iter().any(holds),
                        ArrayMatch::Contains => values.iter().all(holds),
                        ArrayMatch::ContainedBy => items
                            .iter()
                            .all(|i| values.iter().any(|v| i.loosely_eq(v))),
                    }
                }
                _ => false,
            },
            Condition::HasKeys { field, keys, mode } => match record.field(field) {
                Value::Map(map) => match mode {
                    KeyMatch::Any => keys.iter().any(|k| map.contains_key(k)),
                    KeyMatch::All => keys.iter().all(|k| map.contains_key(k)),
                },
                _ => false,
            },
            Condition::DocContains { field, document } => match record.field(field) {
                Value::Map(map) => document_contains(&map, document),
                _ => false,
            },
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(record)),
            Condition::Or(conditions) => conditions.iter().any(|c| c.evaluate(record)),
            Condition::Not(inner) => !inner.evaluate(record),
        }
    }
}

fn document_contains(haystack: &BTreeMap<String, Value>, needle: &BTreeMap<String, Value>) -> bool {
    needle.iter().all(|(key, expected)| match (haystack.get(key), expected) {
        (Some(Value::Map(inner)), Value::Map(wanted)) => document_contains(inner, wanted),
        (Some(actual), expected) => actual.loosely_eq(expected),
        (None, _) => false,
    })
}

/// Escape `%`, `_` and `\` so user text matches literally inside a pattern.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

enum LikeToken {
    Literal(char),
    One,
    Many,
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Many,
            '_' => LikeToken::One,
            '\\' => LikeToken::Literal(chars.next().unwrap_or('\\')),
            other => LikeToken::Literal(other),
        });
    }
    tokens
}

/// Match `text` against a SQL `LIKE` pattern.
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    // Pattern and text fold the same way, so multi-char lowercase forms line up.
    let (tokens, text): (Vec<LikeToken>, Vec<char>) = if case_insensitive {
        (
            like_tokens(&pattern.to_lowercase()),
            text.to_lowercase().chars().collect(),
        )
    } else {
        (like_tokens(pattern), text.chars().collect())
    };

    // matched[j]: the tokens consumed so far can match text[..j]
    let mut matched = vec![false; text.len() + 1];
    matched[0] = true;
    for token in &tokens {
        let mut next = vec![false; text.len() + 1];
        match token {
            LikeToken::Many => {
                let mut reachable = false;
                for j in 0..=text.len() {
                    reachable |= matched[j];
                    next[j] = reachable;
                }
            }
            LikeToken::One => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1];
                }
            }
            LikeToken::Literal(c) => {
                for j in 1..=text.len() {
                    next[j] = matched[j - 1] && text[j - 1] == *c;
                }
            }
        }
        matched = next;
    }
    matched[text.len()]
}

fn write_list(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    write!(f, "{}", Value::List(values.to_vec()))
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare { field, op, value } => write!(f, "{field} {} {value}", op.symbol()),
            Condition::Like {
                field,
                pattern,
                case_insensitive,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let like = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{field} {not}{like} {}", Value::Text(pattern.clone()))
            }
            Condition::In {
                field,
                values,
                negated,
            } => {
                write!(f, "{field} {}IN ", if *negated { "NOT " } else { "" })?;
                write_list(f, values)
            }
            Condition::Between {
                field,
                low,
                high,
                negated,
            } => write!(
                f,
                "{field} {}BETWEEN {low} AND {high}",
                if *negated { "NOT " } else { "" }
            ),
            Condition::Null { field, negated } => {
                write!(f, "{field} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Condition::Blank { field, negated } => {
                if *negated {
                    write!(f, "{field} IS PRESENT")
                } else {
                    write!(f, "{field} IS BLANK")
                }
            }
            Condition::Array { field, op, values } => {
                let symbol = match op {
                    ArrayMatch::Overlaps => "&&",
                    ArrayMatch::Contains => "@>",
                    ArrayMatch::ContainedBy => "<@",
                };
                write!(f, "{field} {symbol} ")?;
                write_list(f, values)
            }
            Condition::HasKeys { field, keys, mode } => {
                let symbol = match mode {
                    KeyMatch::Any => "?|",
                    KeyMatch::All => "?&",
                };
                write!(f, "{field} {symbol} ({})", keys.join(", "))
            }
            Condition::DocContains { field, document } => {
                write!(f, "{field} @> {}", Value::Map(document.clone()))
            }
            Condition::And(conditions) => write_joined(f, conditions, " AND "),
            Condition::Or(conditions) => write_joined(f, conditions, " OR "),
            Condition::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, conditions: &[Condition], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, condition) in conditions.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{condition}")?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn like_handles_wildcards_and_escapes() {
        assert!(like_match("%Ruby%", "Ruby on Rails", false));
        assert!(!like_match("%ruby%", "Ruby on Rails", false));
        assert!(like_match("%ruby%", "Ruby on Rails", true));
        assert!(like_match("R_by%", "Ruby", false));
        assert!(like_match(&format!("%{}%", escape_like("50%")), "save 50% now", false));
        assert!(!like_match(&format!("%{}%", escape_like("50%")), "save 500 now", false));
        assert!(like_match("", "", false));
        assert!(!like_match("a", "", false));
    }

    #[test]
    fn case_folding_handles_multi_char_lowercase() {
        // 'İ' lowercases to two chars: 'i' plus a combining dot.
        assert!(like_match("İzmir", "İZMIR", true));
        assert!(like_match("%MİR", "izmİr", true));
        assert!(like_match("İ_mir", "İzmir", true));
        assert!(!like_match("İzmir", "izmir", true));
    }

    #[test]
    fn and_flattens_nested_conjunctions() {
        let c = Condition::eq("a", 1)
            .and(Condition::eq("b", 2))
            .and(Condition::eq("c", 3));
        match c {
            Condition::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn comparisons_against_null_are_false() {
        let record = row(&[("views", Value::Null)]);
        assert!(!Condition::compare("views", Comparison::NotEq, 3).evaluate(&record));
        assert!(Condition::Null {
            field: "views".into(),
            negated: false
        }
        .evaluate(&record));
    }

    #[test]
    fn array_and_document_operators() {
        let mut doc = BTreeMap::new();
        doc.insert("lang".to_string(), Value::from("en"));
        let record = row(&[
            ("tags", Value::from(vec!["rust", "db"])),
            ("meta", Value::Map(doc.clone())),
        ]);

        let overlaps = Condition::Array {
            field: "tags".into(),
            op: ArrayMatch::Overlaps,
            values: vec![Value::from("db"), Value::from("go")],
        };
        let contains = Condition::Array {
            field: "tags".into(),
            op: ArrayMatch::Contains,
            values: vec![Value::from("db"), Value::from("go")],
        };
        assert!(overlaps.evaluate(&record));
        assert!(!contains.evaluate(&record));

        let has_all = Condition::HasKeys {
            field: "meta".into(),
            keys: vec!["lang".into(), "region".into()],
            mode: KeyMatch::All,
        };
        assert!(!has_all.evaluate(&record));
        assert!(Condition::DocContains {
            field: "meta".into(),
            document: doc
        }
        .evaluate(&record));
    }

    #[test]
    fn display_renders_sql_like_text() {
        let c = Condition::eq("status", "draft").and(Condition::Null {
            field: "deleted_at".into(),
            negated: false,
        });
        assert_eq!(c.to_string(), "(status = 'draft' AND deleted_at IS NULL)");
    }
}
