//! Field descriptors and the operator catalogue.
//!
//! The operators a field supports are derived from its [`SemanticType`]
//! once, at declaration, and never change afterwards.

use crate::store::{escape_like, ArrayMatch, Comparison, Condition, KeyMatch, SemanticType};
use crate::value::{Presence, Value};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;

/// A predicate operator, the suffix of a `field_operator` key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    NotEq,
    Matches,
    Start,
    End,
    Cont,
    NotCont,
    ICont,
    NotICont,
    In,
    NotIn,
    Present,
    Blank,
    Null,
    NotNull,
    Lt,
    Lteq,
    Gt,
    Gteq,
    Between,
    NotBetween,
    True,
    False,
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    ThisYear,
    Past,
    Future,
    Within,
    Before,
    After,
    Overlaps,
    Contains,
    ContainedBy,
    HasKey,
    HasAnyKey,
    HasAllKeys,
    DocContains,
}

use Operator::*;

const TEXT_OPERATORS: &[Operator] = &[
    Eq, NotEq, Matches, Start, End, Cont, NotCont, ICont, NotICont, In, NotIn, Present, Blank,
    Null, NotNull,
];

const NUMERIC_OPERATORS: &[Operator] = &[
    Eq, NotEq, Lt, Lteq, Gt, Gteq, Between, NotBetween, In, NotIn, Present, Null, NotNull,
];

const BOOLEAN_OPERATORS: &[Operator] = &[Eq, NotEq, True, False, Present, Null, NotNull];

const TEMPORAL_OPERATORS: &[Operator] = &[
    Eq, NotEq, Lt, Lteq, Gt, Gteq, Between, NotBetween, In, NotIn, Present, Null, NotNull, Today,
    Yesterday, ThisWeek, ThisMonth, ThisYear, Past, Future, Within, Before, After,
];

const ARRAY_OPERATORS: &[Operator] = &[
    Overlaps, Contains, ContainedBy, Present, Blank, Null, NotNull,
];

const DOCUMENT_OPERATORS: &[Operator] = &[
    HasKey, HasAnyKey, HasAllKeys, DocContains, Present, Null, NotNull,
];

/// Failure to interpret a predicate value for its field.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueMismatch {
    pub expected: String,
    pub actual: String,
}

impl ValueMismatch {
    fn new(expected: impl Into<String>, value: &Value) -> Self {
        Self {
            expected: expected.into(),
            actual: value.type_name().to_string(),
        }
    }
}

impl Operator {
    /// Operators applicable to a semantic type, in a fixed order.
    pub fn for_type(semantic_type: SemanticType) -> &'static [Operator] {
        match semantic_type {
            SemanticType::Text => TEXT_OPERATORS,
            SemanticType::Integer | SemanticType::Decimal => NUMERIC_OPERATORS,
            SemanticType::Boolean => BOOLEAN_OPERATORS,
            SemanticType::Temporal => TEMPORAL_OPERATORS,
            SemanticType::Array => ARRAY_OPERATORS,
            SemanticType::Document => DOCUMENT_OPERATORS,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Eq => "eq",
            NotEq => "not_eq",
            Matches => "matches",
            Start => "start",
            End => "end",
            Cont => "cont",
            NotCont => "not_cont",
            ICont => "i_cont",
            NotICont => "not_i_cont",
            In => "in",
            NotIn => "not_in",
            Present => "present",
            Blank => "blank",
            Null => "null",
            NotNull => "not_null",
            Lt => "lt",
            Lteq => "lteq",
            Gt => "gt",
            Gteq => "gteq",
            Between => "between",
            NotBetween => "not_between",
            True => "true",
            False => "false",
            Today => "today",
            Yesterday => "yesterday",
            ThisWeek => "this_week",
            ThisMonth => "this_month",
            ThisYear => "this_year",
            Past => "past",
            Future => "future",
            Within => "within",
            Before => "before",
            After => "after",
            Overlaps => "overlaps",
            Contains => "contains",
            ContainedBy => "contained_by",
            HasKey => "has_key",
            HasAnyKey => "has_any_key",
            HasAllKeys => "has_all_keys",
            DocContains => "doc_contains",
        }
    }

    /// Flag operators carry no meaningful value and are never skipped.
    /// A nil value applies them, `false` inverts them.
    pub fn is_flag(&self) -> bool {
        matches!(
            self,
            Present
                | Blank
                | Null
                | NotNull
                | True
                | False
                | Today
                | Yesterday
                | ThisWeek
                | ThisMonth
                | ThisYear
                | Past
                | Future
        )
    }

    /// Build the condition for `field` with the given value, resolving
    /// relative time windows against `now`.
    pub fn condition(
        &self,
        field: &str,
        semantic_type: SemanticType,
        value: &Value,
        now: DateTime<Utc>,
    ) -> Result<Condition, ValueMismatch> {
        if self.is_flag() {
            let enabled = flag_enabled(value)?;
            return Ok(self.flag_condition(field, semantic_type, enabled, now));
        }

        let f = field.to_string();
        let condition = match self {
            Eq | NotEq | Lt | Lteq | Gt | Gteq => Condition::Compare {
                field: f,
                op: self.comparison(),
                value: coerce(semantic_type, value)?,
            },
            Before => Condition::compare(field, Comparison::Lt, coerce(semantic_type, value)?),
            After => Condition::compare(field, Comparison::Gt, coerce(semantic_type, value)?),
            Matches => like(field, text(value)?, false, false),
            Start => like(field, format!("{}%", escape_like(&text(value)?)), false, false),
            End => like(field, format!("%{}", escape_like(&text(value)?)), false, false),
            Cont => like(field, contains_pattern(value)?, false, false),
            NotCont => like(field, contains_pattern(value)?, false, true),
            ICont => like(field, contains_pattern(value)?, true, false),
            NotICont => like(field, contains_pattern(value)?, true, true),
            In | NotIn => Condition::In {
                field: f,
                values: coerce_list(semantic_type, value)?,
                negated: *self == NotIn,
            },
            Between | NotBetween => {
                let bounds = value.to_list();
                let [low, high] = bounds.as_slice() else {
                    return Err(ValueMismatch::new("a two-element list", value));
                };
                Condition::Between {
                    field: f,
                    low: coerce(semantic_type, low)?,
                    high: coerce(semantic_type, high)?,
                    negated: *self == NotBetween,
                }
            }
            Within => {
                let since = parse_window(value)
                    .and_then(|window| now.checked_sub_signed(window))
                    .ok_or_else(|| ValueMismatch::new("a duration such as 3600 or \"7d\"", value))?;
                Condition::compare(field, Comparison::Gte, since)
            }
            Overlaps | Contains | ContainedBy => Condition::Array {
                field: f,
                op: match self {
                    Overlaps => ArrayMatch::Overlaps,
                    Contains => ArrayMatch::Contains,
                    _ => ArrayMatch::ContainedBy,
                },
                values: value.to_list(),
            },
            HasKey | HasAnyKey | HasAllKeys => {
                let keys = value
                    .to_list()
                    .iter()
                    .map(|k| k.as_text().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| ValueMismatch::new("key names", value))?;
                Condition::HasKeys {
                    field: f,
                    keys,
                    mode: if *self == HasAllKeys {
                        KeyMatch::All
                    } else {
                        KeyMatch::Any
                    },
                }
            }
            DocContains => Condition::DocContains {
                field: f,
                document: value
                    .as_map()
                    .cloned()
                    .ok_or_else(|| ValueMismatch::new("a document", value))?,
            },
            _ => unreachable!("flag operators handled above"),
        };
        Ok(condition)
    }

    fn comparison(&self) -> Comparison {
        match self {
            NotEq => Comparison::NotEq,
            Lt => Comparison::Lt,
            Lteq => Comparison::Lte,
            Gt => Comparison::Gt,
            Gteq => Comparison::Gte,
            _ => Comparison::Eq,
        }
    }

    fn flag_condition(
        &self,
        field: &str,
        semantic_type: SemanticType,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Condition {
        let f = field.to_string();
        let window = |start: DateTime<Utc>, end: DateTime<Utc>| {
            Condition::compare(field, Comparison::Gte, start)
                .and(Condition::compare(field, Comparison::Lt, end))
        };
        let today = start_of_day(now);

        let condition = match self {
            Present | Blank => {
                let present = (*self == Present) == enabled;
                match semantic_type {
                    SemanticType::Text | SemanticType::Array => Condition::Blank {
                        field: f,
                        negated: present,
                    },
                    _ => Condition::Null {
                        field: f,
                        negated: present,
                    },
                }
            }
            Null | NotNull => {
                return Condition::Null {
                    field: f,
                    negated: (*self == NotNull) == enabled,
                }
            }
            True => return Condition::eq(field, enabled),
            False => return Condition::eq(field, !enabled),
            Today => window(today, today + Duration::days(1)),
            Yesterday => window(today - Duration::days(1), today),
            ThisWeek => {
                let monday =
                    today - Duration::days(i64::from(now.weekday().num_days_from_monday()));
                window(monday, monday + Duration::days(7))
            }
            ThisMonth => {
                let (start, end) = month_bounds(now);
                window(start, end)
            }
            ThisYear => window(year_start(now.year()), year_start(now.year() + 1)),
            Past => Condition::compare(field, Comparison::Lt, now),
            Future => Condition::compare(field, Comparison::Gt, now),
            _ => unreachable!("only flag operators reach flag_condition"),
        };

        match self {
            Present | Blank => condition,
            _ if enabled => condition,
            _ => condition.negate(),
        }
    }
}

/// Metadata for one declared filterable field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub semantic_type: SemanticType,
    operators: &'static [Operator],
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            operators: Operator::for_type(semantic_type),
        }
    }

    pub fn operators(&self) -> &'static [Operator] {
        self.operators
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }

    /// `field_operator` keys for every supported operator.
    pub fn predicate_keys(&self) -> impl Iterator<Item = (String, Operator)> + '_ {
        self.operators
            .iter()
            .map(move |op| (format!("{}_{}", self.name, op.suffix()), *op))
    }
}

fn flag_enabled(value: &Value) -> Result<bool, ValueMismatch> {
    match value.presence() {
        Presence::Absent => Ok(true),
        Presence::False => Ok(false),
        Presence::Value(v) => v
            .as_bool()
            .ok_or_else(|| ValueMismatch::new("a boolean flag", v)),
    }
}

fn coerce(semantic_type: SemanticType, value: &Value) -> Result<Value, ValueMismatch> {
    let coerced = match semantic_type {
        SemanticType::Text => match value {
            Value::Text(_) => Some(value.clone()),
            Value::Int(_) | Value::Float(_) => Some(Value::Text(value.to_json().to_string())),
            _ => None,
        },
        SemanticType::Integer | SemanticType::Decimal => value.to_number(),
        SemanticType::Boolean => value.as_bool().map(Value::Bool),
        SemanticType::Temporal => value.as_time().map(Value::Time),
        SemanticType::Array | SemanticType::Document => Some(value.clone()),
    };
    coerced.ok_or_else(|| ValueMismatch::new(semantic_type.name(), value))
}

fn coerce_list(semantic_type: SemanticType, value: &Value) -> Result<Vec<Value>, ValueMismatch> {
    value
        .to_list()
        .iter()
        .map(|item| coerce(semantic_type, item))
        .collect()
}

fn text(value: &Value) -> Result<String, ValueMismatch> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Int(_) | Value::Float(_) => Ok(value.to_json().to_string()),
        other => Err(ValueMismatch::new("text", other)),
    }
}

fn contains_pattern(value: &Value) -> Result<String, ValueMismatch> {
    Ok(format!("%{}%", escape_like(&text(value)?)))
}

fn like(field: &str, pattern: String, case_insensitive: bool, negated: bool) -> Condition {
    Condition::Like {
        field: field.to_string(),
        pattern,
        case_insensitive,
        negated,
    }
}

/// Seconds as an integer, or `<n>` followed by one of `s m h d w`.
pub fn parse_window(value: &Value) -> Option<Duration> {
    match value {
        Value::Int(secs) if *secs >= 0 => Duration::try_seconds(*secs),
        Value::Text(s) => {
            let s = s.trim();
            let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
            let (digits, unit) = s.split_at(split);
            let amount: i64 = digits.parse().ok()?;
            match unit.trim() {
                "" | "s" => Duration::try_seconds(amount),
                "m" => Duration::try_minutes(amount),
                "h" => Duration::try_hours(amount),
                "d" => Duration::try_days(amount),
                "w" => Duration::try_weeks(amount),
                _ => None,
            }
        }
        _ => None,
    }
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&t.date_naive().and_time(chrono::NaiveTime::MIN))
}

fn year_start(year: i32) -> DateTime<Utc> {
    date_start(year, 1)
}

fn date_start(year: i32, month: u32) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date_start(now.year(), now.month());
    let end = if now.month() == 12 {
        date_start(now.year() + 1, 1)
    } else {
        date_start(now.year(), now.month() + 1)
    };
    (start, end)
}
