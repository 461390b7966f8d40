//! The composed, chainable query handle.

use crate::store::{Condition, Record};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullsOrder {
    First,
    Last,
}

/// One sort directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
    pub case_insensitive: bool,
    /// Explicit null placement; `None` puts nulls last ascending, first descending.
    pub nulls: Option<NullsOrder>,
}

impl Order {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
            case_insensitive: false,
            nulls: None,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            direction: Direction::Desc,
            ..Self::asc(field)
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    /// Compare two records by this directive.
    pub fn compare(&self, a: &dyn Record, b: &dyn Record) -> Ordering {
        let (left, right) = (self.key(a), self.key(b));
        let nulls = self.nulls.unwrap_or(match self.direction {
            Direction::Asc => NullsOrder::Last,
            Direction::Desc => NullsOrder::First,
        });
        match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match nulls {
                NullsOrder::First => Ordering::Less,
                NullsOrder::Last => Ordering::Greater,
            },
            (false, true) => match nulls {
                NullsOrder::First => Ordering::Greater,
                NullsOrder::Last => Ordering::Less,
            },
            (false, false) => {
                let ordering = left.compare(&right).unwrap_or(Ordering::Equal);
                match self.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            }
        }
    }

    fn key(&self, record: &dyn Record) -> Value {
        match record.field(&self.field) {
            Value::Text(s) if self.case_insensitive => Value::Text(s.to_lowercase()),
            other => other,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.case_insensitive {
            write!(f, "LOWER({})", self.field)?;
        } else {
            write!(f, "{}", self.field)?;
        }
        match self.direction {
            Direction::Asc => write!(f, " ASC")?,
            Direction::Desc => write!(f, " DESC")?,
        }
        match self.nulls {
            Some(NullsOrder::First) => write!(f, " NULLS FIRST"),
            Some(NullsOrder::Last) => write!(f, " NULLS LAST"),
            None => Ok(()),
        }
    }
}

/// A lazily materialized query against one table.
///
/// Every builder method consumes the handle and returns an extended one:
/// conditions, orders and eager-load directives can only be added, never
/// rewritten. Clone a handle to branch it.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    table: String,
    conditions: Vec<Condition>,
    orders: Vec<Order>,
    limit: Option<u64>,
    offset: Option<u64>,
    includes: Vec<String>,
    preload: Vec<String>,
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            includes: Vec::new(),
            preload: Vec::new(),
        }
    }

    pub fn and_where(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// OR a condition with everything filtered so far.
    pub fn or_where(mut self, condition: Condition) -> Self {
        self.conditions = match Condition::all(std::mem::take(&mut self.conditions)) {
            Some(existing) => vec![existing.or(condition)],
            None => vec![condition],
        };
        self
    }

    pub fn order_by(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn includes<I, T>(mut self, associations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.includes.extend(associations.into_iter().map(Into::into));
        self
    }

    pub fn preload<I, T>(mut self, associations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.preload.extend(associations.into_iter().map(Into::into));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// All conditions folded into one conjunction.
    pub fn condition(&self) -> Option<Condition> {
        Condition::all(self.conditions.clone())
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    pub fn includes_values(&self) -> &[String] {
        &self.includes
    }

    pub fn preload_values(&self) -> &[String] {
        &self.preload
    }

    pub fn matches(&self, record: &dyn Record) -> bool {
        self.conditions.iter().all(|c| c.evaluate(record))
    }

    /// Compare two records by the query's orders, in sequence.
    pub fn compare(&self, a: &dyn Record, b: &dyn Record) -> Ordering {
        self.orders
            .iter()
            .map(|order| order.compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {}", self.table)?;
        if let Some(condition) = self.condition() {
            write!(f, " WHERE {condition}")?;
        }
        if !self.orders.is_empty() {
            let orders: Vec<String> = self.orders.iter().map(ToString::to_string).collect();
            write!(f, " ORDER BY {}", orders.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn row(title: Option<&str>, views: i64) -> BTreeMap<String, Value> {
        let mut r = BTreeMap::new();
        r.insert("title".to_string(), Value::from(title));
        r.insert("views".to_string(), Value::Int(views));
        r
    }

    #[test]
    fn chaining_is_additive() {
        let base = Query::new("articles").and_where(Condition::eq("views", 1));
        let narrowed = base.clone().and_where(Condition::eq("title", "a"));

        assert_eq!(base.conditions().len(), 1);
        assert_eq!(narrowed.conditions().len(), 2);
    }

    #[test]
    fn or_where_widens_the_existing_filter() {
        let query = Query::new("articles")
            .and_where(Condition::eq("views", 1))
            .or_where(Condition::eq("views", 2));

        assert!(query.matches(&row(None, 2)));
        assert!(query.matches(&row(None, 1)));
        assert!(!query.matches(&row(None, 3)));
        assert_eq!(query.conditions().len(), 1);
    }

    #[test]
    fn nulls_sort_last_ascending_by_default() {
        let a = row(None, 1);
        let b = row(Some("b"), 2);
        let order = Order::asc("title");
        assert_eq!(order.compare(&a, &b), Ordering::Greater);
        assert_eq!(order.clone().nulls(NullsOrder::First).compare(&a, &b), Ordering::Less);
        assert_eq!(Order::desc("title").compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn later_orders_break_ties() {
        let query = Query::new("articles")
            .order_by(Order::asc("title"))
            .order_by(Order::desc("views"));
        let a = row(Some("same"), 1);
        let b = row(Some("same"), 5);
        assert_eq!(query.compare(&a, &b), Ordering::Greater);
    }

    #[test]
    fn display_renders_full_statement() {
        let query = Query::new("articles")
            .and_where(Condition::eq("views", 3))
            .order_by(Order::asc("title").case_insensitive())
            .limit(10)
            .offset(20);
        assert_eq!(
            query.to_string(),
            "SELECT * FROM articles WHERE views = 3 ORDER BY LOWER(title) ASC LIMIT 10 OFFSET 20"
        );
    }
}
