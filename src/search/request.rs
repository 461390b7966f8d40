//! Search input: predicate maps, permitted parameters and call options.

use crate::search::SearchError;
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Predicate keys (`field_operator`) mapped to caller values.
pub type PredicateMap = BTreeMap<String, Value>;

/// Key holding OR groups inside a predicate map.
pub const OR_KEY: &str = "or";

const OPTION_KEYS: &[&str] = &["pagination", "orders", "security", "includes", "preload"];

/// Externally supplied parameters (e.g. decoded from a request body).
///
/// They are untrusted until the caller marks them permitted; searching
/// with unpermitted parameters fails.
#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    values: PredicateMap,
    permitted: bool,
}

impl Params {
    pub fn new(values: PredicateMap) -> Self {
        Self {
            values,
            permitted: false,
        }
    }

    /// Wrap a JSON object. Anything else is a configuration error.
    pub fn from_json(json: JsonValue) -> Result<Self, SearchError> {
        match Value::from(json) {
            Value::Map(values) => Ok(Self::new(values)),
            other => Err(SearchError::InvalidValue {
                key: "params".to_string(),
                expected: "an object".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Mark the parameters safe to search with.
    pub fn permit(mut self) -> Self {
        self.permitted = true;
        self
    }

    pub fn is_permitted(&self) -> bool {
        self.permitted
    }
}

/// Predicates handed to a search, either a plain map or wrapped parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchInput {
    Plain(PredicateMap),
    Params(Params),
}

impl SearchInput {
    pub(crate) fn into_predicates(self) -> Result<PredicateMap, SearchError> {
        match self {
            SearchInput::Plain(map) => Ok(map),
            SearchInput::Params(params) if params.permitted => Ok(params.values),
            SearchInput::Params(params) => Err(SearchError::UnpermittedParameters {
                keys: params.values.keys().cloned().collect(),
            }),
        }
    }
}

impl From<PredicateMap> for SearchInput {
    fn from(map: PredicateMap) -> Self {
        SearchInput::Plain(map)
    }
}

impl From<Params> for SearchInput {
    fn from(params: Params) -> Self {
        SearchInput::Params(params)
    }
}

/// Page number and size. Signed so out-of-range caller input can be reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    pub fn page(page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: None,
        }
    }
}

/// Options accompanying a search call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchOptions {
    pub pagination: Option<Pagination>,
    /// Sort keys in priority order; later keys break ties.
    pub orders: Option<Vec<String>>,
    pub security: Option<String>,
    pub includes: Vec<String>,
    pub preload: Vec<String>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paginate(mut self, page: i64, per_page: i64) -> Self {
        self.pagination = Some(Pagination::new(page, per_page));
        self
    }

    pub fn pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn orders<I, T>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.orders = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn security(mut self, policy: impl Into<String>) -> Self {
        self.security = Some(policy.into());
        self
    }

    pub fn includes<I, T>(mut self, associations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.includes = associations.into_iter().map(Into::into).collect();
        self
    }

    pub fn preload<I, T>(mut self, associations: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.preload = associations.into_iter().map(Into::into).collect();
        self
    }

    /// Parse options from a JSON object, rejecting unknown keys up front.
    pub fn from_json(json: &JsonValue) -> Result<Self, SearchError> {
        let Some(object) = json.as_object() else {
            return Err(SearchError::InvalidValue {
                key: "options".to_string(),
                expected: "an object".to_string(),
                actual: Value::from(json.clone()).type_name().to_string(),
            });
        };

        let unknown: Vec<String> = object
            .keys()
            .filter(|k| !OPTION_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            let hint = unknown_option_hint(&unknown);
            return Err(SearchError::UnknownOptions { unknown, hint });
        }

        let mut options = SearchOptions::new();
        if let Some(pagination) = object.get("pagination") {
            options.pagination = Some(parse_pagination(pagination)?);
        }
        if let Some(orders) = object.get("orders") {
            options.orders = Some(string_list("orders", orders)?);
        }
        if let Some(security) = object.get("security") {
            match security {
                JsonValue::String(s) => options.security = Some(s.clone()),
                JsonValue::Null => {}
                other => return Err(type_mismatch("security", "a policy name", other)),
            }
        }
        if let Some(includes) = object.get("includes") {
            options.includes = string_list("includes", includes)?;
        }
        if let Some(preload) = object.get("preload") {
            options.preload = string_list("preload", preload)?;
        }
        Ok(options)
    }
}

fn suggestion(key: &str) -> Option<&'static str> {
    match key {
        "order" | "order_by" | "sort" | "sorts" => Some("orders"),
        "page" | "per_page" | "paginate" | "limit" | "offset" => Some("pagination"),
        "include" | "eager_load" | "joins" => Some("includes"),
        "preloads" => Some("preload"),
        "policy" | "security_policy" | "secure" => Some("security"),
        _ => None,
    }
}

fn unknown_option_hint(unknown: &[String]) -> String {
    let suggestions: Vec<String> = unknown
        .iter()
        .filter_map(|k| suggestion(k).map(|s| format!("use '{s}' instead of '{k}'")))
        .collect();
    if suggestions.is_empty() {
        format!("Valid options are: {}", OPTION_KEYS.join(", "))
    } else {
        format!(
            "Did you mean to {}? Valid options are: {}",
            suggestions.join(", "),
            OPTION_KEYS.join(", ")
        )
    }
}

fn type_mismatch(key: &str, expected: &str, actual: &JsonValue) -> SearchError {
    SearchError::InvalidValue {
        key: key.to_string(),
        expected: expected.to_string(),
        actual: Value::from(actual.clone()).type_name().to_string(),
    }
}

fn string_list(key: &str, json: &JsonValue) -> Result<Vec<String>, SearchError> {
    match json {
        JsonValue::String(s) => Ok(vec![s.clone()]),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_mismatch(key, "a list of names", item))
            })
            .collect(),
        JsonValue::Null => Ok(Vec::new()),
        other => Err(type_mismatch(key, "a list of names", other)),
    }
}

fn parse_pagination(json: &JsonValue) -> Result<Pagination, SearchError> {
    let Some(object) = json.as_object() else {
        return Err(type_mismatch("pagination", "an object", json));
    };
    let unknown: Vec<String> = object
        .keys()
        .filter(|k| !matches!(k.as_str(), "page" | "per_page"))
        .map(|k| format!("pagination.{k}"))
        .collect();
    if !unknown.is_empty() {
        return Err(SearchError::UnknownOptions {
            unknown,
            hint: "Pagination accepts 'page' and 'per_page'".to_string(),
        });
    }

    let number = |key: &str| -> Result<Option<i64>, SearchError> {
        match object.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => Value::from(value.clone())
                .to_number()
                .and_then(|n| match n {
                    Value::Int(i) => Some(i),
                    _ => None,
                })
                .map(Some)
                .ok_or_else(|| type_mismatch(key, "an integer", value)),
        }
    };
    Ok(Pagination {
        page: number("page")?,
        per_page: number("per_page")?,
    })
}

/// A predicate map split into top-level predicates and OR groups.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchRequest {
    pub predicates: PredicateMap,
    pub or_groups: Vec<PredicateMap>,
}

impl SearchRequest {
    pub fn parse(mut predicates: PredicateMap) -> Result<Self, SearchError> {
        let or_groups = match predicates.remove(OR_KEY) {
            None => Vec::new(),
            Some(value) if value.is_blank() => Vec::new(),
            Some(Value::List(groups)) => groups
                .into_iter()
                .map(|group| match group {
                    Value::Map(map) => Ok(map),
                    other => Err(SearchError::InvalidValue {
                        key: OR_KEY.to_string(),
                        expected: "a list of predicate maps".to_string(),
                        actual: other.type_name().to_string(),
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(SearchError::InvalidValue {
                    key: OR_KEY.to_string(),
                    expected: "a list of predicate maps".to_string(),
                    actual: other.type_name().to_string(),
                })
            }
        };
        Ok(Self {
            predicates,
            or_groups,
        })
    }

    /// Top-level predicates plus the predicates inside every OR group.
    pub fn predicate_count(&self) -> usize {
        self.predicates.len() + self.or_groups.iter().map(BTreeMap::len).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_options_suggest_the_intended_name() {
        let err = SearchOptions::from_json(&json!({"order": ["title_asc"]})).unwrap_err();
        match err {
            SearchError::UnknownOptions { unknown, hint } => {
                assert_eq!(unknown, vec!["order".to_string()]);
                assert!(hint.contains("use 'orders' instead of 'order'"));
            }
            other => panic!("expected UnknownOptions, got {other:?}"),
        }
    }

    #[test]
    fn options_parse_from_json() {
        let options = SearchOptions::from_json(&json!({
            "pagination": {"page": 2, "per_page": "25"},
            "orders": "title_asc",
            "security": "status_required",
            "includes": ["author"]
        }))
        .unwrap();

        assert_eq!(options.pagination, Some(Pagination::new(2, 25)));
        assert_eq!(options.orders, Some(vec!["title_asc".to_string()]));
        assert_eq!(options.security.as_deref(), Some("status_required"));
        assert_eq!(options.includes, vec!["author".to_string()]);
    }

    #[test]
    fn unknown_pagination_keys_are_rejected() {
        let err = SearchOptions::from_json(&json!({"pagination": {"size": 5}})).unwrap_err();
        assert!(matches!(err, SearchError::UnknownOptions { .. }));
    }

    #[test]
    fn params_must_be_permitted() {
        let params = Params::from_json(json!({"title_cont": "Ruby"})).unwrap();
        let err = SearchInput::from(params.clone())
            .into_predicates()
            .unwrap_err();
        assert_eq!(
            err,
            SearchError::UnpermittedParameters {
                keys: vec!["title_cont".to_string()]
            }
        );

        let permitted = SearchInput::from(params.permit()).into_predicates().unwrap();
        assert_eq!(permitted["title_cont"], Value::from("Ruby"));
    }

    #[test]
    fn or_groups_are_split_and_counted() {
        let predicates = match Value::from(json!({
            "status_eq": "published",
            "or": [{"title_cont": "Ruby"}, {"title_cont": "Python", "views_gt": 10}]
        })) {
            Value::Map(map) => map,
            _ => unreachable!(),
        };

        let request = SearchRequest::parse(predicates).unwrap();
        assert_eq!(request.predicates.len(), 1);
        assert_eq!(request.or_groups.len(), 2);
        assert_eq!(request.predicate_count(), 4);
    }

    #[test]
    fn malformed_or_groups_are_rejected() {
        let mut predicates = PredicateMap::new();
        predicates.insert(OR_KEY.to_string(), Value::from("title_cont"));
        assert!(matches!(
            SearchRequest::parse(predicates),
            Err(SearchError::InvalidValue { .. })
        ));
    }
}
