//! Limits applied to every search.

use crate::search::SearchError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_PREDICATES: usize = 100;
pub const DEFAULT_MAX_OR_CONDITIONS: usize = 50;
pub const DEFAULT_MAX_PAGE: u64 = 10_000;
pub const DEFAULT_MAX_PER_PAGE: u64 = 100;

/// Complexity and pagination bounds for a searchable record type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Predicates across the top level and every OR group.
    pub max_predicates: usize,
    pub max_or_conditions: usize,
    pub max_page: u64,
    /// `None` leaves `per_page` unclamped.
    pub max_per_page: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_predicates: DEFAULT_MAX_PREDICATES,
            max_or_conditions: DEFAULT_MAX_OR_CONDITIONS,
            max_page: DEFAULT_MAX_PAGE,
            max_per_page: Some(DEFAULT_MAX_PER_PAGE),
        }
    }
}

impl SearchConfig {
    /// Load from JSON; missing keys take their defaults, unknown keys are rejected.
    pub fn from_json_str(json: &str) -> Result<Self, SearchError> {
        let config: SearchConfig = serde_json::from_str(json)
            .map_err(|e| SearchError::configuration(format!("invalid search config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_predicates == 0 {
            return Err(SearchError::configuration("max_predicates must be positive"));
        }
        if self.max_or_conditions == 0 {
            return Err(SearchError::configuration("max_or_conditions must be positive"));
        }
        if self.max_page == 0 {
            return Err(SearchError::configuration("max_page must be positive"));
        }
        if self.max_per_page == Some(0) {
            return Err(SearchError::configuration("max_per_page must be positive"));
        }
        Ok(())
    }
}
