//! Query assembly: validated predicates, ordering and pagination in one pass.

use crate::search::predicate::PredicateCompiler;
use crate::search::request::{Pagination, SearchInput, SearchOptions, SearchRequest};
use crate::search::searchable::Searchable;
use crate::search::SearchError;
use crate::store::{Condition, Query};
use chrono::{DateTime, Utc};
use tracing::debug;

impl Searchable {
    /// Assemble a query from caller predicates and options.
    ///
    /// # Errors
    ///
    /// Fails without building anything when the parameters are unpermitted,
    /// the request is too complex, a security policy is unmet, or any
    /// predicate, order key or pagination value is invalid.
    pub fn search(
        &self,
        input: impl Into<SearchInput>,
        options: &SearchOptions,
    ) -> Result<Query, SearchError> {
        self.search_at(input, options, Utc::now())
    }

    /// Like [`Searchable::search`], resolving relative time windows against `now`.
    pub fn search_at(
        &self,
        input: impl Into<SearchInput>,
        options: &SearchOptions,
        now: DateTime<Utc>,
    ) -> Result<Query, SearchError> {
        let predicates = input.into().into_predicates()?;
        let request = SearchRequest::parse(predicates)?;
        self.check_complexity(&request)?;

        if let Some(name) = &options.security {
            let policy = self
                .policies
                .get(name)
                .ok_or_else(|| SearchError::UnknownSecurity {
                    policy: name.clone(),
                    available: self.policies.keys().cloned().collect(),
                })?;
            policy.check(&request.predicates)?;
        }

        let compiler = PredicateCompiler::new(&self.registry, now);
        let mut query = Query::new(self.table());

        if let Some(condition) = compiler.compile_all(&request.predicates)? {
            query = query.and_where(condition);
        }

        let mut groups = Vec::new();
        for group in &request.or_groups {
            if let Some(condition) = compiler.compile_all(group)? {
                groups.push(condition);
            }
        }
        if let Some(disjunction) = Condition::any(groups) {
            query = query.and_where(disjunction);
        }

        query = self.apply_orders(query, options.orders.as_deref())?;
        if let Some(pagination) = options.pagination {
            query = self.apply_pagination(query, pagination)?;
        }
        query = query
            .includes(options.includes.iter().cloned())
            .preload(options.preload.iter().cloned());

        debug!(
            table = self.table(),
            predicates = request.predicate_count(),
            or_groups = request.or_groups.len(),
            limit = ?query.limit_value(),
            offset = ?query.offset_value(),
            query = %query,
            "assembled search query"
        );
        Ok(query)
    }

    fn check_complexity(&self, request: &SearchRequest) -> Result<(), SearchError> {
        let count = request.predicate_count();
        if count > self.config.max_predicates {
            return Err(SearchError::TooManyPredicates {
                count,
                max: self.config.max_predicates,
            });
        }
        let groups = request.or_groups.len();
        if groups > self.config.max_or_conditions {
            return Err(SearchError::TooManyOrConditions {
                count: groups,
                max: self.config.max_or_conditions,
            });
        }
        Ok(())
    }

    /// Explicit orders replace the default order entirely.
    fn apply_orders(&self, mut query: Query, explicit: Option<&[String]>) -> Result<Query, SearchError> {
        let keys = match explicit {
            Some(keys) if !keys.is_empty() => keys,
            _ => self.default_order.as_slice(),
        };
        for key in keys {
            let order = self
                .registry
                .sort_order(key)
                .ok_or_else(|| SearchError::InvalidOrder {
                    key: key.clone(),
                    available: self.registry.sort_keys(),
                })?;
            query = query.order_by(order.clone());
        }
        Ok(query)
    }

    fn apply_pagination(&self, mut query: Query, pagination: Pagination) -> Result<Query, SearchError> {
        let max_page = self.config.max_page;
        let page = match pagination.page {
            Some(page) if page < 1 || page as u64 > max_page => {
                return Err(SearchError::InvalidPage {
                    value: page,
                    max: max_page,
                })
            }
            Some(page) => Some(page as u64),
            None => None,
        };

        let Some(per_page) = pagination.per_page else {
            return Ok(query);
        };
        if per_page < 1 {
            return Err(SearchError::InvalidPerPage { value: per_page });
        }
        let limit = match self.config.max_per_page {
            Some(max) => (per_page as u64).min(max),
            None => per_page as u64,
        };
        query = query.limit(limit);

        let offset = page.map_or(0, |page| (page - 1).saturating_mul(limit));
        if offset > 0 {
            query = query.offset(offset);
        }
        Ok(query)
    }
}
