//! Bounded queries over a collection
//!
//! Every query carries a limit; results follow key order.

use std::fmt;

/// Hard ceiling on a single query's result set
pub const MAX_QUERY_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

/// Filtered, ordered, limited scan
pub struct Query<'a, R> {
    pub(crate) filter: Option<Box<dyn Fn(&R) -> bool + 'a>>,
    pub(crate) limit: usize,
    pub(crate) order: Order,
    /// Resume strictly after this key (in iteration order)
    pub(crate) after: Option<String>,
}

impl<'a, R> Query<'a, R> {
    pub fn new(limit: usize) -> Self {
        Self {
            filter: None,
            limit: limit.min(MAX_QUERY_LIMIT),
            order: Order::Ascending,
            after: None,
        }
    }

    pub fn filter(mut self, predicate: impl Fn(&R) -> bool + 'a) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn after(mut self, key: impl Into<String>) -> Self {
        self.after = Some(key.into());
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub(crate) fn matches(&self, record: &R) -> bool {
        self.filter.as_ref().is_none_or(|f| f(record))
    }
}

impl<R> fmt::Debug for Query<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("filtered", &self.filter.is_some())
            .field("limit", &self.limit)
            .field("order", &self.order)
            .field("after", &self.after)
            .finish()
    }
}
