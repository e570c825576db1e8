//! Paging arithmetic and filter construction for user listings.

use crate::{
    model::CTIME_FIELD,
    store::{Filter, FindOptions, ID_FIELD, SortOrder},
};

/// Page size used when a request does not supply a positive one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Field matched by the free-text filter when none is configured.
pub const DEFAULT_TEXT_FIELD: &str = "name";

/// Position of one page inside a full result set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageDescriptor {
    pub page: u64,
    pub page_size: u64,
    pub total_count: u64,
    pub page_count: u64,
}

impl PageDescriptor {
    pub fn new(page: u64, page_size: u64, total_count: u64) -> Self {
        Self {
            page,
            page_size,
            total_count,
            page_count: total_count.div_ceil(page_size.max(1)),
        }
    }
}

/// What the directory has to run to answer one listing request.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    pub filter: Filter,
    pub options: FindOptions,
    /// Set when paging: the page number and size to describe once the total
    /// count is known.
    pub paging: Option<(u64, u64)>,
}

impl QueryPlan {
    pub fn needs_count(&self) -> bool {
        self.paging.is_some()
    }

    pub fn describe(&self, total_count: u64) -> Option<PageDescriptor> {
        self.paging
            .map(|(page, page_size)| PageDescriptor::new(page, page_size, total_count))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlanner {
    default_page_size: u64,
    text_field: String,
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_TEXT_FIELD)
    }
}

impl QueryPlanner {
    pub fn new(default_page_size: u64, text_field: impl Into<String>) -> Self {
        Self {
            default_page_size: default_page_size.max(1),
            text_field: text_field.into(),
        }
    }

    pub fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    pub fn text_field(&self) -> &str {
        &self.text_field
    }

    /// Plans a listing.
    ///
    /// - `page_size <= 0` uses the default size.
    /// - `page > 0` skips `page_size * (page - 1)` records and asks for a
    ///   total count.
    /// - `page <= 0` returns the first `page_size` records with no count.
    ///
    /// Results are always newest first.
    ///
    /// ```
    /// use usernode::QueryPlanner;
    ///
    /// let plan = QueryPlanner::default().plan(3, 10, "");
    /// assert_eq!(plan.options.skip, Some(20));
    /// assert_eq!(plan.options.limit, Some(10));
    /// assert!(plan.needs_count());
    /// ```
    pub fn plan(&self, page: i64, page_size: i64, text: &str) -> QueryPlan {
        let page_size = u64::try_from(page_size)
            .ok()
            .filter(|&size| size > 0)
            .unwrap_or(self.default_page_size);

        let filter = if text.is_empty() {
            Filter::new()
        } else {
            Filter::new().matches(self.text_field.as_str(), text)
        };

        let paging = u64::try_from(page)
            .ok()
            .filter(|&page| page > 0)
            .map(|page| (page, page_size));
        let skip = paging.map(|(page, size)| size.saturating_mul(page - 1));

        QueryPlan {
            filter,
            options: FindOptions {
                sort: vec![
                    (CTIME_FIELD.to_string(), SortOrder::Descending),
                    (ID_FIELD.to_string(), SortOrder::Descending),
                ],
                skip,
                limit: Some(page_size),
            },
            paging,
        }
    }
}
