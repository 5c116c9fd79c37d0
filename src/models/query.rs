use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 25;

// One conjunctive filter on the link list. Clauses are ANDed together.
#[derive(Debug, Clone)]
pub enum SearchClause {
    Hostname(String),
    TitleContains(String),
    SavedAfter(DateTime<Utc>),
    SavedBefore(DateTime<Utc>),
    ReadState(ReadState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Unread,
    Viewed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
    Title,
}

// A filtered, paginated view over one user's links. Owner scoping is not
// optional: every query carries it.
#[derive(Debug, Clone)]
pub struct LinkQuery {
    pub owner_id: i64,
    pub tag_id: Option<i64>,
    pub clauses: Vec<SearchClause>,
    pub order: SortOrder,
    pub page: i64,
    pub page_size: i64,
}

impl LinkQuery {
    pub fn for_owner(owner_id: i64) -> Self {
        Self {
            owner_id,
            tag_id: None,
            clauses: Vec::new(),
            order: SortOrder::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page_count: u64,
    pub page: u64,
    pub page_size: u64,
}
