mod highlight;
mod link;
mod query;
mod tag;

pub use highlight::{Highlight, NewHighlight};
pub use link::{read_time_from_text, ContentUpdate, Link, LinkListItem, NewLink};
pub use query::{LinkQuery, Page, ReadState, SearchClause, SortOrder, DEFAULT_PAGE_SIZE};
pub use tag::{slugify, Tag, TagWithCount, TAG_NAME_MAX, TAG_NAME_MIN};
