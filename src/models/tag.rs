use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TAG_NAME_MIN: usize = 2;
pub const TAG_NAME_MAX: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagWithCount {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub link_count: i64,
}

/// Derive the URL-safe slug for a tag name: lowercased, with runs of
/// anything outside `[a-z0-9_-]` collapsed to a single dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_dash = false;
    for c in name.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            slug.push(c);
            last_was_dash = false;
        } else if !last_was_dash && !slug.is_empty() {
            slug.push('-');
            last_was_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
