use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Highlight {
    pub id: i64,
    pub user_id: i64,
    pub link_id: i64,
    pub start_index: i64,
    pub end_index: i64,
    pub highlighted_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHighlight {
    pub start_index: i64,
    pub end_index: i64,
    pub highlighted_text: String,
}
