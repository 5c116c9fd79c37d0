use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Reading speed used for the read-time estimate.
const WORDS_PER_MINUTE: f64 = 285.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub user_id: i64,
    pub original_url: String,
    pub cleaned_url: String,
    pub hostname: String,
    pub title: String,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub article_html: Option<String>,
    pub raw_text_content: Option<String>,
    pub header_image_url: Option<String>,
    pub summary: Option<String>,
    pub summary_model: Option<String>,
    pub article_date: Option<DateTime<Utc>>,
    pub read_time_seconds: Option<i64>,
    pub read_time_display: Option<String>,
    pub saved_at: DateTime<Utc>,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

impl Link {
    pub fn is_unread(&self) -> bool {
        self.last_viewed_at.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub original_url: String,
    pub cleaned_url: String,
    pub hostname: String,
    pub title: String,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub article_html: Option<String>,
    pub raw_text_content: Option<String>,
    pub header_image_url: Option<String>,
    pub article_date: Option<DateTime<Utc>>,
    pub read_time_seconds: Option<i64>,
    pub read_time_display: Option<String>,
}

// Replacement content from a re-fetch/re-parse or a manual edit.
#[derive(Debug, Clone)]
pub struct ContentUpdate {
    pub title: String,
    pub author: Option<String>,
    pub excerpt: Option<String>,
    pub article_html: Option<String>,
    pub raw_text_content: Option<String>,
    pub header_image_url: Option<String>,
    pub article_date: Option<DateTime<Utc>>,
    pub read_time_seconds: Option<i64>,
    pub read_time_display: Option<String>,
}

// One row of a list view: enough to render an entry plus an archive
// existence flag, with no article bodies attached.
#[derive(Debug, Clone, Serialize)]
pub struct LinkListItem {
    pub id: i64,
    pub title: String,
    pub hostname: String,
    pub cleaned_url: String,
    pub saved_at: DateTime<Utc>,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub read_time_display: Option<String>,
    pub has_archive: bool,
}

/// Estimate reading time for a body of text: (seconds, display string).
pub fn read_time_from_text(text: &str) -> (i64, String) {
    let word_count = text.split_whitespace().count();
    let minutes = word_count as f64 / WORDS_PER_MINUTE;
    let seconds = (minutes * 60.0).round() as i64;
    let display = format!("{} min", minutes.round() as i64);
    (seconds, display)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_time_for_one_minute_of_text() {
        let text = vec!["word"; 285].join(" ");
        let (seconds, display) = read_time_from_text(&text);
        assert_eq!(seconds, 60);
        assert_eq!(display, "1 min");
    }

    #[test]
    fn read_time_for_empty_text() {
        let (seconds, display) = read_time_from_text("");
        assert_eq!(seconds, 0);
        assert_eq!(display, "0 min");
    }
}
