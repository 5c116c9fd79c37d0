use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    slugify, ContentUpdate, Highlight, Link, LinkListItem, LinkQuery, NewHighlight, NewLink, Page,
    Tag, TagWithCount, TAG_NAME_MAX, TAG_NAME_MIN,
};

use super::query::compose_list_query;
use super::schema::SCHEMA;

type CallResult<T> = std::result::Result<T, tokio_rusqlite::Error>;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // User operations

    pub async fn ensure_user(&self, username: &str) -> Result<i64> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(AppError::InvalidParameter(
                "username must not be empty".to_string(),
            ));
        }

        let id = self
            .conn
            .call(move |conn| {
                // The unique constraint closes the create/create race;
                // a losing writer falls through to the lookup.
                conn.execute(
                    "INSERT INTO users (username, created_at) VALUES (?1, ?2)
                     ON CONFLICT(username) DO NOTHING",
                    params![username, Utc::now().to_rfc3339()],
                )?;
                let id = conn.query_row(
                    "SELECT id FROM users WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    // Link operations

    pub async fn insert_link(&self, owner_id: i64, link: NewLink) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO links (user_id, original_url, cleaned_url, hostname, title,
                                          author, excerpt, article_html, raw_text_content,
                                          header_image_url, article_date, read_time_seconds,
                                          read_time_display, saved_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
                    params![
                        owner_id,
                        link.original_url,
                        link.cleaned_url,
                        link.hostname,
                        link.title,
                        link.author,
                        link.excerpt,
                        link.article_html,
                        link.raw_text_content,
                        link.header_image_url,
                        link.article_date.map(|dt| dt.to_rfc3339()),
                        link.read_time_seconds,
                        link.read_time_display,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                fetch_link(conn, owner_id, id)
            })
            .await?;
        Ok(link)
    }

    pub async fn get_link(&self, owner_id: i64, link_id: i64) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| fetch_link(conn, owner_id, link_id))
            .await?;
        Ok(link)
    }

    pub async fn mark_viewed(&self, owner_id: i64, link_id: i64) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    "UPDATE links SET last_viewed_at = ?1 WHERE id = ?2 AND user_id = ?3",
                    params![Utc::now().to_rfc3339(), link_id, owner_id],
                )?;
                if rows == 0 {
                    return Err(AppError::LinkNotFound { id: link_id }.into());
                }
                fetch_link(conn, owner_id, link_id)
            })
            .await?;
        Ok(link)
    }

    pub async fn update_content(
        &self,
        owner_id: i64,
        link_id: i64,
        update: ContentUpdate,
    ) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    r#"UPDATE links SET title = ?1, author = ?2, excerpt = ?3, article_html = ?4,
                                        raw_text_content = ?5, header_image_url = ?6,
                                        article_date = ?7, read_time_seconds = ?8,
                                        read_time_display = ?9
                       WHERE id = ?10 AND user_id = ?11"#,
                    params![
                        update.title,
                        update.author,
                        update.excerpt,
                        update.article_html,
                        update.raw_text_content,
                        update.header_image_url,
                        update.article_date.map(|dt| dt.to_rfc3339()),
                        update.read_time_seconds,
                        update.read_time_display,
                        link_id,
                        owner_id,
                    ],
                )?;
                if rows == 0 {
                    return Err(AppError::LinkNotFound { id: link_id }.into());
                }
                fetch_link(conn, owner_id, link_id)
            })
            .await?;
        Ok(link)
    }

    pub async fn set_summary(
        &self,
        owner_id: i64,
        link_id: i64,
        summary: String,
        model: String,
    ) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    "UPDATE links SET summary = ?1, summary_model = ?2 WHERE id = ?3 AND user_id = ?4",
                    params![summary, model, link_id, owner_id],
                )?;
                if rows == 0 {
                    return Err(AppError::LinkNotFound { id: link_id }.into());
                }
                fetch_link(conn, owner_id, link_id)
            })
            .await?;
        Ok(link)
    }

    pub async fn delete_link(&self, owner_id: i64, link_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_link_owned(&tx, owner_id, link_id)?;
                // Delete related data first
                tx.execute("DELETE FROM highlights WHERE link_id = ?1", params![link_id])?;
                tx.execute(
                    "DELETE FROM link_archives WHERE link_id = ?1",
                    params![link_id],
                )?;
                tx.execute("DELETE FROM link_tags WHERE link_id = ?1", params![link_id])?;
                tx.execute("DELETE FROM links WHERE id = ?1", params![link_id])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        tracing::debug!(link_id, "deleted link");
        Ok(())
    }

    pub async fn list_links(&self, query: LinkQuery) -> Result<Page<LinkListItem>> {
        let sql = compose_list_query(&query)?;
        let page = query.page as u64;
        let page_size = query.page_size as u64;

        let (items, total) = self
            .conn
            .call(move |conn| {
                let total: i64 = conn.query_row(
                    &sql.count_sql,
                    params_from_iter(sql.where_params.iter()),
                    |row| row.get(0),
                )?;

                let mut select_params = sql.where_params.clone();
                select_params.push(Value::Integer(sql.limit));
                select_params.push(Value::Integer(sql.offset));

                let mut stmt = conn.prepare(&sql.select_sql)?;
                let items = stmt
                    .query_map(params_from_iter(select_params.iter()), list_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok((items, total))
            })
            .await?;

        let total_count = total as u64;
        Ok(Page {
            items,
            total_count,
            page_count: total_count.div_ceil(page_size),
            page,
            page_size,
        })
    }

    // Tag operations

    pub async fn create_or_get_tag(&self, owner_id: i64, name: &str) -> Result<Tag> {
        let name = name.trim().to_string();
        let length = name.chars().count();
        if !(TAG_NAME_MIN..=TAG_NAME_MAX).contains(&length) {
            return Err(AppError::InvalidParameter(format!(
                "tag name must be {TAG_NAME_MIN}-{TAG_NAME_MAX} characters, got {length}"
            )));
        }
        let slug = slugify(&name);

        let tag = self
            .conn
            .call(move |conn| {
                // Idempotent by (user, name): the insert is a no-op when the
                // tag already exists, and a concurrent loser degrades to the
                // same lookup below.
                conn.execute(
                    "INSERT INTO tags (user_id, name, slug, created_at) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id, name) DO NOTHING",
                    params![owner_id, name, slug, Utc::now().to_rfc3339()],
                )?;
                let tag = conn.query_row(
                    "SELECT id, user_id, name, slug, created_at FROM tags
                     WHERE user_id = ?1 AND name = ?2",
                    params![owner_id, name],
                    tag_from_row,
                )?;
                Ok(tag)
            })
            .await?;
        Ok(tag)
    }

    pub async fn list_tags(&self, owner_id: i64) -> Result<Vec<TagWithCount>> {
        let tags = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT t.id, t.user_id, t.name, t.slug, t.created_at,
                            COUNT(lt.link_id) AS link_count
                     FROM tags t
                     LEFT JOIN link_tags lt ON lt.tag_id = t.id
                     WHERE t.user_id = ?1
                     GROUP BY t.id
                     ORDER BY t.name COLLATE NOCASE ASC",
                )?;
                let tags = stmt
                    .query_map(params![owner_id], tag_with_count_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    pub async fn get_tag_by_slug(&self, owner_id: i64, slug: &str) -> Result<Option<Tag>> {
        let slug = slug.to_string();
        let tag = self
            .conn
            .call(move |conn| {
                let tag = conn
                    .query_row(
                        "SELECT id, user_id, name, slug, created_at FROM tags
                         WHERE user_id = ?1 AND slug = ?2",
                        params![owner_id, slug],
                        tag_from_row,
                    )
                    .optional()?;
                Ok(tag)
            })
            .await?;
        Ok(tag)
    }

    pub async fn delete_tag(&self, owner_id: i64, tag_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                // A tag owned by someone else reads the same as a missing one.
                let owned: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM tags WHERE id = ?1 AND user_id = ?2",
                        params![tag_id, owner_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if owned.is_none() {
                    return Err(AppError::TagNotFound { id: tag_id }.into());
                }
                tx.execute("DELETE FROM link_tags WHERE tag_id = ?1", params![tag_id])?;
                tx.execute("DELETE FROM tags WHERE id = ?1", params![tag_id])?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        tracing::debug!(tag_id, "deleted tag");
        Ok(())
    }

    // Tag association operations
    //
    // Every mutation validates the whole tag set against the link's owner
    // before touching the join table, inside one transaction: a bad tag in
    // the input leaves the association exactly as it was.

    pub async fn add_tags(&self, owner_id: i64, link_id: i64, tag_ids: Vec<i64>) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_link_owned(&tx, owner_id, link_id)?;
                check_tag_owners(&tx, owner_id, &tag_ids)?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO link_tags (link_id, tag_id) VALUES (?1, ?2)
                         ON CONFLICT (link_id, tag_id) DO NOTHING",
                    )?;
                    for tag_id in &tag_ids {
                        stmt.execute(params![link_id, tag_id])?;
                    }
                }
                let link = fetch_link(&tx, owner_id, link_id)?;
                tx.commit()?;
                Ok(link)
            })
            .await?;
        Ok(link)
    }

    pub async fn remove_tags(
        &self,
        owner_id: i64,
        link_id: i64,
        tag_ids: Vec<i64>,
    ) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_link_owned(&tx, owner_id, link_id)?;
                check_tag_owners(&tx, owner_id, &tag_ids)?;
                {
                    let mut stmt =
                        tx.prepare("DELETE FROM link_tags WHERE link_id = ?1 AND tag_id = ?2")?;
                    for tag_id in &tag_ids {
                        stmt.execute(params![link_id, tag_id])?;
                    }
                }
                let link = fetch_link(&tx, owner_id, link_id)?;
                tx.commit()?;
                Ok(link)
            })
            .await?;
        Ok(link)
    }

    pub async fn replace_tags(
        &self,
        owner_id: i64,
        link_id: i64,
        tag_ids: Vec<i64>,
    ) -> Result<Link> {
        let link = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                ensure_link_owned(&tx, owner_id, link_id)?;
                check_tag_owners(&tx, owner_id, &tag_ids)?;
                tx.execute("DELETE FROM link_tags WHERE link_id = ?1", params![link_id])?;
                {
                    let mut stmt =
                        tx.prepare("INSERT INTO link_tags (link_id, tag_id) VALUES (?1, ?2)")?;
                    for tag_id in &tag_ids {
                        stmt.execute(params![link_id, tag_id])?;
                    }
                }
                let link = fetch_link(&tx, owner_id, link_id)?;
                tx.commit()?;
                Ok(link)
            })
            .await?;
        tracing::debug!(link_id, "replaced tag set");
        Ok(link)
    }

    pub async fn list_tags_for_link(&self, owner_id: i64, link_id: i64) -> Result<Vec<Tag>> {
        let tags = self
            .conn
            .call(move |conn| {
                ensure_link_owned(conn, owner_id, link_id)?;
                let mut stmt = conn.prepare(
                    "SELECT t.id, t.user_id, t.name, t.slug, t.created_at
                     FROM tags t
                     INNER JOIN link_tags lt ON lt.tag_id = t.id
                     WHERE lt.link_id = ?1
                     ORDER BY t.name COLLATE NOCASE ASC",
                )?;
                let tags = stmt
                    .query_map(params![link_id], tag_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(tags)
            })
            .await?;
        Ok(tags)
    }

    // Archive operations

    pub async fn set_archive(
        &self,
        owner_id: i64,
        link_id: i64,
        content: Option<String>,
    ) -> Result<()> {
        self.conn
            .call(move |conn| {
                ensure_link_owned(conn, owner_id, link_id)?;
                conn.execute(
                    "INSERT OR REPLACE INTO link_archives (link_id, content, archived_at)
                     VALUES (?1, ?2, ?3)",
                    params![link_id, content, Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn has_archive(&self, owner_id: i64, link_id: i64) -> Result<bool> {
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM link_archives a
                     INNER JOIN links l ON l.id = a.link_id
                     WHERE a.link_id = ?1 AND l.user_id = ?2",
                    params![link_id, owner_id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    // Highlight operations

    pub async fn add_highlight(
        &self,
        owner_id: i64,
        link_id: i64,
        highlight: NewHighlight,
    ) -> Result<Highlight> {
        if highlight.start_index < 0 || highlight.end_index < highlight.start_index {
            return Err(AppError::InvalidParameter(format!(
                "invalid highlight range {}..{}",
                highlight.start_index, highlight.end_index
            )));
        }
        if highlight.highlighted_text.trim().is_empty() {
            return Err(AppError::InvalidParameter(
                "highlighted text must not be empty".to_string(),
            ));
        }

        let highlight = self
            .conn
            .call(move |conn| {
                ensure_link_owned(conn, owner_id, link_id)?;
                conn.execute(
                    "INSERT INTO highlights (user_id, link_id, start_index, end_index,
                                             highlighted_text, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        owner_id,
                        link_id,
                        highlight.start_index,
                        highlight.end_index,
                        highlight.highlighted_text,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let highlight = conn.query_row(
                    "SELECT id, user_id, link_id, start_index, end_index, highlighted_text, created_at
                     FROM highlights WHERE id = ?1",
                    params![id],
                    highlight_from_row,
                )?;
                Ok(highlight)
            })
            .await?;
        Ok(highlight)
    }

    pub async fn list_highlights(&self, owner_id: i64, link_id: i64) -> Result<Vec<Highlight>> {
        let highlights = self
            .conn
            .call(move |conn| {
                ensure_link_owned(conn, owner_id, link_id)?;
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, link_id, start_index, end_index, highlighted_text, created_at
                     FROM highlights
                     WHERE link_id = ?1 AND user_id = ?2
                     ORDER BY start_index ASC, id ASC",
                )?;
                let highlights = stmt
                    .query_map(params![link_id, owner_id], highlight_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(highlights)
            })
            .await?;
        Ok(highlights)
    }

    pub async fn delete_highlight(&self, owner_id: i64, highlight_id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                let rows = conn.execute(
                    "DELETE FROM highlights WHERE id = ?1 AND user_id = ?2",
                    params![highlight_id, owner_id],
                )?;
                if rows == 0 {
                    return Err(AppError::HighlightNotFound { id: highlight_id }.into());
                }
                Ok(())
            })
            .await?;
        Ok(())
    }
}

// Owner scoping makes a foreign link indistinguishable from a missing one.
fn ensure_link_owned(
    conn: &rusqlite::Connection,
    owner_id: i64,
    link_id: i64,
) -> CallResult<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM links WHERE id = ?1 AND user_id = ?2",
            params![link_id, owner_id],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(AppError::LinkNotFound { id: link_id }.into()),
    }
}

// Batch-load every requested tag's owner in one query and validate in
// memory before any mutation runs. Missing tags and foreign tags both fail
// the whole operation.
fn check_tag_owners(
    conn: &rusqlite::Connection,
    owner_id: i64,
    tag_ids: &[i64],
) -> CallResult<()> {
    if tag_ids.is_empty() {
        return Ok(());
    }
    let placeholders = tag_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("SELECT id, user_id FROM tags WHERE id IN ({placeholders})");
    let mut stmt = conn.prepare(&sql)?;
    let owners = stmt
        .query_map(params_from_iter(tag_ids.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<HashMap<i64, i64>, _>>()?;

    for tag_id in tag_ids {
        match owners.get(tag_id) {
            None => return Err(AppError::TagNotFound { id: *tag_id }.into()),
            Some(tag_owner) if *tag_owner != owner_id => {
                return Err(AppError::OwnershipMismatch { tag_id: *tag_id }.into())
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn fetch_link(conn: &rusqlite::Connection, owner_id: i64, link_id: i64) -> CallResult<Link> {
    let link = conn
        .query_row(
            "SELECT id, user_id, original_url, cleaned_url, hostname, title, author, excerpt,
                    article_html, raw_text_content, header_image_url, summary, summary_model,
                    article_date, read_time_seconds, read_time_display, saved_at, last_viewed_at
             FROM links WHERE id = ?1 AND user_id = ?2",
            params![link_id, owner_id],
            link_from_row,
        )
        .optional()?;
    link.ok_or_else(|| AppError::LinkNotFound { id: link_id }.into())
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn link_from_row(row: &Row) -> rusqlite::Result<Link> {
    Ok(Link {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        original_url: row.get("original_url")?,
        cleaned_url: row.get("cleaned_url")?,
        hostname: row.get("hostname")?,
        title: row.get("title")?,
        author: row.get("author")?,
        excerpt: row.get("excerpt")?,
        article_html: row.get("article_html")?,
        raw_text_content: row.get("raw_text_content")?,
        header_image_url: row.get("header_image_url")?,
        summary: row.get("summary")?,
        summary_model: row.get("summary_model")?,
        article_date: row
            .get::<_, Option<String>>("article_date")?
            .and_then(|s| parse_datetime(&s)),
        read_time_seconds: row.get("read_time_seconds")?,
        read_time_display: row.get("read_time_display")?,
        saved_at: row
            .get::<_, String>("saved_at")
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_viewed_at: row
            .get::<_, Option<String>>("last_viewed_at")?
            .and_then(|s| parse_datetime(&s)),
    })
}

fn list_item_from_row(row: &Row) -> rusqlite::Result<LinkListItem> {
    Ok(LinkListItem {
        id: row.get("id")?,
        title: row.get("title")?,
        hostname: row.get("hostname")?,
        cleaned_url: row.get("cleaned_url")?,
        saved_at: row
            .get::<_, String>("saved_at")
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        last_viewed_at: row
            .get::<_, Option<String>>("last_viewed_at")?
            .and_then(|s| parse_datetime(&s)),
        read_time_display: row.get("read_time_display")?,
        has_archive: row.get("has_archive")?,
    })
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: row
            .get::<_, String>("created_at")
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn tag_with_count_from_row(row: &Row) -> rusqlite::Result<TagWithCount> {
    Ok(TagWithCount {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        slug: row.get("slug")?,
        created_at: row
            .get::<_, String>("created_at")
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        link_count: row.get("link_count")?,
    })
}

fn highlight_from_row(row: &Row) -> rusqlite::Result<Highlight> {
    Ok(Highlight {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        link_id: row.get("link_id")?,
        start_index: row.get("start_index")?,
        end_index: row.get("end_index")?,
        highlighted_text: row.get("highlighted_text")?,
        created_at: row
            .get::<_, String>("created_at")
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}
