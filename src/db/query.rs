use rusqlite::types::Value;

use crate::error::{AppError, Result};
use crate::models::{LinkQuery, ReadState, SearchClause, SortOrder};

const LIST_COLUMNS: &str = "l.id, l.title, l.hostname, l.cleaned_url, l.saved_at, l.last_viewed_at, l.read_time_display, \
     EXISTS(SELECT 1 FROM link_archives a WHERE a.link_id = l.id) AS has_archive";

// A composed list query: one statement for the page of rows, one for the
// total count, sharing the same WHERE parameters.
#[derive(Debug)]
pub struct ListSql {
    pub select_sql: String,
    pub count_sql: String,
    pub where_params: Vec<Value>,
    pub limit: i64,
    pub offset: i64,
}

pub fn compose_list_query(query: &LinkQuery) -> Result<ListSql> {
    if query.page_size < 1 {
        return Err(AppError::InvalidParameter(format!(
            "page size must be at least 1, got {}",
            query.page_size
        )));
    }
    if query.page < 1 {
        return Err(AppError::InvalidParameter(format!(
            "page numbers start at 1, got {}",
            query.page
        )));
    }
    let offset = (query.page - 1)
        .checked_mul(query.page_size)
        .ok_or_else(|| AppError::InvalidParameter("page out of range".to_string()))?;

    let mut conditions = vec!["l.user_id = ?".to_string()];
    let mut params: Vec<Value> = vec![Value::Integer(query.owner_id)];

    if let Some(tag_id) = query.tag_id {
        conditions.push("l.id IN (SELECT lt.link_id FROM link_tags lt WHERE lt.tag_id = ?)".to_string());
        params.push(Value::Integer(tag_id));
    }

    for clause in &query.clauses {
        match clause {
            SearchClause::Hostname(hostname) => {
                conditions.push("l.hostname = ?".to_string());
                params.push(Value::Text(hostname.clone()));
            }
            SearchClause::TitleContains(needle) => {
                conditions.push("l.title LIKE ?".to_string());
                params.push(Value::Text(format!("%{}%", needle)));
            }
            SearchClause::SavedAfter(when) => {
                conditions.push("l.saved_at >= ?".to_string());
                params.push(Value::Text(when.to_rfc3339()));
            }
            SearchClause::SavedBefore(when) => {
                conditions.push("l.saved_at <= ?".to_string());
                params.push(Value::Text(when.to_rfc3339()));
            }
            SearchClause::ReadState(ReadState::Unread) => {
                conditions.push("l.last_viewed_at IS NULL".to_string());
            }
            SearchClause::ReadState(ReadState::Viewed) => {
                conditions.push("l.last_viewed_at IS NOT NULL".to_string());
            }
        }
    }

    let where_sql = conditions.join(" AND ");
    let order_sql = match query.order {
        SortOrder::NewestFirst => "l.saved_at DESC, l.id DESC",
        SortOrder::OldestFirst => "l.saved_at ASC, l.id ASC",
        SortOrder::Title => "l.title COLLATE NOCASE ASC, l.id ASC",
    };

    Ok(ListSql {
        select_sql: format!(
            "SELECT {LIST_COLUMNS} FROM links l WHERE {where_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?"
        ),
        count_sql: format!("SELECT COUNT(*) FROM links l WHERE {where_sql}"),
        where_params: params,
        limit: query.page_size,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinkQuery;

    #[test]
    fn rejects_non_positive_page_size() {
        for page_size in [0, -5] {
            let mut query = LinkQuery::for_owner(1);
            query.page_size = page_size;
            let err = compose_list_query(&query).unwrap_err();
            assert!(matches!(err, AppError::InvalidParameter(_)));
        }
    }

    #[test]
    fn rejects_non_positive_page() {
        let mut query = LinkQuery::for_owner(1);
        query.page = 0;
        let err = compose_list_query(&query).unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter(_)));
    }

    #[test]
    fn default_query_scopes_by_owner_only() {
        let sql = compose_list_query(&LinkQuery::for_owner(42)).unwrap();
        assert!(sql.select_sql.contains("l.user_id = ?"));
        assert_eq!(sql.where_params.len(), 1);
        assert_eq!(sql.limit, crate::models::DEFAULT_PAGE_SIZE);
        assert_eq!(sql.offset, 0);
        assert!(sql.select_sql.contains("ORDER BY l.saved_at DESC, l.id DESC"));
    }

    #[test]
    fn clauses_are_conjunctive() {
        let mut query = LinkQuery::for_owner(1);
        query.clauses = vec![
            SearchClause::Hostname("example.com".to_string()),
            SearchClause::ReadState(ReadState::Unread),
        ];
        let sql = compose_list_query(&query).unwrap();
        assert!(sql.select_sql.contains("l.hostname = ?"));
        assert!(sql.select_sql.contains("l.last_viewed_at IS NULL"));
        assert!(sql.count_sql.contains("l.hostname = ?"));
        // owner + hostname; the read-state clause takes no parameter
        assert_eq!(sql.where_params.len(), 2);
    }

    #[test]
    fn tag_filter_uses_join_table_subquery() {
        let mut query = LinkQuery::for_owner(1);
        query.tag_id = Some(9);
        let sql = compose_list_query(&query).unwrap();
        assert!(sql.select_sql.contains("link_tags"));
        assert_eq!(sql.where_params.len(), 2);
    }

    #[test]
    fn pagination_offset_math() {
        let mut query = LinkQuery::for_owner(1);
        query.page = 3;
        query.page_size = 10;
        let sql = compose_list_query(&query).unwrap();
        assert_eq!(sql.limit, 10);
        assert_eq!(sql.offset, 20);
    }

    #[test]
    fn sort_order_overrides_default() {
        let mut query = LinkQuery::for_owner(1);
        query.order = SortOrder::Title;
        let sql = compose_list_query(&query).unwrap();
        assert!(sql.select_sql.contains("ORDER BY l.title COLLATE NOCASE ASC"));
    }
}
