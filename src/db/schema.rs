pub const SCHEMA: &str = r#"
-- users table (identity plumbing; credentials live elsewhere)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- links table
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    original_url TEXT NOT NULL,
    cleaned_url TEXT NOT NULL,
    hostname TEXT NOT NULL,
    title TEXT NOT NULL,
    author TEXT,
    excerpt TEXT,
    article_html TEXT,
    raw_text_content TEXT,
    header_image_url TEXT,
    summary TEXT,
    summary_model TEXT,
    article_date TEXT,
    read_time_seconds INTEGER,
    read_time_display TEXT,
    saved_at TEXT NOT NULL,
    last_viewed_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_links_user_saved_at ON links(user_id, saved_at DESC);
CREATE INDEX IF NOT EXISTS idx_links_user_hostname ON links(user_id, hostname);
CREATE INDEX IF NOT EXISTS idx_links_user_last_viewed ON links(user_id, last_viewed_at);

-- tags table; (user_id, name) uniqueness backs idempotent creation
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(user_id, name)
);

CREATE INDEX IF NOT EXISTS idx_tags_user_slug ON tags(user_id, slug);

-- link_tags join table
CREATE TABLE IF NOT EXISTS link_tags (
    link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (link_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_link_tags_tag_id ON link_tags(tag_id);

-- link_archives table (one snapshot per link)
CREATE TABLE IF NOT EXISTS link_archives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id INTEGER NOT NULL UNIQUE REFERENCES links(id) ON DELETE CASCADE,
    content TEXT,
    archived_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- highlights table
CREATE TABLE IF NOT EXISTS highlights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    link_id INTEGER NOT NULL REFERENCES links(id) ON DELETE CASCADE,
    start_index INTEGER NOT NULL,
    end_index INTEGER NOT NULL,
    highlighted_text TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_highlights_link_start ON highlights(link_id, start_index);
CREATE INDEX IF NOT EXISTS idx_highlights_user_created ON highlights(user_id, created_at);
"#;
