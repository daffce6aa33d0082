/// Schema applied on every open; statements must stay idempotent.
pub const SCHEMA: &str = r#"
-- Browser-style local storage: one string value per key
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Offline shell assets, grouped into named buckets
CREATE TABLE IF NOT EXISTS asset_cache (
    bucket TEXT NOT NULL,
    url_hash TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    digest TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, url_hash)
);

CREATE INDEX IF NOT EXISTS idx_asset_cache_bucket ON asset_cache(bucket);
"#;
