//! SQLite persistence for asset buckets.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::warn;

use super::fetcher::Asset;
use crate::db::Database;

fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Named buckets of cached responses
pub struct AssetStore {
  db: Arc<Database>,
}

impl AssetStore {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Replace the contents of `bucket` with `assets` in one transaction.
  pub fn put_all(&self, bucket: &str, assets: &[Asset]) -> Result<()> {
    let mut conn = self.db.conn()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM asset_cache WHERE bucket = ?", params![bucket])
      .map_err(|e| eyre!("Failed to reset bucket {}: {}", bucket, e))?;

    for asset in assets {
      tx.execute(
        "INSERT OR REPLACE INTO asset_cache (bucket, url_hash, url, status, content_type, body, digest, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          bucket,
          sha256_hex(asset.url.as_bytes()),
          asset.url,
          asset.status,
          asset.content_type,
          asset.body,
          sha256_hex(&asset.body),
        ],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", asset.url, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  /// Look up a cached response. Entries whose body no longer matches the
  /// stored digest are treated as missing.
  pub fn get(&self, bucket: &str, url: &str) -> Result<Option<Asset>> {
    let conn = self.db.conn()?;

    let row: Option<(u16, Option<String>, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, content_type, body, digest FROM asset_cache
         WHERE bucket = ? AND url_hash = ?",
        params![bucket, sha256_hex(url.as_bytes())],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached {}: {}", url, e))?;

    let Some((status, content_type, body, digest)) = row else {
      return Ok(None);
    };

    if sha256_hex(&body) != digest {
      warn!(bucket, url, "cached asset failed digest check");
      return Ok(None);
    }

    Ok(Some(Asset {
      url: url.to_string(),
      status,
      content_type,
      body,
    }))
  }

  /// Whether every URL in `urls` is present in `bucket`
  pub fn contains_all(&self, bucket: &str, urls: &[String]) -> Result<bool> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT 1 FROM asset_cache WHERE bucket = ? AND url_hash = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    for url in urls {
      let present = stmt
        .exists(params![bucket, sha256_hex(url.as_bytes())])
        .map_err(|e| eyre!("Failed to query asset cache: {}", e))?;
      if !present {
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Names of all buckets that hold at least one entry
  pub fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn
      .prepare("SELECT DISTINCT bucket FROM asset_cache ORDER BY bucket")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?;

    Ok(names)
  }

  pub fn delete_bucket(&self, bucket: &str) -> Result<()> {
    let conn = self.db.conn()?;
    conn
      .execute("DELETE FROM asset_cache WHERE bucket = ?", params![bucket])
      .map_err(|e| eyre!("Failed to delete bucket {}: {}", bucket, e))?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn asset(url: &str, body: &str) -> Asset {
    Asset {
      url: url.to_string(),
      status: 200,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn test_put_all_replaces_bucket() {
    let store = AssetStore::new(Arc::new(Database::open_in_memory().unwrap()));
    store
      .put_all("v1", &[asset("https://a/x", "x"), asset("https://a/y", "y")])
      .unwrap();
    store.put_all("v1", &[asset("https://a/z", "z")]).unwrap();

    assert!(store.get("v1", "https://a/x").unwrap().is_none());
    assert_eq!(store.get("v1", "https://a/z").unwrap().unwrap().body, b"z");
    assert!(store.contains_all("v1", &["https://a/z".to_string()]).unwrap());
    assert!(!store.contains_all("v1", &["https://a/x".to_string()]).unwrap());
  }

  #[test]
  fn test_tampered_body_is_a_miss() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let store = AssetStore::new(Arc::clone(&db));
    store.put_all("v1", &[asset("https://a/x", "x")]).unwrap();

    db.conn()
      .unwrap()
      .execute("UPDATE asset_cache SET body = X'00'", [])
      .unwrap();
    assert!(store.get("v1", "https://a/x").unwrap().is_none());
  }

  #[test]
  fn test_buckets() {
    let store = AssetStore::new(Arc::new(Database::open_in_memory().unwrap()));
    store.put_all("v2", &[asset("https://a/x", "x")]).unwrap();
    store.put_all("v1", &[asset("https://a/x", "x")]).unwrap();
    assert_eq!(store.bucket_names().unwrap(), vec!["v1", "v2"]);

    store.delete_bucket("v1").unwrap();
    assert_eq!(store.bucket_names().unwrap(), vec!["v2"]);
    assert_eq!(store.get("v2", "https://a/x").unwrap().unwrap().body, b"x");
  }
}
