//! SQLite-backed [`ConfigStore`].
//!
//! The connection sits behind a `parking_lot::Mutex`. Every operation runs on
//! the blocking pool and holds the lock only inside that closure, so the guard
//! never crosses a suspension point. Multi-statement mutations run in a
//! transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ConfigStore, MintRemoval, RelayRemoval};

const RELAYS_SEEDED_KEY: &str = "relays_seeded";

pub struct SqliteConfigStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteConfigStore {
    /// Open (or create) the settings database at `path`.
    ///
    /// On first open the relay table is seeded with `default_relays`.
    pub fn open(path: &Path, default_relays: &[String]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings dir: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open settings DB: {}", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;",
        )?;

        Self::init(conn, default_relays)
    }

    /// In-memory store (for testing).
    pub fn open_in_memory(default_relays: &[String]) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, default_relays)
    }

    fn init(mut conn: Connection, default_relays: &[String]) -> Result<Self> {
        create_settings_tables(&conn)?;
        seed_relays(&mut conn, default_relays)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Create the relay, mint and meta tables.
///
/// A partial unique index keeps at most one mint marked active.
pub fn create_settings_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS relays (
            position INTEGER PRIMARY KEY AUTOINCREMENT,
            url      TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS mints (
            position INTEGER PRIMARY KEY AUTOINCREMENT,
            url      TEXT NOT NULL UNIQUE,
            active   INTEGER NOT NULL DEFAULT 0
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_mints_single_active
            ON mints(active) WHERE active = 1;

        CREATE TABLE IF NOT EXISTS meta (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
    .context("failed to create settings tables")?;

    Ok(())
}

fn seed_relays(conn: &mut Connection, default_relays: &[String]) -> Result<()> {
    let tx = conn.transaction()?;
    let seeded: Option<String> = tx
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![RELAYS_SEEDED_KEY],
            |row| row.get(0),
        )
        .optional()?;

    if seeded.is_none() {
        for url in default_relays {
            tx.execute("INSERT OR IGNORE INTO relays (url) VALUES (?1)", params![url])?;
        }
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, '1')",
            params![RELAYS_SEEDED_KEY],
        )?;
        if !default_relays.is_empty() {
            info!("Seeded {} default relay(s)", default_relays.len());
        }
    }

    tx.commit().context("failed to seed relays")?;
    Ok(())
}

fn relays(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM relays ORDER BY position")?;
    let urls = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(urls)
}

fn mints(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT url FROM mints ORDER BY position")?;
    let urls = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(urls)
}

fn active_mint(conn: &Connection) -> Result<Option<String>> {
    let url = conn
        .query_row("SELECT url FROM mints WHERE active = 1", [], |row| row.get(0))
        .optional()?;
    Ok(url)
}

fn mint_exists(tx: &Transaction<'_>, url: &str) -> Result<bool> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM mints WHERE url = ?1", params![url], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn activate_mint(tx: &Transaction<'_>, url: &str) -> Result<()> {
    tx.execute("UPDATE mints SET active = 0 WHERE active = 1", [])?;
    tx.execute("UPDATE mints SET active = 1 WHERE url = ?1", params![url])?;
    Ok(())
}

fn remove_relay_tx(conn: &mut Connection, url: &str) -> Result<RelayRemoval> {
    let tx = conn.transaction()?;

    let present: Option<i64> = tx
        .query_row("SELECT 1 FROM relays WHERE url = ?1", params![url], |row| row.get(0))
        .optional()?;
    if present.is_none() {
        return Ok(RelayRemoval::NotFound);
    }

    let count: i64 = tx.query_row("SELECT COUNT(*) FROM relays", [], |row| row.get(0))?;
    if count <= 1 {
        return Ok(RelayRemoval::LastRelay);
    }

    tx.execute("DELETE FROM relays WHERE url = ?1", params![url])?;
    tx.commit().context("failed to remove relay")?;
    Ok(RelayRemoval::Removed)
}

fn add_mint_tx(conn: &mut Connection, url: &str) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute("INSERT OR IGNORE INTO mints (url) VALUES (?1)", params![url])?;
    let has_active: Option<i64> = tx
        .query_row("SELECT 1 FROM mints WHERE active = 1", [], |row| row.get(0))
        .optional()?;
    if has_active.is_none() {
        activate_mint(&tx, url)?;
    }

    tx.commit().context("failed to add mint")?;
    Ok(())
}

fn set_active_mint_tx(conn: &mut Connection, url: &str) -> Result<bool> {
    let tx = conn.transaction()?;

    if !mint_exists(&tx, url)? {
        return Ok(false);
    }
    activate_mint(&tx, url)?;

    tx.commit().context("failed to set active mint")?;
    Ok(true)
}

fn remove_mint_tx(conn: &mut Connection, url: &str) -> Result<MintRemoval> {
    let tx = conn.transaction()?;

    let was_active: Option<bool> = tx
        .query_row("SELECT active FROM mints WHERE url = ?1", params![url], |row| {
            row.get::<_, i64>(0).map(|v| v == 1)
        })
        .optional()?;
    let Some(was_active) = was_active else {
        return Ok(MintRemoval::NotFound);
    };

    tx.execute("DELETE FROM mints WHERE url = ?1", params![url])?;

    if was_active {
        let replacement: Option<String> = tx
            .query_row("SELECT url FROM mints ORDER BY position LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if let Some(next) = &replacement {
            activate_mint(&tx, next)?;
        }
    }

    let active = active_mint(&tx)?;
    tx.commit().context("failed to remove mint")?;
    Ok(MintRemoval::Removed { active })
}

impl SqliteConfigStore {
    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .context("settings store task failed")?
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn load_relays(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| relays(conn).context("failed to load relays"))
            .await
    }

    async fn add_relay(&self, url: &str) -> Result<()> {
        let url = url.to_owned();
        self.with_conn(move |conn| {
            let inserted = conn
                .execute("INSERT OR IGNORE INTO relays (url) VALUES (?1)", params![url])
                .context("failed to add relay")?;
            debug!("add_relay {url}: {inserted} row(s) inserted");
            Ok(())
        })
        .await
    }

    async fn remove_relay(&self, url: &str) -> Result<RelayRemoval> {
        let url = url.to_owned();
        self.with_conn(move |conn| remove_relay_tx(conn, &url)).await
    }

    async fn load_mints(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| mints(conn).context("failed to load mints"))
            .await
    }

    async fn load_active_mint(&self) -> Result<Option<String>> {
        self.with_conn(|conn| active_mint(conn).context("failed to load active mint"))
            .await
    }

    async fn add_mint(&self, url: &str) -> Result<()> {
        let url = url.to_owned();
        self.with_conn(move |conn| add_mint_tx(conn, &url)).await
    }

    async fn set_active_mint(&self, url: &str) -> Result<bool> {
        let url = url.to_owned();
        self.with_conn(move |conn| set_active_mint_tx(conn, &url)).await
    }

    async fn remove_mint(&self, url: &str) -> Result<MintRemoval> {
        let url = url.to_owned();
        self.with_conn(move |conn| remove_mint_tx(conn, &url)).await
    }
}
