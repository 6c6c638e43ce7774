//! SQLite-backed store implementation
//!
//! A single `SqliteStore` implements [`PatternStore`], [`MetadataStore`], and
//! [`SymbolStatsStore`] against one database file. Uses separate reader/
//! writer connections for interior mutability, following this crate's usual
//! shape: all methods take `&self`, so a `SqliteStore` is `Send + Sync` and
//! shareable via `Arc` without an outer `Mutex`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::minhash::MinHashSignature;
use crate::pattern::{Pattern, PatternMetadata, SymbolStatistics};
use crate::stm::RollingWindow;
use crate::symbol::Event;
use crate::tenant::TenantId;

use super::{MetadataStore, PatternFilter, PatternStore, Result, StorageError, SymbolStatsStore};

/// SQLite-backed storage for patterns, pattern metadata, and symbol
/// statistics, tenant-isolated by a `tenant_id` column on every table.
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStore {
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (creating if absent) a store at `db_path`, or at a platform
    /// default location when `None`.
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("com", "prediction-core", "store")
                    .ok_or_else(|| StorageError::Init("could not determine project directories".into()))?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("patterns.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
        })
    }

    /// Open an in-memory store, primarily for tests.
    pub fn in_memory() -> Result<Self> {
        let writer_conn = Connection::open_in_memory()?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;
        // SQLite in-memory databases are connection-local; the reader shares
        // the writer connection in this mode since a second `:memory:` open
        // would see an empty database.
        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn writer_lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| StorageError::Init("writer lock poisoned".into()))
    }

    fn reader_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        // in_memory() gives the reader its own empty database, so route all
        // reads through the writer connection when that would be wrong.
        self.writer_lock()
    }

    fn row_to_pattern(
        tenant_id: &TenantId,
        identifier: String,
        events_json: String,
        length: i64,
        token_multiset_json: String,
        first_token: Option<String>,
        last_token: Option<String>,
        minhash_json: String,
        lsh_bands_json: String,
        created_at: String,
        updated_at: String,
    ) -> Result<Pattern> {
        let raw_events: Vec<Vec<String>> = serde_json::from_str(&events_json)?;
        let events = raw_events.into_iter().map(Event::new).collect();
        let token_multiset: std::collections::BTreeSet<String> =
            serde_json::from_str(&token_multiset_json)?;
        let minhash: Vec<u64> = serde_json::from_str(&minhash_json)?;
        let lsh_bands: Vec<String> = serde_json::from_str(&lsh_bands_json)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StorageError::Init(e.to_string()))?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| StorageError::Init(e.to_string()))?
            .with_timezone(&Utc);

        Ok(Pattern {
            identifier,
            tenant_id: tenant_id.clone(),
            events,
            length: length as usize,
            token_multiset,
            first_token,
            last_token,
            minhash_signature: MinHashSignature(minhash),
            lsh_bands,
            created_at,
            updated_at,
        })
    }
}

impl PatternStore for SqliteStore {
    fn write(&self, pattern: &Pattern) -> Result<()> {
        let conn = self.writer_lock()?;
        let events_json: Vec<Vec<&str>> = pattern
            .events
            .iter()
            .map(|e| e.symbols.iter().map(String::as_str).collect())
            .collect();
        let events_json = serde_json::to_string(&events_json)?;
        let token_multiset_json = serde_json::to_string(&pattern.token_multiset)?;
        let minhash_json = serde_json::to_string(&pattern.minhash_signature.0)?;
        let lsh_bands_json = serde_json::to_string(&pattern.lsh_bands)?;

        conn.execute(
            "INSERT INTO patterns
                (tenant_id, identifier, events_json, length, token_multiset_json,
                 first_token, last_token, minhash_json, lsh_bands_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(tenant_id, identifier) DO NOTHING",
            params![
                pattern.tenant_id.as_str(),
                pattern.identifier,
                events_json,
                pattern.length as i64,
                token_multiset_json,
                pattern.first_token,
                pattern.last_token,
                minhash_json,
                lsh_bands_json,
                pattern.created_at.to_rfc3339(),
                pattern.updated_at.to_rfc3339(),
            ],
        )?;

        for band in &pattern.lsh_bands {
            conn.execute(
                "INSERT OR IGNORE INTO lsh_band_index (tenant_id, band, identifier) VALUES (?1, ?2, ?3)",
                params![pattern.tenant_id.as_str(), band, pattern.identifier],
            )?;
        }
        for token in &pattern.token_multiset {
            conn.execute(
                "INSERT OR IGNORE INTO token_index (tenant_id, token, identifier) VALUES (?1, ?2, ?3)",
                params![pattern.tenant_id.as_str(), token, pattern.identifier],
            )?;
        }
        Ok(())
    }

    fn scan(&self, tenant_id: &TenantId, filter: &PatternFilter) -> Result<Vec<Pattern>> {
        let conn = self.reader_conn()?;

        // Narrow via whichever index-backed predicate is most selective,
        // then apply the remaining predicates in-process. LSH bands and
        // token membership are pushed down through their join tables;
        // length and endpoints are pushed down via the `patterns` table's
        // own indexes.
        let candidate_ids: Option<Vec<String>> = if let Some(bands) = &filter.lsh_bands {
            if bands.is_empty() {
                Some(Vec::new())
            } else {
                let placeholders = bands.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "SELECT DISTINCT identifier FROM lsh_band_index WHERE tenant_id = ? AND band IN ({placeholders})"
                );
                let mut stmt = conn.prepare(&sql)?;
                let tenant_str = tenant_id.as_str();
                let mut query_params: Vec<&dyn rusqlite::ToSql> = vec![&tenant_str];
                for b in bands {
                    query_params.push(b);
                }
                let ids: Vec<String> = stmt
                    .query_map(query_params.as_slice(), |row| row.get(0))?
                    .collect::<rusqlite::Result<_>>()?;
                Some(ids)
            }
        } else if let Some(tokens) = &filter.required_tokens {
            if tokens.is_empty() {
                None
            } else {
                let mut sets: Vec<std::collections::BTreeSet<String>> = Vec::new();
                for token in tokens {
                    let mut stmt = conn.prepare(
                        "SELECT identifier FROM token_index WHERE tenant_id = ?1 AND token = ?2",
                    )?;
                    let ids: std::collections::BTreeSet<String> = stmt
                        .query_map(params![tenant_id.as_str(), token], |row| row.get(0))?
                        .collect::<rusqlite::Result<_>>()?;
                    sets.push(ids);
                }
                let mut iter = sets.into_iter();
                let mut intersection = iter.next().unwrap_or_default();
                for s in iter {
                    intersection = intersection.intersection(&s).cloned().collect();
                }
                Some(intersection.into_iter().collect())
            }
        } else {
            None
        };

        let tenant_id_str_ref = tenant_id.as_str();
        let min_bind = filter.length_range.map(|(min, _)| min as i64);
        let max_bind = filter.length_range.map(|(_, max)| max as i64);
        let ft_bind = filter.first_token.as_deref();

        let mut sql = String::from(
            "SELECT identifier, events_json, length, token_multiset_json, first_token, last_token,
                    minhash_json, lsh_bands_json, created_at, updated_at
             FROM patterns WHERE tenant_id = ?",
        );
        let mut bind_params: Vec<&dyn rusqlite::ToSql> = vec![&tenant_id_str_ref];
        if let (Some(min), Some(max)) = (&min_bind, &max_bind) {
            sql.push_str(" AND length >= ? AND length <= ?");
            bind_params.push(min);
            bind_params.push(max);
        }
        if let Some(ft) = &ft_bind {
            sql.push_str(" AND first_token = ?");
            bind_params.push(ft);
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bind_params.as_slice(), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;

        let candidate_set: Option<std::collections::BTreeSet<String>> =
            candidate_ids.map(|ids| ids.into_iter().collect());

        let mut out = Vec::new();
        for row in rows {
            let (identifier, events_json, length, token_multiset_json, first_token, last_token, minhash_json, lsh_bands_json, created_at, updated_at) = row?;
            if let Some(set) = &candidate_set {
                if !set.contains(&identifier) {
                    continue;
                }
            }
            if let Some(lt) = &filter.last_token {
                if last_token.as_deref() != Some(lt.as_str()) {
                    continue;
                }
            }
            out.push(Self::row_to_pattern(
                tenant_id,
                identifier,
                events_json,
                length,
                token_multiset_json,
                first_token,
                last_token,
                minhash_json,
                lsh_bands_json,
                created_at,
                updated_at,
            )?);
        }
        Ok(out)
    }

    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()> {
        let conn = self.writer_lock()?;
        conn.execute("DELETE FROM patterns WHERE tenant_id = ?1", params![tenant_id.as_str()])?;
        conn.execute(
            "DELETE FROM lsh_band_index WHERE tenant_id = ?1",
            params![tenant_id.as_str()],
        )?;
        conn.execute(
            "DELETE FROM token_index WHERE tenant_id = ?1",
            params![tenant_id.as_str()],
        )?;
        Ok(())
    }

    fn count(&self, tenant_id: &TenantId) -> Result<u64> {
        let conn = self.reader_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM patterns WHERE tenant_id = ?1",
            params![tenant_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn exists(&self, tenant_id: &TenantId, identifier: &str) -> Result<bool> {
        let conn = self.reader_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM patterns WHERE tenant_id = ?1 AND identifier = ?2",
                params![tenant_id.as_str(), identifier],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl MetadataStore for SqliteStore {
    fn write(&self, tenant_id: &TenantId, identifier: &str, metadata: &PatternMetadata) -> Result<()> {
        let conn = self.writer_lock()?;
        let emotive_json = serde_json::to_string(&metadata.emotive_profile)?;
        let meta_json = serde_json::to_string(&metadata.metadata)?;
        conn.execute(
            "INSERT INTO pattern_metadata (tenant_id, identifier, frequency, emotive_profile_json, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(tenant_id, identifier) DO UPDATE SET
                frequency = excluded.frequency,
                emotive_profile_json = excluded.emotive_profile_json,
                metadata_json = excluded.metadata_json",
            params![tenant_id.as_str(), identifier, metadata.frequency as i64, emotive_json, meta_json],
        )?;
        Ok(())
    }

    fn increment_frequency(&self, tenant_id: &TenantId, identifier: &str) -> Result<u64> {
        let conn = self.writer_lock()?;
        conn.execute(
            "UPDATE pattern_metadata SET frequency = frequency + 1 WHERE tenant_id = ?1 AND identifier = ?2",
            params![tenant_id.as_str(), identifier],
        )?;
        let freq: Option<i64> = conn
            .query_row(
                "SELECT frequency FROM pattern_metadata WHERE tenant_id = ?1 AND identifier = ?2",
                params![tenant_id.as_str(), identifier],
                |row| row.get(0),
            )
            .optional()?;
        freq.map(|f| f as u64)
            .ok_or_else(|| StorageError::NotFound(identifier.to_string()))
    }

    fn get(&self, tenant_id: &TenantId, identifier: &str) -> Result<Option<PatternMetadata>> {
        let conn = self.reader_conn()?;
        let row: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT frequency, emotive_profile_json, metadata_json FROM pattern_metadata
                 WHERE tenant_id = ?1 AND identifier = ?2",
                params![tenant_id.as_str(), identifier],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((frequency, emotive_json, meta_json)) => {
                let emotive_profile: BTreeMap<String, RollingWindow<f64>> =
                    serde_json::from_str(&emotive_json)?;
                let metadata: BTreeMap<String, std::collections::BTreeSet<String>> =
                    serde_json::from_str(&meta_json)?;
                Ok(Some(PatternMetadata {
                    frequency: frequency as u64,
                    emotive_profile,
                    metadata,
                }))
            }
        }
    }

    fn batch_get(
        &self,
        tenant_id: &TenantId,
        identifiers: &[String],
    ) -> Result<BTreeMap<String, PatternMetadata>> {
        let mut out = BTreeMap::new();
        for id in identifiers {
            if let Some(meta) = self.get(tenant_id, id)? {
                out.insert(id.clone(), meta);
            }
        }
        Ok(out)
    }

    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()> {
        let conn = self.writer_lock()?;
        conn.execute(
            "DELETE FROM pattern_metadata WHERE tenant_id = ?1",
            params![tenant_id.as_str()],
        )?;
        Ok(())
    }
}

impl SymbolStatsStore for SqliteStore {
    fn increment_symbol_frequency(&self, tenant_id: &TenantId, symbol: &str) -> Result<()> {
        let conn = self.writer_lock()?;
        conn.execute(
            "INSERT INTO symbol_stats (tenant_id, symbol, frequency, pattern_member_frequency)
             VALUES (?1, ?2, 1, 0)
             ON CONFLICT(tenant_id, symbol) DO UPDATE SET frequency = frequency + 1",
            params![tenant_id.as_str(), symbol],
        )?;
        Ok(())
    }

    fn increment_pattern_member_frequency(&self, tenant_id: &TenantId, symbol: &str) -> Result<()> {
        let conn = self.writer_lock()?;
        conn.execute(
            "INSERT INTO symbol_stats (tenant_id, symbol, frequency, pattern_member_frequency)
             VALUES (?1, ?2, 0, 1)
             ON CONFLICT(tenant_id, symbol) DO UPDATE SET pattern_member_frequency = pattern_member_frequency + 1",
            params![tenant_id.as_str(), symbol],
        )?;
        Ok(())
    }

    fn get(&self, tenant_id: &TenantId, symbol: &str) -> Result<SymbolStatistics> {
        let conn = self.reader_conn()?;
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT frequency, pattern_member_frequency FROM symbol_stats
                 WHERE tenant_id = ?1 AND symbol = ?2",
                params![tenant_id.as_str(), symbol],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row
            .map(|(f, p)| SymbolStatistics {
                frequency: f as u64,
                pattern_member_frequency: p as u64,
            })
            .unwrap_or_default())
    }

    fn batch_get(
        &self,
        tenant_id: &TenantId,
        symbols: &[String],
    ) -> Result<BTreeMap<String, SymbolStatistics>> {
        let mut out = BTreeMap::new();
        for symbol in symbols {
            out.insert(symbol.clone(), self.get(tenant_id, symbol)?);
        }
        Ok(out)
    }

    fn drop_tenant(&self, tenant_id: &TenantId) -> Result<()> {
        let conn = self.writer_lock()?;
        conn.execute(
            "DELETE FROM symbol_stats WHERE tenant_id = ?1",
            params![tenant_id.as_str()],
        )?;
        Ok(())
    }
}
