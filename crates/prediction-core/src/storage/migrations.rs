//! Database Migrations
//!
//! Schema migration definitions for the SQLite-backed store implementations.

use rusqlite::Connection;

/// A single forward-only schema migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Version number; migrations apply in ascending order exactly once.
    pub version: u32,
    /// Human-readable description, surfaced in logs.
    pub description: &'static str,
    /// SQL executed to bring the schema from `version - 1` to `version`.
    pub up: &'static str,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: patterns, pattern_metadata, symbol_stats, lsh_band_index",
        up: MIGRATION_V1_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS patterns (
    tenant_id TEXT NOT NULL,
    identifier TEXT NOT NULL,
    events_json TEXT NOT NULL,
    length INTEGER NOT NULL,
    token_multiset_json TEXT NOT NULL,
    first_token TEXT,
    last_token TEXT,
    minhash_json TEXT NOT NULL,
    lsh_bands_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (tenant_id, identifier)
);

CREATE INDEX IF NOT EXISTS idx_patterns_tenant_length ON patterns(tenant_id, length);
CREATE INDEX IF NOT EXISTS idx_patterns_tenant_first ON patterns(tenant_id, first_token);
CREATE INDEX IF NOT EXISTS idx_patterns_tenant_last ON patterns(tenant_id, last_token);

-- One row per (tenant, band key, pattern) lets the MinHash stage push its
-- band-collision predicate down to an index lookup instead of a full scan.
CREATE TABLE IF NOT EXISTS lsh_band_index (
    tenant_id TEXT NOT NULL,
    band TEXT NOT NULL,
    identifier TEXT NOT NULL,
    PRIMARY KEY (tenant_id, band, identifier)
);

CREATE INDEX IF NOT EXISTS idx_lsh_band ON lsh_band_index(tenant_id, band);

-- One row per (tenant, token, pattern) supports Jaccard-stage set-overlap
-- pushdown without deserializing every candidate's full multiset.
CREATE TABLE IF NOT EXISTS token_index (
    tenant_id TEXT NOT NULL,
    token TEXT NOT NULL,
    identifier TEXT NOT NULL,
    PRIMARY KEY (tenant_id, token, identifier)
);

CREATE INDEX IF NOT EXISTS idx_token_index ON token_index(tenant_id, token);

CREATE TABLE IF NOT EXISTS pattern_metadata (
    tenant_id TEXT NOT NULL,
    identifier TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 1,
    emotive_profile_json TEXT NOT NULL DEFAULT '{}',
    metadata_json TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (tenant_id, identifier)
);

CREATE TABLE IF NOT EXISTS symbol_stats (
    tenant_id TEXT NOT NULL,
    symbol TEXT NOT NULL,
    frequency INTEGER NOT NULL DEFAULT 0,
    pattern_member_frequency INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (tenant_id, symbol)
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);
"#;

/// Apply every migration newer than the schema's current recorded version.
pub fn apply_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| row.get(0))
        .unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [migration.version],
            )?;
        }
    }
    Ok(())
}
