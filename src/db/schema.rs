// src/db/schema.rs

//! Database schema definitions and migrations for ploc
//!
//! This module defines the SQLite schema for the package registry and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        debug!("Schema is up to date");
        return Ok(());
    }

    // Each step and its version row commit together
    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        let tx = conn.unchecked_transaction()?;
        apply_migration(&tx, version)?;
        set_schema_version(&tx, version)?;
        tx.commit()?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::StoreUnavailable(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// - package: one row per installed artifact
/// - path: reserved for tracking install prefixes, not queried yet
///
/// `IF NOT EXISTS` keeps registries created by earlier ploc builds (which had
/// no schema_version table) usable.
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS package (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name VARCHAR(20) NOT NULL,
            pgroup VARCHAR(20) DEFAULT 'none',
            path VARCHAR(255) DEFAULT '' NOT NULL
        );

        CREATE TABLE IF NOT EXISTS path (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name VARCHAR(255) NOT NULL
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}

/// Schema Version 2: content hashes and lookup index
///
/// Adds the sha256 column used by verify and an index over (name, path).
/// The index is deliberately not UNIQUE: duplicates are rejected before
/// insert, and pre-existing registries may already hold some.
fn migrate_v2(conn: &Connection) -> Result<()> {
    debug!("Migrating to schema version 2");

    conn.execute_batch(
        "
        ALTER TABLE package ADD COLUMN sha256 TEXT;

        CREATE INDEX IF NOT EXISTS idx_package_name_path ON package(name, path);
        ",
    )?;

    info!("Schema version 2 applied successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_schema_version_tracking() {
        let (_temp, conn) = create_test_db();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 0);

        set_schema_version(&conn, 1).unwrap();
        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let (_temp, conn) = create_test_db();

        migrate(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"package".to_string()));
        assert!(tables.contains(&"path".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();

        for _ in 0..3 {
            migrate(&conn).unwrap();
        }

        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, SCHEMA_VERSION as i64);
    }

    #[test]
    fn test_migrate_upgrades_unversioned_registry() {
        let (_temp, conn) = create_test_db();

        // Layout written by builds that predate schema_version
        conn.execute_batch(
            "CREATE TABLE package (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                name VARCHAR(20) NOT NULL,
                pgroup VARCHAR(20) DEFAULT 'none',
                path VARCHAR(255) DEFAULT '' NOT NULL
            );
            INSERT INTO package (name, path) VALUES ('legacy', '/usr/local/bin/');",
        )
        .unwrap();

        migrate(&conn).unwrap();

        let (group, sha256): (String, Option<String>) = conn
            .query_row(
                "SELECT pgroup, sha256 FROM package WHERE name = 'legacy'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(group, "none");
        assert!(sha256.is_none());
    }

    #[test]
    fn test_failed_migration_leaves_no_partial_step() {
        let (_temp, conn) = create_test_db();

        // A v1 registry where the v2 index name is already taken by a table
        init_schema_version(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        conn.execute("CREATE TABLE idx_package_name_path (x INTEGER)", [])
            .unwrap();

        assert!(migrate(&conn).is_err());
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
        assert!(
            conn.prepare("SELECT sha256 FROM package").is_err(),
            "ALTER TABLE from the failed step must be rolled back"
        );

        // Once the obstacle is gone the same step applies cleanly
        conn.execute("DROP TABLE idx_package_name_path", []).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert!(conn.prepare("SELECT sha256 FROM package").is_ok());
    }

    #[test]
    fn test_package_group_defaults_to_none() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO package (name, path) VALUES (?1, ?2)",
            ["foo", "/a/"],
        )
        .unwrap();

        let group: String = conn
            .query_row("SELECT pgroup FROM package WHERE name = 'foo'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(group, "none");
    }

    #[test]
    fn test_migrate_fails_on_readonly_database() {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open_with_flags(
            temp_file.path(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .unwrap();

        assert!(migrate(&conn).is_err());
    }
}
