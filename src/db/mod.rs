// src/db/mod.rs

//! Database layer for ploc
//!
//! This module handles all SQLite operations including:
//! - Opening the registry file and setting pragmas
//! - Schema creation on first use
//! - Transaction handling
//! - The `Registry` store handed to the resolver and installer

pub mod models;
pub mod schema;

use crate::error::{Error, Result};
use models::Package;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::{debug, info};

/// Registry location used when neither `--db-path` nor `PLOC_DB` is given
pub const DEFAULT_DB_PATH: &str = "/var/local/ploc.db";

/// Open (creating if needed) the SQLite file at `db_path`
///
/// Creates missing parent directories. Does not touch the schema; see
/// [`Registry::initialize`].
pub fn open(db_path: &str) -> Result<Connection> {
    debug!("Opening database at: {}", db_path);

    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::DatabaseOpen(format!("Failed to create database directory: {}", e))
        })?;
    }

    let conn = Connection::open(db_path)?;

    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )?;

    Ok(conn)
}

/// Run `f` inside a transaction, committing on success
///
/// The transaction rolls back when `f` returns an error.
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// The package registry: owner of the connection and every `Package` row
///
/// Constructed once per process and passed by reference to the conflict
/// resolver and installer.
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open the registry file at `db_path` and bring its schema up to date
    pub fn open(db_path: &str) -> Result<Self> {
        let registry = Self { conn: open(db_path)? };
        registry.initialize()?;
        info!("Registry ready at {}", db_path);
        Ok(registry)
    }

    /// Open a throwaway registry held in memory
    pub fn open_in_memory() -> Result<Self> {
        let registry = Self {
            conn: Connection::open_in_memory()?,
        };
        registry.initialize()?;
        Ok(registry)
    }

    /// Ensure the schema exists; safe to call any number of times
    pub fn initialize(&self) -> Result<()> {
        schema::migrate(&self.conn).map_err(|e| Error::StoreUnavailable(e.to_string()))
    }

    /// Record a new package, assigning its id
    pub fn insert(&self, package: &mut Package) -> Result<i64> {
        let id = package.insert(&self.conn)?;
        debug!("Recorded {} at {} (id {})", package.name, package.path, id);
        Ok(id)
    }

    /// Remove the record(s) for this exact name/path; zero rows is fine
    pub fn delete(&self, name: &str, path: &str) -> Result<usize> {
        let removed = Package::delete(&self.conn, name, path)?;
        debug!("Deleted {} record(s) for {}{}", removed, path, name);
        Ok(removed)
    }

    pub fn find_exact(&self, name: &str, path: &str) -> Result<Option<Package>> {
        Package::find_exact(&self.conn, name, path)
    }

    /// Visit every record named `name` in insertion order
    pub fn for_each_by_name<F>(&self, name: &str, visit: F) -> Result<()>
    where
        F: FnMut(Package) -> Result<()>,
    {
        Package::for_each_by_name(&self.conn, name, visit)
    }

    pub fn find_by_name(&self, name: &str) -> Result<Vec<Package>> {
        Package::find_by_name(&self.conn, name)
    }

    pub fn load_group_and_path(&self, name: &str, path: &str) -> Result<Package> {
        Package::load_group_and_path(&self.conn, name, path)
    }

    pub fn list_all(&self) -> Result<Vec<Package>> {
        Package::list_all(&self.conn)
    }

    /// Run `f` against the registry connection inside one transaction
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction) -> Result<T>,
    {
        transaction(&mut self.conn, f)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
