// src/db/models.rs

//! Data models for ploc database entities
//!
//! This module defines the `Package` record that corresponds to the `package`
//! table and provides methods for creating, reading and deleting records.
//! There is no update: reinstalling to the same name/path is a conflict.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::path::PathBuf;

/// Group assigned when the installer does not name one
pub const DEFAULT_GROUP: &str = "none";

const SELECT_PACKAGE: &str = "SELECT id, name, pgroup, path, sha256 FROM package";

/// A Package is one installed artifact: `name` living under directory `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: Option<i64>,
    pub name: String,
    pub group: String,
    pub path: String,
    pub sha256: Option<String>,
}

impl Package {
    /// Create a new Package in the default group
    pub fn new(name: String, path: String) -> Self {
        Self {
            id: None,
            name,
            group: DEFAULT_GROUP.to_string(),
            path,
            sha256: None,
        }
    }

    /// Filesystem location of the installed artifact
    pub fn location(&self) -> PathBuf {
        PathBuf::from(&self.path).join(&self.name)
    }

    /// Insert this package into the database
    ///
    /// Performs no uniqueness check; callers go through the conflict resolver
    /// first.
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO package (name, pgroup, path, sha256) VALUES (?1, ?2, ?3, ?4)",
            params![&self.name, &self.group, &self.path, &self.sha256],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find the package recorded under exactly this name and path
    pub fn find_exact(conn: &Connection, name: &str, path: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE name = ?1 AND path = ?2 ORDER BY id LIMIT 1",
            SELECT_PACKAGE
        ))?;

        let package = stmt.query_row([name, path], Self::from_row).optional()?;

        Ok(package)
    }

    /// Stream every package named `name` to `visit`, in insertion order
    ///
    /// Rows are read from the live cursor one at a time; an error from
    /// `visit` stops the scan.
    pub fn for_each_by_name<F>(conn: &Connection, name: &str, mut visit: F) -> Result<()>
    where
        F: FnMut(Self) -> Result<()>,
    {
        let mut stmt = conn.prepare(&format!("{} WHERE name = ?1 ORDER BY id", SELECT_PACKAGE))?;

        for package in stmt.query_map([name], Self::from_row)? {
            visit(package?)?;
        }

        Ok(())
    }

    /// Find packages by name, in insertion order
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut packages = Vec::new();

        Self::for_each_by_name(conn, name, |package| {
            packages.try_reserve(1)?;
            packages.push(package);
            Ok(())
        })?;

        Ok(packages)
    }

    /// List all packages, in insertion order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_PACKAGE))?;

        let packages = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Load the stored metadata for an exact name/path pair
    pub fn load_group_and_path(conn: &Connection, name: &str, path: &str) -> Result<Self> {
        Self::find_exact(conn, name, path)?
            .ok_or_else(|| Error::NotFound(format!("{}{}", path, name)))
    }

    /// Delete the package(s) recorded under this name and path
    ///
    /// Returns the number of rows removed; zero is not an error.
    pub fn delete(conn: &Connection, name: &str, path: &str) -> Result<usize> {
        let removed = conn.execute(
            "DELETE FROM package WHERE name = ?1 AND path = ?2",
            [name, path],
        )?;
        Ok(removed)
    }

    /// Convert a database row to a Package
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let group: Option<String> = row.get(2)?;

        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            group: group.unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            path: row.get(3)?,
            sha256: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_package_crud() {
        let (_temp, conn) = create_test_db();

        let mut package = Package::new("foo".to_string(), "/a/".to_string());
        let id = package.insert(&conn).unwrap();
        assert!(id > 0);
        assert_eq!(package.id, Some(id));

        let found = Package::find_exact(&conn, "foo", "/a/").unwrap().unwrap();
        assert_eq!(found.id, Some(id));
        assert_eq!(found.group, "none");
        assert_eq!(found.location(), PathBuf::from("/a/foo"));

        let all = Package::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);

        let removed = Package::delete(&conn, "foo", "/a/").unwrap();
        assert_eq!(removed, 1);
        assert!(Package::find_exact(&conn, "foo", "/a/").unwrap().is_none());
    }

    #[test]
    fn test_find_exact_requires_both_name_and_path() {
        let (_temp, conn) = create_test_db();

        Package::new("foo".to_string(), "/a/".to_string())
            .insert(&conn)
            .unwrap();

        assert!(Package::find_exact(&conn, "foo", "/b/").unwrap().is_none());
        assert!(Package::find_exact(&conn, "bar", "/a/").unwrap().is_none());
    }

    #[test]
    fn test_find_by_name_preserves_insertion_order() {
        let (_temp, conn) = create_test_db();

        for path in ["/p0/", "/p1/", "/p2/"] {
            Package::new("bar".to_string(), path.to_string())
                .insert(&conn)
                .unwrap();
        }
        Package::new("other".to_string(), "/p1/".to_string())
            .insert(&conn)
            .unwrap();

        let paths: Vec<String> = Package::find_by_name(&conn, "bar")
            .unwrap()
            .into_iter()
            .map(|p| p.path)
            .collect();
        assert_eq!(paths, vec!["/p0/", "/p1/", "/p2/"]);
    }

    #[test]
    fn test_for_each_by_name_stops_on_error() {
        let (_temp, conn) = create_test_db();

        for path in ["/p0/", "/p1/"] {
            Package::new("bar".to_string(), path.to_string())
                .insert(&conn)
                .unwrap();
        }

        let mut seen = 0;
        let result = Package::for_each_by_name(&conn, "bar", |_| {
            seen += 1;
            Err(Error::NotFound("stop".to_string()))
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let (_temp, conn) = create_test_db();

        let mut first = Package::new("foo".to_string(), "/a/".to_string());
        let first_id = first.insert(&conn).unwrap();
        Package::delete(&conn, "foo", "/a/").unwrap();

        let mut second = Package::new("foo".to_string(), "/a/".to_string());
        let second_id = second.insert(&conn).unwrap();
        assert!(second_id > first_id);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (_temp, conn) = create_test_db();

        let removed = Package::delete(&conn, "ghost", "/nowhere/").unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_load_group_and_path() {
        let (_temp, conn) = create_test_db();

        let mut package = Package::new("tool".to_string(), "/opt/bin/".to_string());
        package.group = "devel".to_string();
        package.sha256 = Some("abc123".to_string());
        package.insert(&conn).unwrap();

        let loaded = Package::load_group_and_path(&conn, "tool", "/opt/bin/").unwrap();
        assert_eq!(loaded.group, "devel");
        assert_eq!(loaded.path, "/opt/bin/");
        assert_eq!(loaded.sha256.as_deref(), Some("abc123"));

        let missing = Package::load_group_and_path(&conn, "tool", "/usr/bin/");
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
