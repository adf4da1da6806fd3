// src/request.rs

//! Package descriptors built from command-line operands
//!
//! An operand is either a bare name (`foo`) or a location (`/usr/local/bin/foo`).
//! Locations are split at the last `/` into a directory, kept with its
//! trailing slash, and a name.

use crate::db::models::Package;
use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Longest accepted package name
pub const MAX_NAME_LEN: usize = 20;

/// Longest accepted group label
pub const MAX_GROUP_LEN: usize = 20;

/// Longest accepted install directory
pub const MAX_PATH_LEN: usize = 255;

/// What the operator asked for: a name, optionally pinned to a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRequest {
    pub name: String,
    pub path: Option<String>,
}

impl PackageRequest {
    /// Parse `foo` or `/dir/foo`
    pub fn parse(operand: &str) -> Result<Self> {
        match operand.rfind('/') {
            Some(idx) => {
                let (dir, name) = operand.split_at(idx + 1);
                validate_name(name)?;
                Ok(Self {
                    name: name.to_string(),
                    path: Some(normalize_dir(dir)?),
                })
            }
            None => {
                validate_name(operand)?;
                Ok(Self {
                    name: operand.to_string(),
                    path: None,
                })
            }
        }
    }

    /// The directory, for operations that need an exact name/path pair
    pub fn require_path(&self) -> Result<&str> {
        self.path.as_deref().ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} needs a directory, e.g. /usr/local/bin/{}",
                self.name, self.name
            ))
        })
    }
}

impl fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}{}", path, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Build the record an install of `source` to `destination` would create
///
/// `destination` must be absolute. A trailing `/` marks it as a directory,
/// in which case the package takes the source's file name.
pub fn install_target(source: &Path, destination: &str, group: Option<&str>) -> Result<Package> {
    if !destination.starts_with('/') {
        return Err(Error::InvalidArgument(format!(
            "Destination must be an absolute path: {}",
            destination
        )));
    }

    let request = if destination.ends_with('/') {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Cannot derive a package name from {}",
                    source.display()
                ))
            })?;
        validate_name(name)?;
        PackageRequest {
            name: name.to_string(),
            path: Some(normalize_dir(destination)?),
        }
    } else {
        PackageRequest::parse(destination)?
    };

    let path = request.require_path()?.to_string();
    let mut package = Package::new(request.name, path);
    if let Some(group) = group {
        validate_group(group)?;
        package.group = group.to_string();
    }

    Ok(package)
}

/// Lexically normalize a directory so one location has one spelling
///
/// Repeated slashes and `.` components are dropped and the result ends in
/// exactly one `/`. `..` is refused rather than resolved, since the
/// directory may not exist yet.
pub fn normalize_dir(dir: &str) -> Result<String> {
    let mut components = Vec::new();
    for component in dir.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                return Err(Error::InvalidArgument(format!(
                    "Path may not contain '..': {}",
                    dir
                )));
            }
            other => components.push(other),
        }
    }

    let normalized = match (dir.starts_with('/'), components.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}/", components.join("/")),
        (false, true) => "./".to_string(),
        (false, false) => format!("{}/", components.join("/")),
    };

    if normalized.len() > MAX_PATH_LEN {
        return Err(Error::InvalidArgument(format!(
            "Path longer than {} characters: {}",
            MAX_PATH_LEN, dir
        )));
    }

    Ok(normalized)
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("Package name is empty".to_string()));
    }
    if name == "." || name == ".." || name.contains('/') {
        return Err(Error::InvalidArgument(format!(
            "Invalid package name: {}",
            name
        )));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidArgument(format!(
            "Package name longer than {} characters: {}",
            MAX_NAME_LEN, name
        )));
    }
    Ok(())
}

fn validate_group(group: &str) -> Result<()> {
    if group.is_empty() || group.chars().count() > MAX_GROUP_LEN {
        return Err(Error::InvalidArgument(format!(
            "Group must be 1 to {} characters: {:?}",
            MAX_GROUP_LEN, group
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::DEFAULT_GROUP;

    #[test]
    fn test_parse_bare_name() {
        let request = PackageRequest::parse("foo").unwrap();
        assert_eq!(request.name, "foo");
        assert_eq!(request.path, None);
        assert!(request.require_path().is_err());
    }

    #[test]
    fn test_parse_location() {
        let request = PackageRequest::parse("/usr/local/bin/foo").unwrap();
        assert_eq!(request.name, "foo");
        assert_eq!(request.path.as_deref(), Some("/usr/local/bin/"));
        assert_eq!(request.to_string(), "/usr/local/bin/foo");
    }

    #[test]
    fn test_parse_collapses_repeated_slashes() {
        let request = PackageRequest::parse("/opt//foo").unwrap();
        assert_eq!(request.path.as_deref(), Some("/opt/"));
    }

    #[test]
    fn test_parse_rejects_bad_names() {
        assert!(PackageRequest::parse("").is_err());
        assert!(PackageRequest::parse("/usr/bin/").is_err());
        assert!(PackageRequest::parse("..").is_err());
        assert!(PackageRequest::parse("a-name-that-is-far-too-long").is_err());
    }

    #[test]
    fn test_install_target_with_file_destination() {
        let package =
            install_target(Path::new("build/tool"), "/usr/local/bin/mytool", None).unwrap();
        assert_eq!(package.name, "mytool");
        assert_eq!(package.path, "/usr/local/bin/");
        assert_eq!(package.group, DEFAULT_GROUP);
    }

    #[test]
    fn test_install_target_with_directory_destination() {
        let package =
            install_target(Path::new("build/tool"), "/usr/local/bin/", Some("devel")).unwrap();
        assert_eq!(package.name, "tool");
        assert_eq!(package.path, "/usr/local/bin/");
        assert_eq!(package.group, "devel");
    }

    #[test]
    fn test_install_target_requires_absolute_destination() {
        let result = install_target(Path::new("tool"), "bin/tool", None);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_install_target_rejects_long_group() {
        let result = install_target(
            Path::new("tool"),
            "/usr/local/bin/",
            Some("a-group-label-that-is-too-long"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir("/a").unwrap(), "/a/");
        assert_eq!(normalize_dir("/a/").unwrap(), "/a/");
        assert_eq!(normalize_dir("/").unwrap(), "/");
        assert_eq!(normalize_dir("//").unwrap(), "/");
        assert_eq!(normalize_dir("bin").unwrap(), "bin/");
        assert!(normalize_dir(&format!("/{}", "x".repeat(300))).is_err());
    }

    #[test]
    fn test_normalize_dir_gives_one_spelling_per_location() {
        for alias in ["/x/bin/", "/x/bin", "/x/bin/./", "/x//bin/", "/./x/bin//", "/x/./bin/."] {
            assert_eq!(normalize_dir(alias).unwrap(), "/x/bin/", "{}", alias);
        }
    }

    #[test]
    fn test_normalize_dir_rejects_parent_components() {
        assert!(matches!(
            normalize_dir("/x/bin/../lib/"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(install_target(Path::new("tool"), "/x/../bin/", None).is_err());
    }

    #[test]
    fn test_install_target_normalizes_aliases() {
        let plain = install_target(Path::new("tool"), "/x/bin/", None).unwrap();
        let dotted = install_target(Path::new("tool"), "/x/./bin//", None).unwrap();
        let named = install_target(Path::new("tool"), "/x//bin/./tool", None).unwrap();
        assert_eq!(plain.path, dotted.path);
        assert_eq!(plain.path, named.path);
        assert_eq!(named.name, "tool");
    }
}
