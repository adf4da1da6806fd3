// src/installer.rs

//! Install/remove orchestration
//!
//! Sequences the filesystem and registry halves of each operation:
//!
//! - install: open source, check conflicts, stage + chmod + rename, then record
//! - remove: resolve target, delete record, then unlink
//!
//! A failure after the rename in install leaves a file with no record; a
//! failure of the unlink in remove leaves a file whose record is already
//! gone. Both are reported and left for the operator to clean up.

use crate::db::Registry;
use crate::db::models::Package;
use crate::error::{Error, Result};
use crate::filesystem;
use crate::request::{self, PackageRequest};
use crate::resolver::{Chooser, ConflictResolver};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// Caller-level switches for install
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Overwrite a package already recorded at the same name/path
    pub force: bool,
}

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub package: Package,
    pub bytes: u64,
    /// An existing record for the same name/path was replaced
    pub replaced: bool,
}

/// State of one installed artifact compared with its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Ok,
    /// Recorded but absent from disk
    Missing,
    /// Contents differ from the hash taken at install time
    Modified,
    /// Recorded without a hash
    Unverified,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub package: Package,
    pub status: VerifyStatus,
}

/// Runs package operations against one registry
pub struct Installer<'a> {
    registry: &'a mut Registry,
}

impl<'a> Installer<'a> {
    pub fn new(registry: &'a mut Registry) -> Self {
        Self { registry }
    }

    /// Copy `source` to `package.location()` and record it
    pub fn install(
        &mut self,
        mut package: Package,
        source: &Path,
        options: InstallOptions,
    ) -> Result<InstallReport> {
        package.path = request::normalize_dir(&package.path)?;
        info!(
            "Installing {} from {} to {}",
            package.name,
            source.display(),
            package.path
        );

        let source_file = filesystem::open_source(source)?;

        let replaced = match ConflictResolver::new(self.registry).check_install(&package) {
            Ok(()) => false,
            Err(Error::Conflict { name, path }) if options.force => {
                warn!("Overwriting {}{} (forced)", path, name);
                true
            }
            Err(e) => return Err(e),
        };

        let location = package.location();
        let staged = filesystem::stage(source_file, &location)?;
        let bytes = staged.size;
        package.sha256 = Some(staged.sha256.clone());
        staged.commit(&location)?;

        let recorded = self.registry.transaction(|tx| {
            if replaced {
                Package::delete(tx, &package.name, &package.path)?;
            }
            package.insert(tx)
        });

        if let Err(e) = recorded {
            error!(
                "{} is on disk but could not be recorded; retry with --force",
                location.display()
            );
            return Err(e);
        }

        info!("Installed {} ({} bytes)", location.display(), bytes);
        Ok(InstallReport {
            package,
            bytes,
            replaced,
        })
    }

    /// Forget a package and delete its file
    pub fn remove(
        &mut self,
        request: &PackageRequest,
        chooser: &mut dyn Chooser,
    ) -> Result<Package> {
        let target = ConflictResolver::new(self.registry).resolve_target(request, chooser)?;
        info!("Removing {} from {}", target.name, target.path);

        self.registry.delete(&target.name, &target.path)?;

        let location = target.location();
        if let Err(e) = filesystem::remove(&location) {
            warn!(
                "Record for {} removed but the file was not; delete it by hand",
                location.display()
            );
            return Err(e);
        }

        Ok(target)
    }

    /// Stored metadata for the package `request` refers to
    pub fn describe(
        &self,
        request: &PackageRequest,
        chooser: &mut dyn Chooser,
    ) -> Result<Package> {
        let target = ConflictResolver::new(self.registry).resolve_target(request, chooser)?;
        self.registry.load_group_and_path(&target.name, &target.path)
    }

    /// Every directory `name` is installed in, in install order
    pub fn search_all(&self, name: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        self.registry.for_each_by_name(name, |package| {
            paths.push(package.path);
            Ok(())
        })?;
        Ok(paths)
    }

    /// Whether exactly this name/path pair is recorded
    pub fn search_unique(&self, name: &str, path: &str) -> Result<bool> {
        let path = request::normalize_dir(path)?;
        Ok(self.registry.find_exact(name, &path)?.is_some())
    }

    pub fn list_all(&self) -> Result<Vec<Package>> {
        self.registry.list_all()
    }

    /// Compare installed files with their records
    ///
    /// Checks every record, or only those named `name`.
    pub fn verify(&self, name: Option<&str>) -> Result<Vec<VerifyReport>> {
        let packages = match name {
            Some(name) => self.registry.find_by_name(name)?,
            None => self.registry.list_all()?,
        };

        let mut reports = Vec::with_capacity(packages.len());
        for package in packages {
            let status = verify_one(&package)?;
            if status != VerifyStatus::Ok {
                warn!("{}: {:?}", package.location().display(), status);
            }
            reports.push(VerifyReport { package, status });
        }

        Ok(reports)
    }
}

fn verify_one(package: &Package) -> Result<VerifyStatus> {
    let location = package.location();
    if !location.is_file() {
        return Ok(VerifyStatus::Missing);
    }

    let Some(expected) = &package.sha256 else {
        return Ok(VerifyStatus::Unverified);
    };

    if filesystem::hash_file(&location)? == *expected {
        Ok(VerifyStatus::Ok)
    } else {
        Ok(VerifyStatus::Modified)
    }
}
