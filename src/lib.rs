// src/lib.rs

//! ploc: local package locator
//!
//! Records which binaries were installed, where, and under what name and
//! group, and keeps that record consistent with the filesystem across
//! install and remove.
//!
//! # Architecture
//!
//! - Database-first: all state in one SQLite file, no config files
//! - (name, path) is the identity of an installed package; names may repeat
//!   across directories
//! - Conflicts are resolved before anything is mutated; ambiguous removes are
//!   settled by an injected chooser
//! - Installs are staged and renamed into place before they are recorded

pub mod db;
mod error;
pub mod filesystem;
pub mod installer;
pub mod request;
pub mod resolver;

pub use db::Registry;
pub use db::models::Package;
pub use error::{Error, ExitStatus, Result};
pub use installer::{InstallOptions, InstallReport, Installer, VerifyReport, VerifyStatus};
pub use request::PackageRequest;
pub use resolver::{Chooser, ConflictResolver, ConsoleChooser, ScriptedChooser};
