// src/resolver.rs

//! Conflict resolution for install and remove
//!
//! Before an install the resolver refuses any (name, path) pair already in the
//! registry. Before a remove it narrows the records sharing a name down to a
//! single target, asking a [`Chooser`] when more than one remains.

use crate::db::Registry;
use crate::db::models::Package;
use crate::error::{Error, Result};
use crate::request::PackageRequest;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use tracing::{debug, warn};

/// Picks one package out of several sharing a name
///
/// `select` is called repeatedly until it yields an index below the number of
/// candidates. `None` means the answer could not be read as an index.
pub trait Chooser {
    /// Show the candidates, numbered from 0 in the order given
    fn present(&mut self, name: &str, candidates: &[Package]) -> Result<()>;

    /// Read one answer
    fn select(&mut self, count: usize) -> Result<Option<usize>>;

    /// Called after `select` returned an unusable answer
    fn reject(&mut self, _answer: Option<usize>, _count: usize) -> Result<()> {
        Ok(())
    }
}

/// Interactive chooser: numbered list and prompt on `output`, answers from `input`
pub struct ConsoleChooser<R, W> {
    input: R,
    output: W,
}

impl ConsoleChooser<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr and read answers from stdin
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConsoleChooser<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Chooser for ConsoleChooser<R, W> {
    fn present(&mut self, name: &str, candidates: &[Package]) -> Result<()> {
        writeln!(self.output, "Multiple packages named '{}' found:", name)?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(self.output, "  {}\t{}", index, candidate.path)?;
        }
        Ok(())
    }

    fn select(&mut self, count: usize) -> Result<Option<usize>> {
        write!(self.output, "Select index of one [0-{}]: ", count.saturating_sub(1))?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::NoSelection("input closed".to_string()));
        }

        Ok(line.trim().parse().ok())
    }

    fn reject(&mut self, answer: Option<usize>, count: usize) -> Result<()> {
        match answer {
            Some(index) => writeln!(
                self.output,
                "ploc: {} is out of range, pick 0 to {}",
                index,
                count.saturating_sub(1)
            )?,
            None => writeln!(self.output, "ploc: enter a number")?,
        }
        Ok(())
    }
}

/// Chooser fed from a fixed list of answers
///
/// Records what it was shown. Running out of answers is an error rather than
/// a default pick.
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    answers: VecDeque<Option<usize>>,
    /// `(index, path)` pairs from the last `present` call
    pub presented: Vec<(usize, String)>,
    /// Number of answers that were turned down
    pub rejected: usize,
}

impl ScriptedChooser {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        Self {
            answers: answers.into_iter().map(Some).collect(),
            ..Self::default()
        }
    }

    /// Queue an answer that does not parse as an index
    pub fn push_garbage(&mut self) {
        self.answers.push_back(None);
    }
}

impl Chooser for ScriptedChooser {
    fn present(&mut self, _name: &str, candidates: &[Package]) -> Result<()> {
        self.presented = candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| (index, candidate.path.clone()))
            .collect();
        Ok(())
    }

    fn select(&mut self, _count: usize) -> Result<Option<usize>> {
        self.answers
            .pop_front()
            .ok_or_else(|| Error::NoSelection("no answers left".to_string()))
    }

    fn reject(&mut self, _answer: Option<usize>, _count: usize) -> Result<()> {
        self.rejected += 1;
        Ok(())
    }
}

/// Gatekeeper between requests and registry mutations
pub struct ConflictResolver<'a> {
    registry: &'a Registry,
}

impl<'a> ConflictResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Refuse an install whose name/path pair is already recorded
    pub fn check_install(&self, package: &Package) -> Result<()> {
        if let Some(existing) = self.registry.find_exact(&package.name, &package.path)? {
            debug!(
                "Install of {} blocked by record {:?} at {}",
                package.name, existing.id, existing.path
            );
            return Err(Error::Conflict {
                name: existing.name,
                path: existing.path,
            });
        }
        Ok(())
    }

    /// Find the single record a remove (or lookup) of `request` refers to
    ///
    /// All records sharing the name are candidates, narrowed to the
    /// requested directory if one was given. Several candidates go to
    /// `chooser`.
    pub fn resolve_target(
        &self,
        request: &PackageRequest,
        chooser: &mut dyn Chooser,
    ) -> Result<Package> {
        let mut candidates = Vec::new();
        self.registry.for_each_by_name(&request.name, |package| {
            if request.path.as_ref().is_none_or(|path| *path == package.path) {
                candidates.try_reserve(1)?;
                candidates.push(package);
            }
            Ok(())
        })?;

        match candidates.len() {
            0 => Err(Error::NotFound(request.to_string())),
            1 => candidates
                .pop()
                .ok_or_else(|| Error::NotFound(request.to_string())),
            count => {
                debug!("{} records named {}", count, request.name);
                let index = disambiguate(&request.name, &candidates, chooser)?;
                Ok(candidates.swap_remove(index))
            }
        }
    }
}

/// Ask `chooser` until it returns an index in `[0, candidates.len())`
fn disambiguate(name: &str, candidates: &[Package], chooser: &mut dyn Chooser) -> Result<usize> {
    let count = candidates.len();
    chooser.present(name, candidates)?;

    loop {
        match chooser.select(count)? {
            Some(index) if index < count => return Ok(index),
            answer => {
                warn!("Rejected selection {:?} for {} candidates", answer, count);
                chooser.reject(answer, count)?;
            }
        }
    }
}
