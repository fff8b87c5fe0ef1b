use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

/// Ordered, duplicate-free list of machine names an operation acts upon.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetList(Vec<String>);

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `name` after normalizing it. Returns `false` when the name is
    /// empty after normalization or already present.
    pub fn push(&mut self, name: &str) -> bool {
        let Some(name) = normalize_machine_name(name) else {
            return false;
        };
        if self.0.contains(&name) {
            return false;
        }
        self.0.push(name);
        true
    }

    /// Parse a comma-separated list such as `"A, B, \"C\""`.
    pub fn from_csv(list: &str) -> Self {
        let mut targets = Self::new();
        for item in list.split(',') {
            targets.push(item);
        }
        targets
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: AsRef<str>> FromIterator<S> for TargetList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut targets = Self::new();
        for name in iter {
            targets.push(name.as_ref());
        }
        targets
    }
}

impl<S: AsRef<str>> Extend<S> for TargetList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.push(name.as_ref());
        }
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Strip quote characters and surrounding whitespace; `None` if nothing is left.
pub fn normalize_machine_name(raw: &str) -> Option<String> {
    let name = raw.replace('"', "");
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Where the target list comes from before falling back to discovery.
#[derive(Debug, Clone, Default)]
pub struct TargetSource {
    /// Comma-separated explicit list.
    pub vmlist: Option<String>,
    /// Newline-delimited VM file.
    pub vmfile: Option<PathBuf>,
}

impl TargetSource {
    /// Combine the explicit list and the VM file, list entries first.
    /// An empty result means "all machines" and must be discovered.
    pub fn collect(&self) -> Result<TargetList> {
        let mut targets = self
            .vmlist
            .as_deref()
            .map(TargetList::from_csv)
            .unwrap_or_default();
        if let Some(path) = &self.vmfile {
            targets.extend(read_vm_file(path)?);
        }
        Ok(targets)
    }
}

/// Read machine names from `path`, one per line. Blank lines and lines
/// starting with `#` are skipped.
pub fn read_vm_file(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).map_err(|source| Error::ReadVmFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_vm_file(&contents))
}

pub fn parse_vm_file(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
