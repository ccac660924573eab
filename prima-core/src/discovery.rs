use log::debug;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DiscoveryError;
use crate::scenario::{ScenarioEntry, ScenarioReference};

/// Finds scenario files in a directory and orders them canonically.
#[derive(Debug, Clone)]
pub struct ScenarioDiscovery {
    root: PathBuf,
    pattern: String,
}

impl ScenarioDiscovery {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List the files directly under the root whose name matches the glob,
    /// sorted lexicographically by file name.
    ///
    /// # Errors
    ///
    /// Fails if the root is missing or unreadable, or if the pattern is invalid.
    pub fn discover(&self) -> Result<Vec<ScenarioReference>, DiscoveryError> {
        let matcher = glob_to_regex(&self.pattern)?;
        if !self.root.is_dir() {
            return Err(DiscoveryError::MissingDirectory {
                path: self.root.clone(),
            });
        }

        let io_err = |source| DiscoveryError::Io {
            path: self.root.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            if !entry.file_type().map_err(io_err)?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if matcher.is_match(&name) {
                names.push(name);
            }
        }
        names.sort();
        debug!(
            "discovered {} scenario(s) matching {:?} in {}",
            names.len(),
            self.pattern,
            self.root.display()
        );

        Ok(names
            .into_iter()
            .map(|name| ScenarioReference::from_path(self.root.join(name)))
            .collect())
    }

    /// Discover and parse every scenario, keeping discovery order.
    ///
    /// # Errors
    ///
    /// Propagates discovery errors and the first scenario that fails to load.
    pub fn discover_and_load(&self) -> Result<Vec<ScenarioEntry>, DiscoveryError> {
        load(self.discover()?)
    }
}

/// Parse each referenced scenario once.
///
/// # Errors
///
/// Returns the first [`DiscoveryError::InvalidScenario`] encountered.
pub fn load(references: Vec<ScenarioReference>) -> Result<Vec<ScenarioEntry>, DiscoveryError> {
    references.into_iter().map(ScenarioEntry::load).collect()
}

/// Compile a file-name glob (`*`, `**`, `?`, `[...]`, `[!...]`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, DiscoveryError> {
    let invalid = |reason: &str| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                if chars.peek() == Some(&'!') {
                    chars.next();
                    out.push('^');
                }
                // A leading `]` is a member, not the end of the class.
                let mut members = Vec::new();
                if chars.peek() == Some(&']') {
                    chars.next();
                    members.push(']');
                }
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    members.push(inner);
                }
                if !closed || members.is_empty() {
                    return Err(invalid("unterminated character class"));
                }
                push_class_members(&mut out, &members);
                out.push(']');
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| invalid(&e.to_string()))
}

/// Emit glob class members as escaped regex items; `a-z` stays a range and
/// every other character, `-` included, is literal.
fn push_class_members(out: &mut String, members: &[char]) {
    let escaped = |c: char| regex::escape(&c.to_string());
    let mut i = 0;
    while i < members.len() {
        if i + 2 < members.len() && members[i + 1] == '-' {
            out.push_str(&escaped(members[i]));
            out.push('-');
            out.push_str(&escaped(members[i + 2]));
            i += 3;
        } else {
            out.push_str(&escaped(members[i]));
            i += 1;
        }
    }
}
