//! Readers for property resources.
//!
//! Two independent readers live here:
//!
//! - [`read_property`] is the flat reader used for database settings. It
//!   re-opens the resource on every call and matches keys loosely: a line
//!   matches when it contains the key *anywhere*, the value starts one
//!   character past the key length, and the last matching line wins.
//! - [`load_properties`] / [`read_standard_property`] parse the conventional
//!   `key=value` format (comments, continuations, escapes).
//!
//! Neither reader caches anything.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, Result};

/// A property resource loaded for a single lookup.
///
/// Holds the raw lines of the file; the file handle is closed as soon as
/// [`PropertySource::open`] returns.
#[derive(Debug, Clone)]
pub struct PropertySource {
    path: PathBuf,
    lines: Vec<String>,
}

impl PropertySource {
    /// Read every line of `path`. Lines end at `\n`, `\r\n` or a lone `\r`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| ConfigError::from_io(path, err))?;
        let lines = split_lines(&bytes)
            .into_iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            lines,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Value for `key` using the loose matching rule (substring anywhere,
    /// last match wins, no trimming).
    pub fn lookup(&self, key: &str) -> Result<String> {
        self.lines
            .iter()
            .rev()
            .find(|line| line.contains(key))
            .map(|line| value_after_key(line, key))
            .ok_or_else(|| {
                debug!(key, path = %self.path.display(), "property not found");
                ConfigError::property_not_found(key, &self.path)
            })
    }
}

/// Read a single property from a flat property resource.
///
/// The resource is opened, scanned in full and closed on every call.
pub fn read_property(resource: impl AsRef<Path>, key: &str) -> Result<String> {
    PropertySource::open(resource)?.lookup(key)
}

fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            b'\n' => {
                lines.push(&bytes[start..idx]);
                idx += 1;
            }
            b'\r' => {
                lines.push(&bytes[start..idx]);
                idx += 1;
                if bytes.get(idx) == Some(&b'\n') {
                    idx += 1;
                }
            }
            _ => {
                idx += 1;
                continue;
            }
        }
        start = idx;
    }

    if start < bytes.len() {
        lines.push(&bytes[start..]);
    }
    lines
}

// Counted in characters so a multi-byte separator never splits a code point.
// A line too short to hold the separator yields an empty value.
fn value_after_key(line: &str, key: &str) -> String {
    line.chars().skip(key.chars().count() + 1).collect()
}

// ============================================================================
// Standard properties format
// ============================================================================

/// Load a conventional properties file into a map.
pub fn load_properties(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|err| ConfigError::from_io(path, err))?;
    Ok(parse_properties(&String::from_utf8_lossy(&bytes)))
}

/// Read one key from a conventional properties file.
///
/// A missing key is `Ok(None)`; a missing file is still an error.
pub fn read_standard_property(path: impl AsRef<Path>, key: &str) -> Result<Option<String>> {
    Ok(load_properties(path)?.remove(key))
}

/// Parse properties text. Later duplicates override earlier ones.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut props = HashMap::new();
    let mut lines = text.lines();

    while let Some(raw) = lines.next() {
        let mut logical = raw.trim_start_matches(is_blank).to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }

        while has_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start_matches(is_blank)),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        props.insert(unescape(key), unescape(value));
    }

    props
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (idx, c) in line.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '=' || c == ':' || is_blank(c) {
            key_end = idx;
            break;
        }
    }

    let mut rest = line[key_end..].trim_start_matches(is_blank);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }

    (&line[..key_end], rest)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    // Malformed escapes are kept as written.
                    _ => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
