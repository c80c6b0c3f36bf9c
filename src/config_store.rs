//! Line-oriented storage for dnsmasq directive files
//!
//! A managed file is a sequence of lines. Lines of the form
//! `directive=key,field,...` are records; everything else (comments, blank
//! lines, other directives) passes through untouched and keeps its position.
//! Writes go to a temporary file next to the target and are renamed into
//! place so the forwarder never reads a half-written file. Line endings are
//! kept as found, so a CRLF file stays CRLF.

use crate::error::PioneerResult;
use crate::file_lock::{self, parent_dir};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

/// A parsed `directive=key,fields...` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub key: String,
    pub fields: Vec<String>,
}

impl ConfigRecord {
    pub fn new(key: impl Into<String>, fields: Vec<String>) -> Self {
        Self { key: key.into(), fields }
    }

    /// Parse a line if it carries `directive`
    ///
    /// The directive name must match exactly, so `dhcp-host` never matches a
    /// `dhcp-hostsfile=` line.
    pub fn parse(line: &str, directive: &str) -> Option<Self> {
        let trimmed = line.trim();
        let (name, value) = trimmed.split_once('=')?;
        if name.trim() != directive {
            return None;
        }

        let mut values = value.split(',').map(|v| v.trim().to_string());
        let key = values.next().filter(|k| !k.is_empty())?;
        Some(Self {
            key,
            fields: values.collect(),
        })
    }

    pub fn to_line(&self, directive: &str) -> String {
        let mut line = format!("{}={}", directive, self.key);
        for field in &self.fields {
            line.push(',');
            line.push_str(field);
        }
        line
    }

    /// Key comparison used by upsert and remove
    pub fn has_key(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key.trim())
    }
}

fn line_has_key(line: &str, directive: &str, key: &str) -> bool {
    ConfigRecord::parse(line, directive)
        .map(|record| record.has_key(key))
        .unwrap_or(false)
}

/// Read all lines; a missing file is an empty file
///
/// Only `\n` separates lines: a trailing `\r` stays part of its line and is
/// written back by [`save`].
pub async fn load(path: &Path) -> PioneerResult<Vec<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content.split_terminator('\n').map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} does not exist yet, treating as empty", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Replace the first record for `key` with `new_line`, or append it
///
/// Later records with the same key are dropped so the key stays unique even
/// if the file was edited by hand. The new line takes the line ending of the
/// record it replaces, or of the last line when appended.
pub fn upsert(lines: Vec<String>, directive: &str, key: &str, new_line: String) -> Vec<String> {
    let append_crlf = lines.last().map(|l| l.ends_with('\r')).unwrap_or(false);
    let mut out = Vec::with_capacity(lines.len() + 1);
    let mut replacement = Some(new_line);
    let mut replaced = false;

    for line in lines {
        if line_has_key(&line, directive, key) {
            if let Some(new_line) = replacement.take() {
                out.push(with_ending(new_line, line.ends_with('\r')));
                replaced = true;
            }
        } else {
            out.push(line);
        }
    }

    if !replaced {
        if let Some(new_line) = replacement {
            out.push(with_ending(new_line, append_crlf));
        }
    }

    out
}

fn with_ending(mut line: String, crlf: bool) -> String {
    if crlf {
        line.push('\r');
    }
    line
}

/// Drop every record for `key`
pub fn remove(lines: Vec<String>, directive: &str, key: &str) -> Vec<String> {
    lines
        .into_iter()
        .filter(|line| !line_has_key(line, directive, key))
        .collect()
}

/// Records carrying `directive`, in file order
pub fn records<'a>(lines: &'a [String], directive: &'a str) -> impl Iterator<Item = ConfigRecord> + 'a {
    lines.iter().filter_map(move |line| ConfigRecord::parse(line, directive))
}

/// Lines that look like `directive=...` but do not parse as a record
pub fn malformed_lines<'a>(lines: &'a [String], directive: &'a str) -> impl Iterator<Item = &'a String> + 'a {
    lines.iter().filter(move |line| {
        let trimmed = line.trim();
        trimmed
            .split_once('=')
            .map(|(name, _)| name.trim() == directive)
            .unwrap_or(false)
            && ConfigRecord::parse(line, directive).is_none()
    })
}

/// Write lines with a trailing newline, atomically
pub async fn save(path: &Path, lines: &[String]) -> PioneerResult<()> {
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    write_atomic(path, content.as_bytes()).await
}

/// Write to a uniquely named sibling temp file, fsync, then rename over `path`
///
/// The original file's permissions are carried over to the replacement. The
/// temp name starts with a dot so dnsmasq's conf-dir never picks it up.
pub async fn write_atomic(path: &Path, content: &[u8]) -> PioneerResult<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent).await?;

    let target = path.to_path_buf();
    let bytes = content.to_vec();
    tokio::task::spawn_blocking(move || -> io::Result<()> {
        // Dropped (and removed) on any early return
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;

        if let Ok(metadata) = std::fs::metadata(&target) {
            tmp.as_file().set_permissions(metadata.permissions())?;
        }

        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(io::Error::other)??;

    debug!("Wrote {} ({} bytes)", path.display(), content.len());
    Ok(())
}

/// A managed file with serialized read-modify-write cycles
///
/// The lock belongs to the path, not the instance: any number of
/// `ConfigFile`s (and processes) over the same file take turns.
#[derive(Debug)]
pub struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current lines
    ///
    /// Saves are atomic renames, so a read never sees a partial write.
    pub async fn read(&self) -> PioneerResult<Vec<String>> {
        load(&self.path).await
    }

    /// Apply `mutate` under the file lock; saves only when the lines changed
    ///
    /// Returns whether the file was rewritten.
    pub async fn update<F>(&self, mutate: F) -> PioneerResult<bool>
    where
        F: FnOnce(Vec<String>) -> Vec<String>,
    {
        let _lock = file_lock::lock(&self.path).await?;

        let before = load(&self.path).await?;
        let after = mutate(before.clone());
        if after == before {
            debug!("{} unchanged, skipping write", self.path.display());
            return Ok(false);
        }

        save(&self.path, &after).await?;
        Ok(true)
    }
}
