//! Structured payloads carried inside frames.
//!
//! [`PtyOpenOptions`] and [`FileInfo`] travel as MessagePack maps keyed by
//! field name, so the agent can decode them without a shared schema.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

// ============================================================================
// PtyOpenOptions
// ============================================================================

/// Options for opening the remote PTY.
///
/// An empty `cmd` lets the agent pick its default shell.
///
/// # Example
///
/// ```
/// use agent_link::PtyOpenOptions;
///
/// let options = PtyOpenOptions::new("bash")
///     .arg("-l")
///     .env("TERM", "xterm-256color");
///
/// assert!(options.inherit_env);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtyOpenOptions {
    /// Program to execute.
    pub cmd: String,

    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment as `KEY=VALUE` strings.
    #[serde(default)]
    pub env: Vec<String>,

    /// Whether the agent's own environment is inherited.
    #[serde(default = "default_inherit_env")]
    pub inherit_env: bool,
}

fn default_inherit_env() -> bool {
    true
}

impl Default for PtyOpenOptions {
    fn default() -> Self {
        Self {
            cmd: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            inherit_env: true,
        }
    }
}

impl PtyOpenOptions {
    /// Creates options for `cmd` with no arguments and an inherited environment.
    #[inline]
    #[must_use]
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            ..Default::default()
        }
    }

    /// Appends an argument.
    #[inline]
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[inline]
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable.
    #[inline]
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{key}={value}"));
        self
    }

    /// Sets whether the agent environment is inherited.
    #[inline]
    #[must_use]
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Serializes to a MessagePack map.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserializes from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// ============================================================================
// FileInfo
// ============================================================================

/// Metadata of a remote file as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Path exactly as queried.
    pub path: String,

    /// Size in bytes.
    pub size: u64,

    /// Unix permission bits.
    #[serde(default)]
    pub mode: u32,

    /// Modification time in Unix seconds.
    pub mtime: i64,
}

impl FileInfo {
    /// Returns the modification time, or `None` if it predates the epoch.
    #[must_use]
    pub fn modified(&self) -> Option<SystemTime> {
        let secs = u64::try_from(self.mtime).ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(secs))
    }

    /// Returns the last path segment, or `"download"` for an empty one.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self.path.rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => "download",
        }
    }

    /// Serializes to a MessagePack map.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    /// Deserializes from MessagePack.
    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// A slice of a file at a given offset.
///
/// Empty `data` signals end of file on reads and truncation on writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the file.
    pub offset: u64,
    /// Chunk contents.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Creates a chunk.
    #[inline]
    #[must_use]
    pub fn new(offset: u64, data: Vec<u8>) -> Self {
        Self { offset, data }
    }

    /// Returns `true` for a zero-length chunk.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the chunk length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
