//! Graph snapshots
//!
//! Captures a value graph as document text so it can be restored later,
//! written to disk, or used to clone part of a scene with its internal
//! sharing intact.

use std::fs;
use std::path::Path;

use crate::engine::GraphCodec;
use crate::error::Result;
use crate::value::Value;

/// Deep copy of a value graph
///
/// Shared references and cycles inside the graph are reproduced in the copy;
/// nothing in the copy aliases the original.
pub fn clone_graph(codec: &GraphCodec, value: &Value) -> Result<Value> {
    let doc = codec.to_document(value, &Default::default())?;
    codec.from_document(&doc)
}

/// Encoded state of a value graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    text: String,
}

impl Snapshot {
    /// Capture the current state of a graph
    pub fn capture(codec: &GraphCodec, value: &Value) -> Result<Self> {
        let text = codec.encode(value)?;
        log::debug!("Captured snapshot ({} bytes)", text.len());
        Ok(Self { text })
    }

    /// Wrap previously encoded text
    pub fn from_text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Rebuild a fresh graph from the snapshot
    pub fn restore(&self, codec: &GraphCodec) -> Result<Value> {
        codec.decode(&self.text)
    }

    /// Encoded text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Write the snapshot to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, &self.text)?;
        Ok(())
    }

    /// Read a snapshot from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            text: fs::read_to_string(path)?,
        })
    }
}
