//! Code cell sources.
//!
//! Derivation needs the compiled code cell of each contract. Compiling
//! smart-contract sources happens outside this crate; [`CodeCompiler`] is
//! the seam, and [`BocArtifactLoader`] is the implementation that reads a
//! compiler's output artifact from disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use ton_cell::{
    BagOfCells, Cell, BOC_GENERIC_MAGIC, BOC_INDEXED_CRC32_MAGIC, BOC_INDEXED_MAGIC,
};

/// Errors from a code compiler.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No source files given")]
    NoSources,

    #[error("Invalid code artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Compilation failed: {0}")]
    Failed(String),
}

/// Produces the code cell for a set of contract sources.
pub trait CodeCompiler {
    fn compile(&self, sources: &[PathBuf]) -> Result<Arc<Cell>, CompileError>;
}

/// Loads precompiled code from a Bag of Cells artifact.
///
/// The first source path is read. Binary BoC files are recognized by their
/// magic; anything else is taken as hex or base64 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BocArtifactLoader;

impl BocArtifactLoader {
    pub fn new() -> Self {
        BocArtifactLoader
    }

    /// Load the single root cell stored at `path`.
    pub fn load(&self, path: &Path) -> Result<Arc<Cell>, CompileError> {
        let bytes = fs::read(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let invalid = |reason: String| CompileError::InvalidArtifact {
            path: path.to_path_buf(),
            reason,
        };

        let parsed = if is_binary_boc(&bytes) {
            BagOfCells::deserialize(&bytes)
        } else {
            let text = std::str::from_utf8(&bytes)
                .map_err(|e| invalid(format!("not a BoC and not text: {}", e)))?
                .trim();
            if !text.is_empty() && text.chars().all(|c| c.is_ascii_hexdigit()) {
                BagOfCells::deserialize_from_hex(text)
            } else {
                BagOfCells::deserialize_from_base64(text)
            }
        };
        let boc = parsed.map_err(|e| invalid(e.to_string()))?;

        let root = boc.into_single_root().map_err(|e| invalid(e.to_string()))?;
        debug!(
            "loaded code from {}: {} bits, {} refs",
            path.display(),
            root.bit_len(),
            root.reference_count()
        );
        Ok(root)
    }
}

impl CodeCompiler for BocArtifactLoader {
    fn compile(&self, sources: &[PathBuf]) -> Result<Arc<Cell>, CompileError> {
        let path = sources.first().ok_or(CompileError::NoSources)?;
        self.load(path)
    }
}

fn is_binary_boc(bytes: &[u8]) -> bool {
    match bytes.get(..4) {
        Some(prefix) => {
            let magic = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
            matches!(
                magic,
                BOC_GENERIC_MAGIC | BOC_INDEXED_MAGIC | BOC_INDEXED_CRC32_MAGIC
            )
        }
        None => false,
    }
}
