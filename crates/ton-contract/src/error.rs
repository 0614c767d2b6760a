//! Error types for ton-contract

use std::path::PathBuf;

use thiserror::Error;

use crate::compiler::CompileError;

/// Contract derivation error type
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Cell error: {0}")]
    Cell(#[from] ton_cell::CellError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("StateInit has no code cell")]
    MissingCode,

    #[error("Invalid split depth: {0} (max 31)")]
    InvalidSplitDepth(u8),

    #[error("Malformed StateInit: {0}")]
    MalformedStateInit(String),

    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Duplicate contract: {0}")]
    DuplicateContract(String),

    #[error("Dependency cycle between contracts: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("Invalid plan config: {0}")]
    InvalidConfig(String),

    #[error("Plan config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias
pub type ContractResult<T> = Result<T, ContractError>;
