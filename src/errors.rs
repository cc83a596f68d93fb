//! Error Types
//!
//! This module defines the error types used throughout the viewer core.
//!
//! # Overview
//!
//! The main error type [`ViewerError`] covers the failures a caller can act on:
//! - Shader program description parsing
//! - Override material file decoding
//! - Settings loading
//! - Shader directory I/O
//!
//! Anomalies inside the asset graph itself (missing fields, bad indices,
//! duplicate data blocks) are never reported through this type. They disable
//! the affected feature and are logged instead.
//!
//! # Usage
//!
//! All fallible public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, ViewerError>`.
//!
//! ```rust,ignore
//! use nifview::errors::{ViewerError, Result};
//!
//! fn load_settings(text: &str) -> Result<ViewerSettings> {
//!     ViewerSettings::from_json_str(text)
//! }
//! ```

use thiserror::Error;

/// The main error type for the viewer core.
#[derive(Error, Debug)]
pub enum ViewerError {
    // ========================================================================
    // Asset Graph Errors
    // ========================================================================
    /// A block id does not exist in the asset graph.
    #[error("Block {0} not found in asset graph")]
    BlockNotFound(u32),

    /// A block type was registered twice with different parents.
    #[error("Block type '{name}' is already registered with parent '{parent}'")]
    TypeConflict {
        /// Type being registered
        name: String,
        /// Existing parent type
        parent: String,
    },

    // ========================================================================
    // Material File Errors
    // ========================================================================
    /// The material file does not start with a known magic.
    #[error("Invalid material magic: {0:#010x}")]
    MaterialMagic(u32),

    /// The material file ended before all fields were read.
    #[error("Material file truncated at offset {offset} (needed {needed} more bytes)")]
    MaterialTruncated {
        /// Read position where the data ran out
        offset: usize,
        /// Bytes that were requested
        needed: usize,
    },

    /// A material file could not be located through any provider.
    #[error("Material not found: {0}")]
    MaterialNotFound(String),

    // ========================================================================
    // Shader Program Errors
    // ========================================================================
    /// A program description line could not be parsed.
    #[error("Program '{program}': {message}")]
    ProgramParse {
        /// Program file name
        program: String,
        /// Reason reported to the log
        message: String,
    },

    /// A shader source failed to compile.
    #[error("Shader '{shader}' failed to compile: {log}")]
    ShaderCompile {
        /// Shader file name
        shader: String,
        /// Driver info log
        log: String,
    },

    /// A program failed to link.
    #[error("Program '{program}' failed to link: {log}")]
    ProgramLink {
        /// Program file name
        program: String,
        /// Driver info log
        log: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings could not be deserialized.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, ViewerError>`.
pub type Result<T> = std::result::Result<T, ViewerError>;
