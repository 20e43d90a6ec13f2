// src/error.rs
//! Error handling for the whole crate.
//!
//! Most failures in this crate are handled where they happen (logged, operation
//! skipped); `StudioError` is what crosses function boundaries before that point.

use std::time::Duration;
use thiserror::Error;

/// Main error type, `Send + Sync + 'static` so it can cross tasks.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StudioError {
    /// I/O errors from file-backed loaders and stores.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of config, selection state and API bodies.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The viewer did not finish loading its asset in time.
    #[error("viewer {viewer} did not load within {timeout:?}")]
    LoadTimeout { viewer: u64, timeout: Duration },

    /// The viewer's asset failed to load.
    #[error("asset load failed: {0}")]
    AssetLoad(String),

    /// Texture bytes could not be fetched or decoded.
    #[error("texture decode failed for {url}: {reason}")]
    TextureDecode { url: String, reason: String },

    /// Model index outside the catalog.
    #[error("model index {0} out of range")]
    ModelIndex(usize),

    /// Durable storage refused a read or write.
    #[error("storage error: {0}")]
    Storage(String),

    /// Server replied with a non-success envelope.
    #[error("API error: {0}")]
    Api(String),

    /// Rich context chaining.
    #[error("{message}: {source}")]
    WithContext {
        message: String,
        #[source]
        source: Box<StudioError>,
    },
}

impl StudioError {
    /// Add context to any error (chainable, like `.context()` in anyhow).
    #[inline]
    pub fn context<C: Into<String>>(self, context: C) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        match self {
            StudioError::LoadTimeout { .. } => true,
            StudioError::WithContext { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Convenient `Result` alias, use `crate::Result<T>` everywhere.
pub type Result<T> = std::result::Result<T, StudioError>;
