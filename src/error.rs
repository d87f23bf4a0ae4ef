//! Error handling for the warehouse pipeline
//!
//! This module provides idiomatic Rust error types using thiserror for
//! better error messages and proper error chain handling.

use thiserror::Error;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid run date '{input}': expected YYYY-MM-DD")]
    InvalidRunDate { input: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery error for {bucket}/{key}: {message}")]
    Delivery {
        bucket: String,
        key: String,
        message: String,
    },
}

impl EtlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        EtlError::Configuration {
            message: message.into(),
        }
    }

    pub fn delivery(bucket: impl Into<String>, key: impl Into<String>, message: impl Into<String>) -> Self {
        EtlError::Delivery {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type EtlResult<T> = Result<T, EtlError>;
