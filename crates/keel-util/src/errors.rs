use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all keel operations.
#[derive(Debug, Error, Diagnostic)]
pub enum KeelError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed project manifest (e.g. keel.toml).
    #[error("Project error: {message}")]
    #[diagnostic(help("Check your keel.toml for syntax errors"))]
    Project { message: String },

    /// Dependency resolution failed (unresolved libraries, bad ranges, etc.).
    #[error("Dependency resolution failed: {message}")]
    Resolution { message: String },

    /// Lock snapshot could not be read, written, or understood.
    #[error("Lock snapshot error: {message}")]
    Snapshot { message: String },

    /// Network request or download failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Package installation into the shared cache failed.
    #[error("Install failed: {message}")]
    Install { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type KeelResult<T> = miette::Result<T>;
