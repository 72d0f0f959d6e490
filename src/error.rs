//! Error types for the refinement verification engine
//!
//! Analysis outcomes (proved, refuted, unknown, rejected declarations) are never
//! errors: they are classified results handed to the reporter. `Error` is reserved
//! for malformed input from the front end and for infrastructure failures.

use thiserror::Error;

/// Engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Declaration input errors
    /// Two declarations share the same kind identity
    ///
    /// **Triggered by:** a front end handing over the same `KindId` twice
    #[error("Duplicate refinement kind id {id} ('{name}')")]
    DuplicateKind {
        /// Numeric kind identity
        id: u32,
        /// Name of the second declaration carrying the id
        name: String,
    },

    /// A body or site references a kind that was never declared
    #[error("Unknown refinement kind id {id}")]
    UnknownKind {
        /// Numeric kind identity
        id: u32,
    },

    // Body input errors
    /// A terminator targets a block that does not exist
    ///
    /// **Triggered by:** `Goto(7)` in a body that has no block 7
    #[error("Function '{function}': block {from} targets unknown block {target}")]
    UnknownBlock {
        /// Function name
        function: String,
        /// Block holding the terminator
        from: usize,
        /// Missing target block
        target: usize,
    },

    /// Two blocks in one body share an id
    #[error("Function '{function}': duplicate block id {block}")]
    DuplicateBlock {
        /// Function name
        function: String,
        /// Duplicated block id
        block: usize,
    },

    /// The entry block is missing from the body
    #[error("Function '{function}': entry block {entry} does not exist")]
    MissingEntry {
        /// Function name
        function: String,
        /// Declared entry block id
        entry: usize,
    },

    /// A statement writes or escapes a variable with no declared type
    #[error("Function '{function}': variable '{name}' is not declared")]
    UndeclaredVariable {
        /// Function name
        function: String,
        /// Variable name
        name: String,
    },

    // Design-time / infrastructure errors
    /// A registered domain failed its widening self-check
    ///
    /// **Triggered by:** a lattice whose widening does not over-approximate
    /// both operands or does not stabilize within the iteration bound
    #[error("Domain self-check failed for {domain}: {reason}")]
    RegistrySelfCheck {
        /// Domain name
        domain: String,
        /// What went wrong
        reason: String,
    },

    /// The analysis thread pool could not be created
    #[error("Failed to create analysis thread pool: {0}")]
    ThreadPool(String),

    /// Options failed validation or could not be parsed
    #[error("Invalid analysis options: {0}")]
    InvalidOptions(String),

    /// A report could not be rendered
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Error severity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Fatal error that cannot be recovered from
    Fatal,
    /// Input error confined to one function body; other bodies can still be analyzed
    Recoverable,
}

impl Error {
    /// Create an options error with a message
    pub fn options(msg: impl Into<String>) -> Self {
        Error::InvalidOptions(msg.into())
    }

    /// Classify error severity
    pub fn classify(&self) -> ErrorSeverity {
        match self {
            Error::UnknownBlock { .. }
            | Error::DuplicateBlock { .. }
            | Error::MissingEntry { .. }
            | Error::UndeclaredVariable { .. }
            | Error::UnknownKind { .. } => ErrorSeverity::Recoverable,

            Error::DuplicateKind { .. }
            | Error::RegistrySelfCheck { .. }
            | Error::ThreadPool(_)
            | Error::InvalidOptions(_)
            | Error::Serialization(_) => ErrorSeverity::Fatal,
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
