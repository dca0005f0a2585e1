//! Rich diagnostic error types for the grulia cache.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know which query failed and why.

use miette::Diagnostic;
use thiserror::Error;

use crate::expr::Operator;

/// Top-level error type for the grulia cache.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum GruliaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Traversal(#[from] TraversalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Traversal errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum TraversalError {
    #[error("operator {operator} is not supported by the {visitor}")]
    #[diagnostic(
        code(grulia::expr::unsupported_operator),
        help(
            "This visitor cannot interpret the operator. Rewrite the constraint \
             without it, or route the query straight to the oracle."
        )
    )]
    UnsupportedOperator {
        operator: Operator,
        visitor: &'static str,
    },

    #[error("operator {operator} expects {expected} operand(s), got {actual}")]
    #[diagnostic(
        code(grulia::expr::arity_mismatch),
        help("Unary operators take one operand and binary operators exactly two.")
    )]
    ArityMismatch {
        operator: Operator,
        expected: usize,
        actual: usize,
    },

    #[error("operator {operator} expects {expected} operands")]
    #[diagnostic(
        code(grulia::expr::type_mismatch),
        help(
            "Relational and arithmetic operators take integer operands; \
             logical connectives take boolean operands."
        )
    )]
    TypeMismatch {
        operator: Operator,
        expected: &'static str,
    },

    #[error("constant {constant} cannot be evaluated by the {visitor}")]
    #[diagnostic(
        code(grulia::expr::unsupported_constant),
        help("Only integer and bit-vector constants take part in exact evaluation.")
    )]
    UnsupportedConstant {
        constant: String,
        visitor: &'static str,
    },

    #[error("division by zero in operator {operator}")]
    #[diagnostic(
        code(grulia::expr::division_by_zero),
        help("The assignment drives a divisor to zero; it cannot satisfy the constraint.")
    )]
    DivisionByZero { operator: Operator },

    #[error("expression evaluated to {found}, expected a boolean")]
    #[diagnostic(
        code(grulia::expr::not_boolean),
        help("The root of a constraint must be a relational or logical operation.")
    )]
    NotBoolean { found: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(grulia::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(grulia::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption. Try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(grulia::store::serde),
        help(
            "Failed to encode or decode a cache entry. \
             This usually means the entry format changed between versions; \
             entries that fail to decode are skipped during warm load."
        )
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Oracle errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum OracleError {
    #[error("oracle failed: {message}")]
    #[diagnostic(
        code(grulia::oracle::failed),
        help("The decision procedure could not answer the query. Nothing was cached.")
    )]
    Failed { message: String },

    #[error("oracle returned a malformed answer: {message}")]
    #[diagnostic(
        code(grulia::oracle::malformed),
        help(
            "A satisfiable answer must carry a model and an unsatisfiable \
             answer must carry a core. Nothing was cached."
        )
    )]
    Malformed { message: String },

    #[error("search space of {assignments} assignments exceeds the budget of {limit}")]
    #[diagnostic(
        code(grulia::oracle::search_space),
        help(
            "Tighten the variable domains or raise `oracle.max_assignments` \
             in the configuration."
        )
    )]
    SearchSpaceTooLarge { assignments: u128, limit: u64 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Traversal(#[from] TraversalError),
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(grulia::engine::invalid_config),
        help("Check the EngineConfig fields. {message}")
    )]
    InvalidConfig { message: String },

    #[error("data directory error: {path}")]
    #[diagnostic(
        code(grulia::engine::data_dir),
        help(
            "The data directory could not be created or its database opened. \
             Ensure the path names a writable directory."
        )
    )]
    DataDir {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(grulia::engine::config_read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(grulia::engine::config_parse),
        help("Check the TOML syntax in the config file. {message}")
    )]
    ConfigParse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(grulia::engine::config_write),
        help("Ensure the config directory is writable.")
    )]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for functions returning grulia results.
pub type GruliaResult<T> = std::result::Result<T, GruliaError>;
