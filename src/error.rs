//! Error types for the resolution engine.
//!
//! User-fixable conditions (missing candidates, ambiguity, cycles, malformed
//! declarations) are never errors in this sense: they come back as
//! [`ResolutionFailure`](crate::ResolutionFailure) values inside a
//! [`ResolutionResult`](crate::ResolutionResult). `InjectError` is reserved
//! for broken invariants in the catalog data or the engine itself and is
//! fatal for the current compilation step.

use std::fmt;

/// Engine-internal errors.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::InjectError;
///
/// let unknown = InjectError::UnknownClassifier("app.Missing".to_string());
/// assert_eq!(unknown.to_string(), "Unknown classifier: app.Missing");
///
/// let mismatch = InjectError::ArgumentCountMismatch {
///     classifier: "app.Box".to_string(),
///     expected: 1,
///     found: 2,
/// };
/// assert!(mismatch.to_string().contains("expected 1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    /// The catalog referenced a classifier it cannot describe
    UnknownClassifier(String),
    /// A type was built with the wrong number of type arguments
    ArgumentCountMismatch {
        classifier: String,
        expected: usize,
        found: usize,
    },
    /// A callable declared a type parameter that is not a type-parameter classifier
    UnknownTypeParameter {
        callable: String,
        name: String,
    },
    /// Type alias expansion loops back onto itself
    CyclicAlias(Vec<String>),
    /// A substitution produced a type that is not well formed
    CorruptSubstitution(String),
    /// Configuration value could not be used
    InvalidConfig {
        key: String,
        message: String,
    },
    /// A resolution graph could not be serialized
    Export(String),
}

impl fmt::Display for InjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectError::UnknownClassifier(name) => write!(f, "Unknown classifier: {}", name),
            InjectError::ArgumentCountMismatch { classifier, expected, found } => write!(
                f,
                "Argument count mismatch for {}: expected {}, found {}",
                classifier, expected, found
            ),
            InjectError::UnknownTypeParameter { callable, name } => {
                write!(f, "Unknown type parameter {} declared by {}", name, callable)
            }
            InjectError::CyclicAlias(path) => write!(f, "Cyclic type alias: {}", path.join(" -> ")),
            InjectError::CorruptSubstitution(msg) => write!(f, "Corrupt substitution: {}", msg),
            InjectError::InvalidConfig { key, message } => {
                write!(f, "Invalid configuration for {}: {}", key, message)
            }
            InjectError::Export(msg) => write!(f, "Graph export failed: {}", msg),
        }
    }
}

impl std::error::Error for InjectError {}

/// Result type for engine operations that can hit an internal error.
///
/// ```rust
/// use ferrous_inject::{InjectError, InjectResult};
///
/// fn lookup(name: &str) -> InjectResult<usize> {
///     if name.is_empty() {
///         return Err(InjectError::UnknownClassifier(name.to_string()));
///     }
///     Ok(name.len())
/// }
///
/// assert_eq!(lookup("app.Foo"), Ok(7));
/// assert!(lookup("").is_err());
/// ```
pub type InjectResult<T> = Result<T, InjectError>;
