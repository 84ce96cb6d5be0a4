//! Declaration-time validation of injectables.
//!
//! [`validate_callable`] is the check the candidate index applies to every
//! declaration it sees; a malformed declaration only fails a resolution
//! that would have matched it. [`validate_scope`] runs the same check over
//! a whole scope chain up front and adds warnings for declarations that are
//! legal but probably not what the author meant.

use std::fmt;

use crate::callable::{Callable, CandidateKind, DeclarationKind};
use crate::config::EngineConfig;
use crate::error::InjectResult;
use crate::index::{CandidateIndex, IndexError, Precedence};
use crate::key::CallableId;
use crate::result::DeclarationErrorKind;
use crate::scope::ResolutionScope;
use crate::types::TypeRef;

/// Checks a single declaration.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{
///     validate_callable, Callable, CallableId, CandidateKind, ClassifierRef, DeclarationErrorKind,
///     DeclarationKind, SourcePosition, TypeRef,
/// };
///
/// let a = ClassifierRef::builder("app.wrap.A").spread().build();
/// let b = ClassifierRef::builder("app.wrap.B").spread().build();
/// let callable = Callable::new(
///     CallableId::new("app.wrap", SourcePosition::new("app.kt", 1, 1)),
///     DeclarationKind::Function,
///     CandidateKind::Provider,
///     TypeRef::of(&a),
/// )
/// .with_type_parameters(vec![a, b]);
///
/// assert_eq!(validate_callable(&callable), Err(DeclarationErrorKind::MultipleSpreadParameters));
/// ```
pub fn validate_callable(callable: &Callable) -> Result<(), DeclarationErrorKind> {
    if callable.spread_parameters().len() > 1 {
        return Err(DeclarationErrorKind::MultipleSpreadParameters);
    }
    if callable.declaration_kind == DeclarationKind::Class
        && callable.provided_type.is_tag()
        && !callable.value_parameters.is_empty()
    {
        return Err(DeclarationErrorKind::TagWithValueParameters);
    }
    Ok(())
}

/// A declaration that would fail any resolution matching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub declaration: Option<CallableId>,
    pub kind: DeclarationErrorKind,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration {
            Some(id) => write!(f, "{} at {}: {}", id, id.position(), self.kind.description()),
            None => f.write_str(self.kind.description()),
        }
    }
}

/// A legal declaration that is likely a mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Type parameter that the provided type never mentions, so no request
    /// can ever bind it
    UnusedTypeParameter { declaration: CallableId, parameter: String },
    /// Provider hidden by a nearer provider of the same type
    ShadowedCandidate {
        shadowed: CallableId,
        by: CallableId,
        ty: TypeRef,
    },
    /// Two providers of the same type at the same precedence; requests for
    /// the type are ambiguous
    DuplicateCandidate {
        first: CallableId,
        second: CallableId,
        ty: TypeRef,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::UnusedTypeParameter { declaration, parameter } => write!(
                f,
                "{}: type parameter {} is not mentioned by the provided type",
                declaration, parameter
            ),
            ValidationWarning::ShadowedCandidate { shadowed, by, ty } => {
                write!(f, "{} is shadowed by {} for {}", shadowed, by, ty)
            }
            ValidationWarning::DuplicateCandidate { first, second, ty } => {
                write!(f, "{} and {} both provide {}", first, second, ty)
            }
        }
    }
}

/// Result of [`validate_scope`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// One line per issue, errors first
    pub fn format_issues(&self) -> String {
        let mut out = String::new();
        for error in &self.errors {
            out.push_str(&format!("error: {}\n", error));
        }
        for warning in &self.warnings {
            out.push_str(&format!("warning: {}\n", warning));
        }
        out
    }
}

/// Validates every declaration visible from `scope`, bundle members
/// included.
///
/// Internal errors (an unknown classifier in the catalog) are returned as
/// `Err`; everything a user can fix lands in the report.
pub fn validate_scope(scope: &ResolutionScope, config: &EngineConfig) -> InjectResult<ValidationReport> {
    let mut report = ValidationReport::default();
    let index = match CandidateIndex::new(scope, config) {
        Ok(index) => index,
        Err(IndexError::Internal(err)) => return Err(err),
        Err(IndexError::Declaration { declaration, kind }) => {
            report.errors.push(ValidationError { declaration, kind });
            return Ok(report);
        }
    };

    let mut providers: Vec<(Precedence, &Callable)> = Vec::new();
    for (precedence, callable) in index.visible() {
        if let Err(kind) = validate_callable(callable) {
            report.errors.push(ValidationError {
                declaration: Some(callable.id.clone()),
                kind,
            });
            continue;
        }

        for parameter in callable.free_type_parameters() {
            if !parameter.is_spread() && !callable.provided_type.mentions_any(std::slice::from_ref(&parameter)) {
                report.warnings.push(ValidationWarning::UnusedTypeParameter {
                    declaration: callable.id.clone(),
                    parameter: parameter.short_name().to_string(),
                });
            }
        }

        if callable.candidate_kind != CandidateKind::Provider || callable.is_generic() {
            continue;
        }
        // nearest first, so a previous provider of the same type is at least as near
        if let Some((near, by)) = providers
            .iter()
            .find(|(_, other)| other.provided_type == callable.provided_type)
        {
            let warning = if near.cmp_nearness(&precedence).is_gt() {
                ValidationWarning::ShadowedCandidate {
                    shadowed: callable.id.clone(),
                    by: by.id.clone(),
                    ty: callable.provided_type.clone(),
                }
            } else {
                ValidationWarning::DuplicateCandidate {
                    first: by.id.clone(),
                    second: callable.id.clone(),
                    ty: callable.provided_type.clone(),
                }
            };
            report.warnings.push(warning);
            continue;
        }
        providers.push((precedence, callable.as_ref()));
    }
    Ok(report)
}
