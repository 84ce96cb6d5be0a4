//! Rendering of resolution failures for the host's diagnostic reporter.

use std::fmt;

use crate::callable::InjectableRequest;
use crate::catalog::DeclarationCatalog;
use crate::key::SourcePosition;
use crate::result::ResolutionFailure;

/// A rendered failure: where to report it, the headline, and follow-up notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub position: Option<SourcePosition>,
    pub message: String,
    pub notes: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = &self.position {
            write!(f, "{}: ", position)?;
        }
        write!(f, "error: {}", self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note)?;
        }
        Ok(())
    }
}

/// Formats `failure` using the catalog's type rendering.
///
/// The position is the top-level call site; for a declaration error without
/// a chain it is the declaration itself.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     render_failure, CallableId, InMemoryCatalog, InjectableRequest, ResolutionFailure,
///     SourcePosition, TypeRef, ClassifierRef,
/// };
///
/// let request = InjectableRequest::new(
///     TypeRef::of(&ClassifierRef::class("app.Database")),
///     CallableId::new("app.main", SourcePosition::new("main.kt", 4, 1)),
///     0,
///     "db",
/// );
/// let failure = ResolutionFailure::Unresolved { request: request.clone(), chain: vec![request] };
/// let diagnostic = render_failure(&failure, &InMemoryCatalog::builder().build());
///
/// assert_eq!(diagnostic.message, "no injectable found for parameter db: app.Database");
/// assert_eq!(diagnostic.to_string().lines().next(), Some("main.kt:4:1: error: no injectable found for parameter db: app.Database"));
/// ```
pub fn render_failure(failure: &ResolutionFailure, catalog: &dyn DeclarationCatalog) -> Diagnostic {
    let position = match failure.chain().first() {
        Some(top) => Some(top.effective_position().clone()),
        None => match failure {
            ResolutionFailure::DeclarationError { declaration: Some(id), .. } => Some(id.position().clone()),
            _ => None,
        },
    };

    let mut notes = Vec::new();
    let message = match failure {
        ResolutionFailure::Unresolved { request, .. } => format!(
            "no injectable found for parameter {}: {}",
            request.parameter_name,
            catalog.render_type(&request.ty)
        ),
        ResolutionFailure::CandidateAmbiguity { request, candidates, .. } => {
            for candidate in candidates {
                notes.push(format!("candidate {} declared at {}", candidate, candidate.position()));
            }
            format!(
                "ambiguous injectables for parameter {}: {}",
                request.parameter_name,
                catalog.render_type(&request.ty)
            )
        }
        ResolutionFailure::CircularDependency { request, cycle, .. } => {
            for link in cycle {
                notes.push(format!(
                    "{} is provided by {} at {}",
                    catalog.render_type(&link.ty),
                    link.candidate,
                    link.candidate.position()
                ));
            }
            format!("circular dependency on {}", catalog.render_type(&request.ty))
        }
        ResolutionFailure::DeclarationError { declaration, kind, .. } => match declaration {
            Some(id) => format!("invalid declaration {}: {}", id, kind.description()),
            None => format!("invalid declaration: {}", kind.description()),
        },
    };

    // the top-level request is where the diagnostic is reported
    for request in failure.chain().iter().skip(1).rev() {
        notes.push(required_by(request, catalog));
    }

    Diagnostic { position, message, notes }
}

fn required_by(request: &InjectableRequest, catalog: &dyn DeclarationCatalog) -> String {
    format!(
        "while resolving {}: {} of {} at {}",
        request.parameter_name,
        catalog.render_type(&request.ty),
        request.origin,
        request.effective_position()
    )
}
