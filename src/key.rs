//! Identity keys for declarations, scopes, and bundle instantiations.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::types::TypeRef;

/// Source location of a declaration or call site.
///
/// Positions order by file, then line, then column, which gives callables a
/// stable total order independent of hash iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourcePosition {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub fn new(file: impl Into<Arc<str>>, line: u32, column: u32) -> Self {
        Self { file: file.into(), line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Identity of an injectable declaration.
///
/// Two ids are equal when both the fully-qualified name and the declaration
/// position match; overloads share a name but never a position.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{CallableId, SourcePosition};
///
/// let a = CallableId::new("app.provideA", SourcePosition::new("app.kt", 3, 1));
/// let b = CallableId::new("app.provideB", SourcePosition::new("app.kt", 1, 1));
///
/// // Name first, position second
/// assert!(a < b);
/// assert_eq!(a.to_string(), "app.provideA");
/// assert_eq!(a.short_name(), "provideA");
/// ```
#[derive(Debug, Clone)]
pub struct CallableId {
    fq_name: Arc<str>,
    position: SourcePosition,
}

impl CallableId {
    pub fn new(fq_name: impl Into<Arc<str>>, position: SourcePosition) -> Self {
        Self { fq_name: fq_name.into(), position }
    }

    /// Synthetic id for declarations the engine creates itself
    pub(crate) fn synthetic(fq_name: impl Into<Arc<str>>) -> Self {
        Self::new(fq_name, SourcePosition::new("<synthetic>", 0, 0))
    }

    pub fn fq_name(&self) -> &str {
        &self.fq_name
    }

    pub fn position(&self) -> &SourcePosition {
        &self.position
    }

    /// Last segment of the fully-qualified name
    pub fn short_name(&self) -> &str {
        self.fq_name.rsplit('.').next().unwrap_or(&self.fq_name)
    }
}

impl PartialEq for CallableId {
    fn eq(&self, other: &Self) -> bool {
        self.fq_name == other.fq_name && self.position == other.position
    }
}

impl Eq for CallableId {}

impl Hash for CallableId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fq_name.hash(state);
        self.position.hash(state);
    }
}

impl PartialOrd for CallableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CallableId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fq_name
            .cmp(&other.fq_name)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fq_name)
    }
}

/// Identity of one link in a scope chain, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(pub(crate) u64);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Memo key for a module-bundle instantiation: bundle classifier plus the
/// concrete type arguments it was expanded with.
///
/// ```rust
/// use ferrous_inject::{ClassifierRef, InstantiationKey, TypeRef};
///
/// let t = ClassifierRef::type_parameter("app.Bundle.T");
/// let bundle = ClassifierRef::builder("app.Bundle").type_parameters(vec![t]).build();
/// let string = TypeRef::of(&ClassifierRef::class("kotlin.String"));
///
/// let a = InstantiationKey::of(&TypeRef::with_arguments(&bundle, vec![string.clone()]));
/// let b = InstantiationKey::of(&TypeRef::with_arguments(&bundle, vec![string]));
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstantiationKey {
    pub classifier: Arc<str>,
    pub arguments: Vec<TypeRef>,
}

impl InstantiationKey {
    pub fn of(ty: &TypeRef) -> Self {
        Self {
            classifier: ty.classifier.fq_name_arc(),
            arguments: ty.arguments.clone(),
        }
    }
}

impl fmt::Display for InstantiationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.classifier)?;
        if !self.arguments.is_empty() {
            let rendered: Vec<String> = self.arguments.iter().map(|a| a.render()).collect();
            write!(f, "<{}>", rendered.join(", "))?;
        }
        Ok(())
    }
}
