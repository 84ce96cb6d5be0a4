//! Normalized view of injectable declarations and injection requests.

use std::fmt;
use std::sync::Arc;

use crate::key::{CallableId, SourcePosition};
use crate::types::{ClassifierRef, SubstitutionMap, TypeRef};

/// What kind of host declaration a callable was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationKind {
    /// Class constructor
    Class,
    Function,
    Property,
    TypeAlias,
}

impl DeclarationKind {
    pub fn label(self) -> &'static str {
        match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Function => "function",
            DeclarationKind::Property => "property",
            DeclarationKind::TypeAlias => "type alias",
        }
    }
}

/// How a callable participates in candidate collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CandidateKind {
    /// Satisfies requests for its provided type
    Provider,
    /// Contributes a map fragment to `Map<K, V>` requests
    MapContribution,
    /// Contributes one element to `Set<E>` requests
    SetContribution,
    /// Groups nested injectables; expanded during candidate collection
    ModuleBundle,
}

impl CandidateKind {
    pub fn label(self) -> &'static str {
        match self {
            CandidateKind::Provider => "provider",
            CandidateKind::MapContribution => "map contribution",
            CandidateKind::SetContribution => "set contribution",
            CandidateKind::ModuleBundle => "module bundle",
        }
    }

    /// Whether a plain request for the provided type can pick this callable
    pub fn answers_plain_requests(self) -> bool {
        matches!(self, CandidateKind::Provider | CandidateKind::ModuleBundle)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueParameter {
    pub name: Arc<str>,
    pub ty: TypeRef,
    pub is_injected: bool,
    pub has_default: bool,
    pub is_extension_receiver: bool,
    pub is_variadic: bool,
}

impl ValueParameter {
    /// Injected parameter without default
    pub fn injected(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            is_injected: true,
            has_default: false,
            is_extension_receiver: false,
            is_variadic: false,
        }
    }

    /// Parameter the caller supplies explicitly
    pub fn explicit(name: impl Into<Arc<str>>, ty: TypeRef) -> Self {
        Self {
            is_injected: false,
            ..Self::injected(name, ty)
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// An injectable candidate, or the declaration that owns a call site.
///
/// Callables derived from the catalog are cached per declaration by the
/// [`AnalysisSession`](crate::AnalysisSession). Generic candidates are
/// instantiated with [`Callable::substitute`], which never touches the
/// cached original.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     CallableId, Callable, CandidateKind, ClassifierRef, DeclarationKind, SourcePosition,
///     TypeRef, ValueParameter,
/// };
///
/// let service = TypeRef::of(&ClassifierRef::class("app.Service"));
/// let config = TypeRef::of(&ClassifierRef::class("app.Config"));
///
/// let provider = Callable::new(
///     CallableId::new("app.provideService", SourcePosition::new("app.kt", 4, 1)),
///     DeclarationKind::Function,
///     CandidateKind::Provider,
///     service,
/// )
/// .with_value_parameters(vec![ValueParameter::injected("config", config)]);
///
/// let requests = provider.requests();
/// assert_eq!(requests.len(), 1);
/// assert_eq!(requests[0].parameter_name.as_ref(), "config");
/// assert!(!provider.is_generic());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callable {
    pub id: CallableId,
    pub declaration_kind: DeclarationKind,
    pub candidate_kind: CandidateKind,
    pub provided_type: TypeRef,
    pub type_parameters: Vec<ClassifierRef>,
    /// Type parameters that have been bound, by bundle or spread
    /// instantiation or by matching against a request
    pub type_arguments: SubstitutionMap,
    pub value_parameters: Vec<ValueParameter>,
    /// Owner type a scope must have for this candidate to be usable there
    pub target_scope: Option<TypeRef>,
    /// Instantiated bundle type this callable was contributed by
    pub contributed_by: Option<TypeRef>,
    /// Spread provider this callable was instantiated from
    pub spread_origin: Option<CallableId>,
}

impl Callable {
    pub fn new(
        id: CallableId,
        declaration_kind: DeclarationKind,
        candidate_kind: CandidateKind,
        provided_type: TypeRef,
    ) -> Self {
        Self {
            id,
            declaration_kind,
            candidate_kind,
            provided_type,
            type_parameters: Vec::new(),
            type_arguments: SubstitutionMap::new(),
            value_parameters: Vec::new(),
            target_scope: None,
            contributed_by: None,
            spread_origin: None,
        }
    }

    pub fn with_type_parameters(mut self, parameters: Vec<ClassifierRef>) -> Self {
        self.type_parameters = parameters;
        self
    }

    pub fn with_value_parameters(mut self, parameters: Vec<ValueParameter>) -> Self {
        self.value_parameters = parameters;
        self
    }

    pub fn with_target_scope(mut self, target: TypeRef) -> Self {
        self.target_scope = Some(target);
        self
    }

    /// Declared type parameters not bound yet
    pub fn free_type_parameters(&self) -> Vec<ClassifierRef> {
        self.type_parameters
            .iter()
            .filter(|p| !self.type_arguments.contains_key(*p))
            .cloned()
            .collect()
    }

    pub fn is_generic(&self) -> bool {
        self.type_parameters
            .iter()
            .any(|p| !self.type_arguments.contains_key(p))
    }

    /// Declared type parameters marked as spread
    pub fn spread_parameters(&self) -> Vec<ClassifierRef> {
        self.type_parameters
            .iter()
            .filter(|p| p.is_spread())
            .cloned()
            .collect()
    }

    /// Injected value parameters with their declaration index
    pub fn injected_parameters(&self) -> impl Iterator<Item = (usize, &ValueParameter)> {
        self.value_parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_injected)
    }

    /// Binds type parameters, rewriting every type the callable mentions.
    ///
    /// Only bindings for this callable's own type parameters are recorded in
    /// `type_arguments`; the rest of `map` still rewrites the types.
    pub fn substitute(&self, map: &SubstitutionMap) -> Callable {
        if map.is_empty() {
            return self.clone();
        }
        let mut type_arguments: SubstitutionMap = self
            .type_arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.substitute(map)))
            .collect();
        for parameter in &self.type_parameters {
            if let Some(bound) = map.get(parameter) {
                type_arguments.entry(parameter.clone()).or_insert_with(|| bound.clone());
            }
        }

        Callable {
            id: self.id.clone(),
            declaration_kind: self.declaration_kind,
            candidate_kind: self.candidate_kind,
            provided_type: self.provided_type.substitute(map),
            type_parameters: self.type_parameters.clone(),
            type_arguments,
            value_parameters: self
                .value_parameters
                .iter()
                .map(|p| ValueParameter {
                    ty: p.ty.substitute(map),
                    ..p.clone()
                })
                .collect(),
            target_scope: self.target_scope.as_ref().map(|t| t.substitute(map)),
            contributed_by: self.contributed_by.clone(),
            spread_origin: self.spread_origin.clone(),
        }
    }

    /// One request per injected value parameter, in declaration order
    pub fn requests(&self) -> Vec<InjectableRequest> {
        self.injected_parameters()
            .map(|(index, parameter)| InjectableRequest {
                ty: parameter.ty.clone(),
                origin: self.id.clone(),
                parameter_index: index,
                parameter_name: parameter.name.clone(),
                has_default: parameter.has_default,
                position: Some(self.id.position().clone()),
            })
            .collect()
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.declaration_kind.label(),
            self.id,
            self.provided_type
        )
    }
}

/// One slot to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InjectableRequest {
    pub ty: TypeRef,
    /// Declaration whose parameter this is
    pub origin: CallableId,
    pub parameter_index: usize,
    pub parameter_name: Arc<str>,
    /// Whether a default value exists, making the request optional
    pub has_default: bool,
    pub position: Option<SourcePosition>,
}

impl InjectableRequest {
    pub fn new(
        ty: TypeRef,
        origin: CallableId,
        parameter_index: usize,
        parameter_name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            ty,
            origin,
            parameter_index,
            parameter_name: parameter_name.into(),
            has_default: false,
            position: None,
        }
    }

    pub fn with_default(mut self, has_default: bool) -> Self {
        self.has_default = has_default;
        self
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Call-site position if known, otherwise the originating declaration's
    pub fn effective_position(&self) -> &SourcePosition {
        self.position.as_ref().unwrap_or_else(|| self.origin.position())
    }
}

impl fmt::Display for InjectableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} of {}",
            self.parameter_name, self.ty, self.origin
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::*;

    fn box_provider() -> (Callable, ClassifierRef) {
        let t = ClassifierRef::type_parameter("app.boxOf.T");
        let boxed = generic("app.Box", &["V"]);
        let callable = Callable::new(
            CallableId::new("app.boxOf", SourcePosition::new("app.kt", 1, 1)),
            DeclarationKind::Function,
            CandidateKind::Provider,
            TypeRef::with_arguments(&boxed, vec![TypeRef::of(&t)]),
        )
        .with_type_parameters(vec![t.clone()])
        .with_value_parameters(vec![
            ValueParameter::injected("value", TypeRef::of(&t)),
            ValueParameter::explicit("label", class("kotlin.String")),
        ]);
        (callable, t)
    }

    #[test]
    fn substitute_binds_own_parameters() {
        let (callable, t) = box_provider();
        assert!(callable.is_generic());

        let mut map = SubstitutionMap::new();
        map.insert(t.clone(), class("app.Foo"));
        let bound = callable.substitute(&map);

        assert!(!bound.is_generic());
        assert_eq!(bound.provided_type.render(), "app.Box<app.Foo>");
        assert_eq!(bound.value_parameters[0].ty, class("app.Foo"));
        assert_eq!(bound.type_arguments.get(&t), Some(&class("app.Foo")));
        // original untouched
        assert!(callable.is_generic());
    }

    #[test]
    fn requests_skip_explicit_parameters() {
        let (callable, _) = box_provider();
        let requests = callable.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].parameter_index, 0);
        assert_eq!(requests[0].effective_position().line, 1);
    }

    #[test]
    fn only_providers_and_bundles_answer_plain_requests() {
        assert!(CandidateKind::Provider.answers_plain_requests());
        assert!(CandidateKind::ModuleBundle.answers_plain_requests());
        assert!(!CandidateKind::SetContribution.answers_plain_requests());
        assert!(!CandidateKind::MapContribution.answers_plain_requests());
    }
}
