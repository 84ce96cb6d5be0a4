//! Resolution outcomes: the success graph and the closed set of failures.

use std::fmt;
use std::sync::Arc;

use crate::callable::{Callable, InjectableRequest};
use crate::key::{CallableId, ScopeId};
use crate::types::TypeRef;

/// Index of a node in a [`ResolutionGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What satisfies one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyTarget {
    Node(NodeId),
    /// Nothing could be resolved for the request; its default value is used
    Default,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    pub request: InjectableRequest,
    pub target: DependencyTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A chosen candidate with one dependency per injected parameter
    Callable {
        candidate: Arc<Callable>,
        dependencies: Vec<Dependency>,
    },
    /// `Set<E>` built from every matching set contribution
    SetAggregate { elements: Vec<NodeId> },
    /// `Map<K, V>` merged from every matching map contribution
    MapAggregate { entries: Vec<NodeId> },
    /// Function type whose parameters are supplied by the caller at
    /// invocation time
    FunctionProvider {
        parameters: Vec<TypeRef>,
        result: Dependency,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionNode {
    pub id: NodeId,
    /// Requested type this node satisfies
    pub ty: TypeRef,
    /// Scope the node was resolved in
    pub scope: ScopeId,
    pub kind: NodeKind,
}

impl ResolutionNode {
    /// Nodes this one depends on, in declaration order
    pub fn children(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Callable { dependencies, .. } => dependencies
                .iter()
                .filter_map(|d| match d.target {
                    DependencyTarget::Node(id) => Some(id),
                    DependencyTarget::Default => None,
                })
                .collect(),
            NodeKind::SetAggregate { elements } => elements.clone(),
            NodeKind::MapAggregate { entries } => entries.clone(),
            NodeKind::FunctionProvider { result, .. } => match result.target {
                DependencyTarget::Node(id) => vec![id],
                DependencyTarget::Default => Vec::new(),
            },
        }
    }

    /// The candidate for callable nodes
    pub fn candidate(&self) -> Option<&Arc<Callable>> {
        match &self.kind {
            NodeKind::Callable { candidate, .. } => Some(candidate),
            _ => None,
        }
    }
}

/// A successful resolution: a DAG whose shared sub-results are single nodes.
///
/// Nodes are stored in completion order, so every node comes after the
/// nodes it depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionGraph {
    pub(crate) roots: Vec<Dependency>,
    pub(crate) nodes: Vec<ResolutionNode>,
}

impl ResolutionGraph {
    /// One dependency per top-level request, in request order
    pub fn roots(&self) -> &[Dependency] {
        &self.roots
    }

    pub fn nodes(&self) -> &[ResolutionNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&ResolutionNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every dependency edge in the graph, roots first
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.roots.iter().chain(self.nodes.iter().flat_map(|node| match &node.kind {
            NodeKind::Callable { dependencies, .. } => dependencies.iter().collect::<Vec<_>>(),
            NodeKind::FunctionProvider { result, .. } => vec![result],
            _ => Vec::new(),
        }))
    }

    /// Target chosen for `request`, top-level or nested
    pub fn target_of(&self, request: &InjectableRequest) -> Option<DependencyTarget> {
        self.dependencies()
            .find(|d| &d.request == request)
            .map(|d| d.target)
    }

    /// Candidate chosen for `request`, when it resolved to a callable node
    pub fn chosen_for(&self, request: &InjectableRequest) -> Option<&Arc<Callable>> {
        match self.target_of(request)? {
            DependencyTarget::Node(id) => self.node(id)?.candidate(),
            DependencyTarget::Default => None,
        }
    }

    /// Nodes reachable from the roots, each before its dependencies
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root_nodes().rev().collect();

        while let Some(id) = stack.pop() {
            if seen[id.0] {
                continue;
            }
            seen[id.0] = true;
            out.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children().into_iter().rev());
            }
        }
        out
    }

    /// Nodes reachable from the roots, each after its dependencies
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in self.root_nodes() {
            self.visit_post(root, &mut seen, &mut out);
        }
        out
    }

    fn visit_post(&self, id: NodeId, seen: &mut [bool], out: &mut Vec<NodeId>) {
        if seen[id.0] {
            return;
        }
        seen[id.0] = true;
        if let Some(node) = self.node(id) {
            for child in node.children() {
                self.visit_post(child, seen, out);
            }
        }
        out.push(id);
    }

    fn root_nodes(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.roots.iter().filter_map(|d| match d.target {
            DependencyTarget::Node(id) => Some(id),
            DependencyTarget::Default => None,
        })
    }
}

/// One frame of a dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLink {
    pub ty: TypeRef,
    pub candidate: CallableId,
}

/// Malformed declarations found while resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationErrorKind {
    MultipleSpreadParameters,
    TagWithValueParameters,
    UnsubstitutedTypeParameter,
    ExpansionLimitExceeded,
}

impl DeclarationErrorKind {
    pub fn description(self) -> &'static str {
        match self {
            DeclarationErrorKind::MultipleSpreadParameters => {
                "a declaration may have at most one spread type parameter"
            }
            DeclarationErrorKind::TagWithValueParameters => "qualifier tags must not have value parameters",
            DeclarationErrorKind::UnsubstitutedTypeParameter => {
                "injected parameter refers to a type parameter that could not be inferred"
            }
            DeclarationErrorKind::ExpansionLimitExceeded => "expansion limit exceeded",
        }
    }
}

/// Why a resolution failed. Every variant carries the request chain from
/// the top-level request down to the failing one.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionFailure {
    Unresolved {
        request: InjectableRequest,
        chain: Vec<InjectableRequest>,
    },
    CandidateAmbiguity {
        request: InjectableRequest,
        /// Tied candidates, sorted by id
        candidates: Vec<CallableId>,
        chain: Vec<InjectableRequest>,
    },
    CircularDependency {
        request: InjectableRequest,
        /// From the first repeated type up to the request closing the cycle
        cycle: Vec<CycleLink>,
        chain: Vec<InjectableRequest>,
    },
    DeclarationError {
        declaration: Option<CallableId>,
        kind: DeclarationErrorKind,
        chain: Vec<InjectableRequest>,
    },
}

impl ResolutionFailure {
    pub fn chain(&self) -> &[InjectableRequest] {
        match self {
            ResolutionFailure::Unresolved { chain, .. }
            | ResolutionFailure::CandidateAmbiguity { chain, .. }
            | ResolutionFailure::CircularDependency { chain, .. }
            | ResolutionFailure::DeclarationError { chain, .. } => chain,
        }
    }

    /// The failing request; for declaration errors the innermost request
    pub fn request(&self) -> Option<&InjectableRequest> {
        match self {
            ResolutionFailure::Unresolved { request, .. }
            | ResolutionFailure::CandidateAmbiguity { request, .. }
            | ResolutionFailure::CircularDependency { request, .. } => Some(request),
            ResolutionFailure::DeclarationError { chain, .. } => chain.last(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ResolutionFailure::Unresolved { .. } => "unresolved",
            ResolutionFailure::CandidateAmbiguity { .. } => "ambiguous",
            ResolutionFailure::CircularDependency { .. } => "circular",
            ResolutionFailure::DeclarationError { .. } => "declaration",
        }
    }
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::Unresolved { request, .. } => {
                write!(f, "No injectable found for {}", request.ty)
            }
            ResolutionFailure::CandidateAmbiguity { request, candidates, .. } => {
                write!(f, "Ambiguous injectables for {}: ", request.ty)?;
                for (i, candidate) in candidates.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", candidate)?;
                }
                Ok(())
            }
            ResolutionFailure::CircularDependency { cycle, .. } => {
                f.write_str("Circular dependency: ")?;
                for (i, link) in cycle.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" -> ")?;
                    }
                    write!(f, "{}", link.ty)?;
                }
                if let Some(first) = cycle.first() {
                    write!(f, " -> {}", first.ty)?;
                }
                Ok(())
            }
            ResolutionFailure::DeclarationError { declaration: Some(id), kind, .. } => {
                write!(f, "Invalid declaration {}: {}", id, kind.description())
            }
            ResolutionFailure::DeclarationError { declaration: None, kind, .. } => {
                write!(f, "Invalid declaration: {}", kind.description())
            }
        }
    }
}

/// Outcome of one `resolve` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Success(ResolutionGraph),
    Error(ResolutionFailure),
}

impl ResolutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionResult::Success(_))
    }

    pub fn graph(&self) -> Option<&ResolutionGraph> {
        match self {
            ResolutionResult::Success(graph) => Some(graph),
            ResolutionResult::Error(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolutionFailure> {
        match self {
            ResolutionResult::Success(_) => None,
            ResolutionResult::Error(failure) => Some(failure),
        }
    }
}
