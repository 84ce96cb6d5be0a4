//! The resolution engine.
//!
//! Resolution is a depth-first walk over the request fringe. Each request
//! is answered by reusing an already resolved node, by the single best
//! ranked candidate whose dependencies resolve, by a synthesized aggregate
//! or function provider, or by its default value. Everything a user can fix ends the walk with a
//! [`ResolutionFailure`]; only broken catalog data surfaces as an
//! [`InjectError`].

mod ranking;

pub use ranking::{RankingPolicy, RankingRule, Selection};

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tracing::{debug, debug_span};

use crate::callable::{Callable, CandidateKind, DeclarationKind, InjectableRequest};
use crate::config::EngineConfig;
use crate::error::{InjectError, InjectResult};
use crate::index::{CandidateIndex, IndexError, RankedCandidate};
use crate::internal::{DepthExceeded, ResolutionStack};
use crate::key::{CallableId, ScopeId};
use crate::observer::{Observers, ResolutionObserver};
use crate::result::{
    DeclarationErrorKind, Dependency, DependencyTarget, NodeId, NodeKind, ResolutionFailure, ResolutionGraph,
    ResolutionNode, ResolutionResult,
};
use crate::scope::{CallSite, ResolutionScope, ScopeChainBuilder, ScopeKind};
use crate::session::AnalysisSession;
use crate::types::{TypeRef, Variance};

/// Resolves injection requests against scope chains.
///
/// A resolver is cheap to keep around: it holds the session, the
/// configuration, and any observers. Every [`resolve`](Resolver::resolve)
/// call builds its own candidate index and graph.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     AnalysisSession, CallableDescriptor, InMemoryCatalog, ResolutionScope, Resolver, ScopeRef,
///     TypeDescriptor,
/// };
///
/// let catalog = InMemoryCatalog::builder()
///     .provide(ScopeRef::Global, CallableDescriptor::function("app.config", TypeDescriptor::named("app.Config")))
///     .provide(
///         ScopeRef::Global,
///         CallableDescriptor::class("app.Service").needs("config", TypeDescriptor::named("app.Config")),
///     )
///     .declare(
///         ScopeRef::File("main.kt".into()),
///         CallableDescriptor::function("app.main", TypeDescriptor::named("app.Unit"))
///             .needs("service", TypeDescriptor::named("app.Service")),
///         &[ferrous_inject::AnnotationTag::Provide],
///     )
///     .build();
/// let session = AnalysisSession::from_catalog(catalog);
/// let main = session.injectables(&ScopeRef::File("main.kt".into())).unwrap()[0].clone();
/// let scope = ResolutionScope::global(&session).unwrap();
///
/// let result = Resolver::new(session).resolve(&main.requests(), &scope, &main).unwrap();
/// let graph = result.graph().unwrap();
/// assert_eq!(graph.len(), 2);
/// assert_eq!(graph.chosen_for(&main.requests()[0]).unwrap().id.fq_name(), "app.Service");
/// ```
pub struct Resolver {
    session: Arc<AnalysisSession>,
    config: EngineConfig,
    observers: Observers,
}

impl Resolver {
    pub fn new(session: Arc<AnalysisSession>) -> Self {
        Self::with_config(session, EngineConfig::default())
    }

    pub fn with_config(session: Arc<AnalysisSession>, config: EngineConfig) -> Self {
        Self {
            session,
            config,
            observers: Observers::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ResolutionObserver>) {
        self.observers.add(observer);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<AnalysisSession> {
        &self.session
    }

    /// Resolves `requests` as seen from `scope`.
    ///
    /// `originating` is the declaration owning the call site; its bound
    /// type arguments are applied to every request first. The first failing
    /// request, in request order, decides the failure.
    pub fn resolve(
        &self,
        requests: &[InjectableRequest],
        scope: &ResolutionScope,
        originating: &Callable,
    ) -> InjectResult<ResolutionResult> {
        debug_assert!(Arc::ptr_eq(&self.session, scope.session()));
        let span = debug_span!("resolve", origin = %originating.id, scope = %scope.id(), requests = requests.len());
        let _enter = span.enter();

        let index = match CandidateIndex::new(scope, &self.config) {
            Ok(index) => index,
            Err(IndexError::Internal(err)) => return Err(err),
            Err(IndexError::Declaration { declaration, kind }) => {
                return Ok(self.fail(ResolutionFailure::DeclarationError {
                    declaration,
                    kind,
                    chain: Vec::new(),
                }));
            }
        };

        let mut run = ResolutionRun::new(self, index);
        let mut roots = Vec::with_capacity(requests.len());
        for request in requests {
            let request = bind_to_origin(request, originating);
            match run.resolve_request(&request) {
                Ok(target) => roots.push(Dependency { request, target }),
                Err(Interrupt::Internal(err)) => return Err(err),
                Err(Interrupt::Failure(failure)) => return Ok(self.fail(failure)),
            }
        }

        debug!(nodes = run.nodes.len(), "resolution succeeded");
        Ok(ResolutionResult::Success(ResolutionGraph {
            roots,
            nodes: run.nodes,
        }))
    }

    /// Builds the scope chain for `site` and resolves every injected
    /// parameter of `originating` there
    pub fn resolve_call_site(&self, site: &CallSite, originating: &Callable) -> InjectResult<ResolutionResult> {
        let scope = ScopeChainBuilder::new(self.session.clone()).build(site)?;
        let requests: Vec<InjectableRequest> = originating
            .requests()
            .into_iter()
            .map(|request| match &site.position {
                Some(position) => request.at(position.clone()),
                None => request,
            })
            .collect();
        self.resolve(&requests, &scope, originating)
    }

    fn fail(&self, failure: ResolutionFailure) -> ResolutionResult {
        debug!(kind = failure.kind_name(), "resolution failed: {}", failure);
        if self.observers.has_observers() {
            self.observers.failed(&failure);
        }
        ResolutionResult::Error(failure)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .field("observers", &self.observers)
            .finish()
    }
}

/// Resolves with the default configuration and the scope's session.
pub fn resolve(
    requests: &[InjectableRequest],
    scope: &ResolutionScope,
    originating: &Callable,
) -> InjectResult<ResolutionResult> {
    Resolver::new(scope.session().clone()).resolve(requests, scope, originating)
}

fn bind_to_origin(request: &InjectableRequest, originating: &Callable) -> InjectableRequest {
    if originating.type_arguments.is_empty() {
        return request.clone();
    }
    InjectableRequest {
        ty: request.ty.substitute(&originating.type_arguments),
        ..request.clone()
    }
}

/// Why a walk stopped early.
enum Interrupt {
    Failure(ResolutionFailure),
    Internal(InjectError),
}

impl From<InjectError> for Interrupt {
    fn from(err: InjectError) -> Self {
        Interrupt::Internal(err)
    }
}

/// Length of the node arena before an attempt that may be abandoned.
#[derive(Debug, Clone, Copy)]
struct Checkpoint(usize);

/// State of one `resolve` call.
struct ResolutionRun<'r> {
    resolver: &'r Resolver,
    /// Index of the innermost scope; `outer` holds the ones it shadows
    index: CandidateIndex,
    outer: Vec<CandidateIndex>,
    nodes: Vec<ResolutionNode>,
    by_type: AHashMap<(ScopeId, TypeRef), NodeId>,
    stack: ResolutionStack,
    chain: Vec<InjectableRequest>,
    visited: AHashSet<TypeRef>,
}

impl<'r> ResolutionRun<'r> {
    fn new(resolver: &'r Resolver, index: CandidateIndex) -> Self {
        Self {
            resolver,
            index,
            outer: Vec::new(),
            nodes: Vec::new(),
            by_type: AHashMap::new(),
            stack: ResolutionStack::new(resolver.config.max_depth),
            chain: Vec::new(),
            visited: AHashSet::new(),
        }
    }

    fn config(&self) -> &'r EngineConfig {
        &self.resolver.config
    }

    fn resolve_request(&mut self, request: &InjectableRequest) -> Result<DependencyTarget, Interrupt> {
        self.chain.push(request.clone());
        let result = self.resolve_in_chain(request);
        self.chain.pop();
        result
    }

    fn resolve_in_chain(&mut self, request: &InjectableRequest) -> Result<DependencyTarget, Interrupt> {
        let ty = &request.ty;
        let scope = self.index.scope().id();
        if let Some(&id) = self.by_type.get(&(scope, ty.clone())) {
            self.observe_resolved(request, Some(id));
            return Ok(DependencyTarget::Node(id));
        }

        if self.visited.insert(ty.clone()) && self.visited.len() > self.config().max_visited_types {
            return Err(self.declaration_failure(
                Some(request.origin.clone()),
                DeclarationErrorKind::ExpansionLimitExceeded,
            ));
        }
        if self.resolver.observers.has_observers() {
            self.resolver.observers.resolving(request);
        }

        let candidates = match self.index.candidates_for(ty) {
            Ok(candidates) => candidates,
            Err(err) => return Err(self.index_failure(err)),
        };
        debug!(ty = %ty, candidates = candidates.len(), "collected candidates");

        let checkpoint = self.checkpoint();
        let outcome = match self.config().ranking.select(candidates) {
            None => self.resolve_without_candidates(request),
            Some(Selection::Chosen(chosen)) => {
                debug!(ty = %ty, chosen = %chosen.callable.id, "selected candidate");
                self.resolve_candidate(request, chosen.callable).map(DependencyTarget::Node)
            }
            Some(Selection::Tied(tied)) => self.resolve_tied(request, tied).map(DependencyTarget::Node),
        };

        match outcome {
            Ok(target) => {
                if let DependencyTarget::Node(id) = target {
                    self.observe_resolved(request, Some(id));
                }
                Ok(target)
            }
            Err(Interrupt::Failure(ResolutionFailure::Unresolved { request: missing, .. })) if request.has_default => {
                self.rollback(checkpoint);
                debug!(ty = %ty, missing = %missing.ty, "dependency unresolved, falling back to default value");
                self.observe_resolved(request, None);
                Ok(DependencyTarget::Default)
            }
            Err(interrupt) => Err(interrupt),
        }
    }

    /// Tries every tied candidate; only those whose dependencies resolve
    /// stay in the running. The first failure, in callable id order, is
    /// reported when none do.
    fn resolve_tied(&mut self, request: &InjectableRequest, tied: Vec<RankedCandidate>) -> Result<NodeId, Interrupt> {
        let key = (self.index.scope().id(), request.ty.clone());
        let mut resolved: Vec<(CallableId, NodeId)> = Vec::new();
        let mut first_failure = None;

        for candidate in tied {
            let checkpoint = self.checkpoint();
            let id = candidate.callable.id.clone();
            match self.resolve_candidate(request, candidate.callable) {
                Ok(node) => {
                    // later attempts must not reuse this one through the memo
                    self.by_type.remove(&key);
                    resolved.push((id, node));
                }
                Err(Interrupt::Failure(failure)) => {
                    debug!(ty = %request.ty, candidate = %id, "tied candidate failed: {}", failure);
                    self.rollback(checkpoint);
                    first_failure.get_or_insert(failure);
                }
                Err(internal) => return Err(internal),
            }
        }

        if resolved.len() > 1 {
            return Err(Interrupt::Failure(ResolutionFailure::CandidateAmbiguity {
                request: request.clone(),
                candidates: resolved.into_iter().map(|(id, _)| id).collect(),
                chain: self.chain.clone(),
            }));
        }
        match resolved.pop() {
            Some((id, node)) => {
                debug!(ty = %request.ty, chosen = %id, "tie broken by resolvability");
                self.by_type.insert(key, node);
                Ok(node)
            }
            None => Err(Interrupt::Failure(first_failure.unwrap_or_else(|| ResolutionFailure::Unresolved {
                request: request.clone(),
                chain: self.chain.clone(),
            }))),
        }
    }

    fn resolve_without_candidates(&mut self, request: &InjectableRequest) -> Result<DependencyTarget, Interrupt> {
        if let Some(id) = self.synthesize(request)? {
            return Ok(DependencyTarget::Node(id));
        }
        if request.has_default {
            debug!(ty = %request.ty, "falling back to default value");
            self.observe_resolved(request, None);
            return Ok(DependencyTarget::Default);
        }
        Err(Interrupt::Failure(ResolutionFailure::Unresolved {
            request: request.clone(),
            chain: self.chain.clone(),
        }))
    }

    fn resolve_candidate(&mut self, request: &InjectableRequest, candidate: Arc<Callable>) -> Result<NodeId, Interrupt> {
        self.check_substituted(&candidate)?;
        self.enter(request, &candidate.id)?;
        let dependencies = self.resolve_dependencies(&candidate);
        self.stack.pop();

        let kind = NodeKind::Callable {
            candidate,
            dependencies: dependencies?,
        };
        Ok(self.add_node(request.ty.clone(), kind, true))
    }

    fn resolve_dependencies(&mut self, candidate: &Callable) -> Result<Vec<Dependency>, Interrupt> {
        let mut dependencies = Vec::with_capacity(candidate.value_parameters.len());
        for request in candidate.requests() {
            let target = self.resolve_request(&request)?;
            dependencies.push(Dependency { request, target });
        }
        Ok(dependencies)
    }

    /// A candidate whose injected parameters still mention its own unbound
    /// type parameters cannot be called
    fn check_substituted(&self, candidate: &Callable) -> Result<(), Interrupt> {
        let free = candidate.free_type_parameters();
        if !free.is_empty() && candidate.injected_parameters().any(|(_, p)| p.ty.mentions_any(&free)) {
            return Err(self.declaration_failure(
                Some(candidate.id.clone()),
                DeclarationErrorKind::UnsubstitutedTypeParameter,
            ));
        }
        Ok(())
    }

    /// Pushes (`request.ty`, `candidate`) unless that closes a cycle
    fn enter(&mut self, request: &InjectableRequest, candidate: &CallableId) -> Result<(), Interrupt> {
        if let Some(cycle) = self.stack.cycle_from(&request.ty, candidate) {
            return Err(Interrupt::Failure(ResolutionFailure::CircularDependency {
                request: request.clone(),
                cycle,
                chain: self.chain.clone(),
            }));
        }
        match self.stack.push(request.ty.clone(), candidate.clone()) {
            Ok(()) => Ok(()),
            Err(DepthExceeded) => {
                debug!(depth = self.stack.depth(), "resolution stack limit reached");
                Err(self.declaration_failure(Some(candidate.clone()), DeclarationErrorKind::ExpansionLimitExceeded))
            }
        }
    }

    // ===== Synthesized candidates =====

    fn synthesize(&mut self, request: &InjectableRequest) -> Result<Option<NodeId>, Interrupt> {
        let ty = &request.ty;
        let name = ty.classifier.fq_name();
        if ty.arguments.len() == 1 && name == self.config().set_classifier {
            let element = ty.arguments[0].clone().with_variance(Variance::Invariant);
            if element.is_star_projection {
                return Ok(None);
            }
            return self.aggregate(request, CandidateKind::SetContribution, element);
        }
        if ty.arguments.len() == 2 && name == self.config().map_classifier {
            let map = ty.clone().with_variance(Variance::Invariant);
            return self.aggregate(request, CandidateKind::MapContribution, map);
        }
        if ty.is_function_type() {
            return self.function_provider(request).map(Some);
        }
        Ok(None)
    }

    fn aggregate(
        &mut self,
        request: &InjectableRequest,
        kind: CandidateKind,
        matched: TypeRef,
    ) -> Result<Option<NodeId>, Interrupt> {
        let contributions = match self.index.contributions_for(kind, &matched) {
            Ok(contributions) => contributions,
            Err(err) => return Err(self.index_failure(err)),
        };
        if contributions.is_empty() {
            return Ok(None);
        }
        debug!(ty = %request.ty, contributions = contributions.len(), "aggregating contributions");

        let aggregate = CallableId::synthetic(request.ty.render());
        self.enter(request, &aggregate)?;
        let mut members = Vec::with_capacity(contributions.len());
        for contribution in contributions {
            match self.contribution_node(contribution.callable) {
                Ok(id) => members.push(id),
                Err(interrupt) => {
                    self.stack.pop();
                    return Err(interrupt);
                }
            }
        }
        self.stack.pop();

        let node = match kind {
            CandidateKind::MapContribution => NodeKind::MapAggregate { entries: members },
            _ => NodeKind::SetAggregate { elements: members },
        };
        Ok(Some(self.add_node(request.ty.clone(), node, true)))
    }

    /// Contributions are never shared: two may provide the same type
    fn contribution_node(&mut self, contribution: Arc<Callable>) -> Result<NodeId, Interrupt> {
        self.check_substituted(&contribution)?;
        let dependencies = self.resolve_dependencies(&contribution)?;
        let ty = contribution.provided_type.clone();
        let kind = NodeKind::Callable {
            candidate: contribution,
            dependencies,
        };
        Ok(self.add_node(ty, kind, false))
    }

    /// `Function<P.., R>`: resolves `R` in a child scope where each `P` is
    /// a candidate supplied by the caller
    fn function_provider(&mut self, request: &InjectableRequest) -> Result<NodeId, Interrupt> {
        let Some((result, parameters)) = request.ty.arguments.split_last() else {
            return Err(Interrupt::Internal(InjectError::CorruptSubstitution(format!(
                "function type {} has no result type",
                request.ty
            ))));
        };
        let parameters: Vec<TypeRef> = parameters
            .iter()
            .map(|p| p.clone().with_variance(Variance::Invariant))
            .collect();
        let result = result.clone().with_variance(Variance::Invariant);

        let provider = CallableId::synthetic(request.ty.render());
        self.enter(request, &provider)?;
        let outcome = self.resolve_in_provider_scope(request, &provider, &parameters, result);
        self.stack.pop();

        let node = NodeKind::FunctionProvider {
            parameters,
            result: outcome?,
        };
        Ok(self.add_node(request.ty.clone(), node, true))
    }

    fn resolve_in_provider_scope(
        &mut self,
        request: &InjectableRequest,
        provider: &CallableId,
        parameters: &[TypeRef],
        result: TypeRef,
    ) -> Result<Dependency, Interrupt> {
        let injectables = parameters
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                let id = CallableId::synthetic(format!("{}.p{}", provider, i + 1));
                Arc::new(Callable::new(id, DeclarationKind::Property, CandidateKind::Provider, ty.clone()))
            })
            .collect();
        let scope = self
            .index
            .scope()
            .child(ScopeKind::Provider, format!("provider {}", request.ty))
            .injectables(injectables)
            .build();
        let child = match self.index.child(&scope) {
            Ok(child) => child,
            Err(err) => return Err(self.index_failure(err)),
        };

        let mut result_request = InjectableRequest::new(result, provider.clone(), 0, "result");
        if let Some(position) = &request.position {
            result_request = result_request.at(position.clone());
        }

        let parent = std::mem::replace(&mut self.index, child);
        self.outer.push(parent);
        let target = self.resolve_request(&result_request);
        if let Some(parent) = self.outer.pop() {
            self.index = parent;
        }
        Ok(Dependency {
            request: result_request,
            target: target?,
        })
    }

    // ===== Bookkeeping =====

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.nodes.len())
    }

    /// Drops every node added since `to`, along with its memo entries
    fn rollback(&mut self, to: Checkpoint) {
        if self.nodes.len() > to.0 {
            self.nodes.truncate(to.0);
            self.by_type.retain(|_, id| id.index() < to.0);
        }
    }

    fn add_node(&mut self, ty: TypeRef, kind: NodeKind, shared: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        let scope = self.index.scope().id();
        self.nodes.push(ResolutionNode {
            id,
            ty: ty.clone(),
            scope,
            kind,
        });
        if shared {
            self.by_type.insert((scope, ty), id);
        }
        id
    }

    fn observe_resolved(&self, request: &InjectableRequest, id: Option<NodeId>) {
        if self.resolver.observers.has_observers() {
            let node = id.and_then(|id| self.nodes.get(id.index()));
            self.resolver.observers.resolved(request, node);
        }
    }

    fn declaration_failure(&self, declaration: Option<CallableId>, kind: DeclarationErrorKind) -> Interrupt {
        Interrupt::Failure(ResolutionFailure::DeclarationError {
            declaration,
            kind,
            chain: self.chain.clone(),
        })
    }

    fn index_failure(&self, err: IndexError) -> Interrupt {
        match err {
            IndexError::Internal(err) => Interrupt::Internal(err),
            IndexError::Declaration { declaration, kind } => self.declaration_failure(declaration, kind),
        }
    }
}
