//! Candidate index: every injectable visible from a scope chain.
//!
//! Built once per resolution. Links are kept root first so spread
//! templates can refer to their link by position while child links (for
//! function-type providers) are appended at the end.

mod bundles;
mod spread;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;

use crate::callable::{Callable, CandidateKind};
use crate::config::EngineConfig;
use crate::error::InjectError;
use crate::key::CallableId;
use crate::result::DeclarationErrorKind;
use crate::scope::ResolutionScope;
use crate::types::{substitution_map, SubstitutionMap, TypeRef};
use crate::validation::validate_callable;

use spread::{SpreadFrontier, SpreadInstance, SpreadTemplate};

/// Where a candidate sits in the scope chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precedence {
    /// Depth of the declaring link; larger is nearer
    pub depth: usize,
    /// Contributed by a module bundle rather than declared directly
    pub via_bundle: bool,
}

impl Precedence {
    /// Compares nearness: deeper links win, then direct declarations win
    /// over bundle members of the same link
    pub fn cmp_nearness(&self, other: &Precedence) -> Ordering {
        self.depth
            .cmp(&other.depth)
            .then_with(|| other.via_bundle.cmp(&self.via_bundle))
    }
}

/// A candidate that matched a request, instantiated against it.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub callable: Arc<Callable>,
    pub precedence: Precedence,
    /// Had free type parameters before matching the request
    pub generic: bool,
    /// Provided type equals the request without widening
    pub exact: bool,
}

/// Errors raised while collecting candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexError {
    Internal(InjectError),
    Declaration {
        declaration: Option<CallableId>,
        kind: DeclarationErrorKind,
    },
}

impl From<InjectError> for IndexError {
    fn from(err: InjectError) -> Self {
        IndexError::Internal(err)
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::Internal(err) => write!(f, "{}", err),
            IndexError::Declaration { declaration: Some(id), kind } => {
                write!(f, "{}: {}", id, kind.description())
            }
            IndexError::Declaration { declaration: None, kind } => f.write_str(kind.description()),
        }
    }
}

impl std::error::Error for IndexError {}

#[derive(Clone)]
struct Entry {
    callable: Arc<Callable>,
    via_bundle: bool,
    invalid: Option<DeclarationErrorKind>,
}

#[derive(Clone)]
struct Link {
    depth: usize,
    entries: Vec<Entry>,
}

/// Injectables visible from one scope chain.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     AnalysisSession, CallableDescriptor, CandidateIndex, EngineConfig, InMemoryCatalog,
///     ResolutionScope, ScopeRef, TypeDescriptor,
/// };
///
/// let catalog = InMemoryCatalog::builder()
///     .class("app.Impl", &["app.Service"])
///     .provide(ScopeRef::Global, CallableDescriptor::function("app.impl", TypeDescriptor::named("app.Impl")))
///     .build();
/// let session = AnalysisSession::from_catalog(catalog);
/// let scope = ResolutionScope::global(&session).unwrap();
///
/// let mut index = CandidateIndex::new(&scope, &EngineConfig::default()).unwrap();
/// let service = session.type_ref(&TypeDescriptor::named("app.Service")).unwrap();
/// let found = index.candidates_for(&service).unwrap();
/// assert_eq!(found.len(), 1);
/// assert!(!found[0].exact);
/// ```
#[derive(Clone)]
pub struct CandidateIndex {
    scope: ResolutionScope,
    links: Vec<Link>,
    frontier: SpreadFrontier,
    pending_seeds: Vec<TypeRef>,
    max_bundle_instantiations: usize,
}

impl CandidateIndex {
    pub fn new(scope: &ResolutionScope, config: &EngineConfig) -> Result<Self, IndexError> {
        let mut index = CandidateIndex {
            scope: scope.clone(),
            links: Vec::new(),
            frontier: SpreadFrontier::new(config.max_spread_instantiations),
            pending_seeds: Vec::new(),
            max_bundle_instantiations: config.max_bundle_instantiations,
        };

        let mut chain: Vec<&ResolutionScope> = scope.chain().collect();
        chain.reverse();
        for link in chain {
            index.push_link(link)?;
        }
        Ok(index)
    }

    /// Index for `child`, a direct child of this index's scope
    pub fn child(&self, child: &ResolutionScope) -> Result<Self, IndexError> {
        debug_assert_eq!(child.parent().map(|p| p.id()), Some(self.scope.id()));
        let mut index = self.clone();
        index.scope = child.clone();
        index.push_link(child)?;
        Ok(index)
    }

    pub fn scope(&self) -> &ResolutionScope {
        &self.scope
    }

    /// Every visible callable with its precedence, nearest link first.
    /// Spread instances created so far are included; templates are not.
    pub fn visible(&self) -> impl Iterator<Item = (Precedence, &Arc<Callable>)> {
        self.links.iter().rev().flat_map(|link| {
            link.entries.iter().map(move |e| {
                let precedence = Precedence {
                    depth: link.depth,
                    via_bundle: e.via_bundle,
                };
                (precedence, &e.callable)
            })
        })
    }

    /// Types the spread frontier has seen so far
    pub fn frontier_size(&self) -> usize {
        self.frontier.known_types().len()
    }

    fn push_link(&mut self, scope: &ResolutionScope) -> Result<(), IndexError> {
        let position = self.links.len();
        self.links.push(Link {
            depth: scope.depth(),
            entries: Vec::new(),
        });

        for callable in scope.injectables() {
            self.add_entry(position, callable.clone(), false)?;
        }
        let session = scope.session().clone();
        for callable in scope.injectables() {
            if callable.candidate_kind != CandidateKind::ModuleBundle {
                continue;
            }
            let members = bundles::flatten(&session, callable, self.max_bundle_instantiations)?;
            for member in members.iter() {
                self.add_entry(position, member.clone(), true)?;
            }
        }
        Ok(())
    }

    fn add_entry(&mut self, link: usize, callable: Arc<Callable>, via_bundle: bool) -> Result<(), IndexError> {
        let invalid = validate_callable(&callable).err();
        if invalid.is_none() {
            let spread = callable.spread_parameters();
            if spread.len() == 1 {
                let instances = self.frontier.add_template(SpreadTemplate {
                    callable,
                    parameter: spread[0].clone(),
                    link,
                    via_bundle,
                })?;
                self.place(instances);
                return Ok(());
            }
            if !callable.provided_type.contains_type_parameter() {
                self.pending_seeds.push(callable.provided_type.clone());
            }
        }
        self.links[link].entries.push(Entry {
            callable,
            via_bundle,
            invalid,
        });
        Ok(())
    }

    fn place(&mut self, instances: Vec<SpreadInstance>) {
        for instance in instances {
            self.links[instance.link].entries.push(Entry {
                callable: instance.callable,
                via_bundle: instance.via_bundle,
                invalid: None,
            });
        }
    }

    /// Feeds a type into the spread frontier
    pub fn register(&mut self, ty: &TypeRef) -> Result<(), IndexError> {
        if !self.pending_seeds.is_empty() {
            for seed in std::mem::take(&mut self.pending_seeds) {
                let instances = self.frontier.register(&seed)?;
                self.place(instances);
            }
        }
        let instances = self.frontier.register(ty)?;
        self.place(instances);
        Ok(())
    }

    /// Providers and bundles assignable to `requested`, nearest link first.
    ///
    /// Generic candidates come back instantiated against the request. A
    /// malformed declaration that would match is an error rather than a
    /// silent skip.
    pub fn candidates_for(&mut self, requested: &TypeRef) -> Result<Vec<RankedCandidate>, IndexError> {
        self.register(requested)?;
        let mut found = Vec::new();
        let mut seen = AHashSet::new();

        for link in self.links.iter().rev() {
            for entry in &link.entries {
                if !entry.callable.candidate_kind.answers_plain_requests() {
                    continue;
                }
                if let Some(candidate) = self.matching(link, entry, requested)? {
                    if seen.insert((candidate.callable.id.clone(), candidate.callable.provided_type.clone())) {
                        found.push(candidate);
                    }
                }
            }
        }
        Ok(found)
    }

    /// Set (or map) contributions matching `requested`, which is the element
    /// type for sets and the map type for maps. Nearest first, then by id.
    pub fn contributions_for(
        &mut self,
        kind: CandidateKind,
        requested: &TypeRef,
    ) -> Result<Vec<RankedCandidate>, IndexError> {
        self.register(requested)?;
        let mut found = Vec::new();
        for link in self.links.iter().rev() {
            for entry in &link.entries {
                if entry.callable.candidate_kind != kind {
                    continue;
                }
                if let Some(candidate) = self.matching(link, entry, requested)? {
                    found.push(candidate);
                }
            }
        }
        found.sort_by(|a, b| {
            b.precedence
                .cmp_nearness(&a.precedence)
                .then_with(|| a.callable.id.cmp(&b.callable.id))
        });
        found.dedup_by(|a, b| a.callable.id == b.callable.id && a.callable.provided_type == b.callable.provided_type);
        Ok(found)
    }

    fn matching(
        &self,
        link: &Link,
        entry: &Entry,
        requested: &TypeRef,
    ) -> Result<Option<RankedCandidate>, IndexError> {
        let callable = &entry.callable;
        if !callable.provided_type.is_assignable_to(requested) {
            return Ok(None);
        }
        if let Some(kind) = entry.invalid {
            return Err(IndexError::Declaration {
                declaration: Some(callable.id.clone()),
                kind,
            });
        }
        if let Some(target) = &callable.target_scope {
            if !self.scope.has_owner_matching(target) {
                return Ok(None);
            }
        }

        let generic = callable.is_generic();
        let instantiated = if generic {
            let free = callable.free_type_parameters();
            let map: SubstitutionMap = substitution_map(requested, &callable.provided_type)
                .into_iter()
                .filter(|(parameter, _)| free.contains(parameter))
                .collect();
            Arc::new(callable.substitute(&map))
        } else {
            callable.clone()
        };
        // type parameters not owned by the candidate are rigid
        if !instantiated.provided_type.is_subtype_of(requested) {
            return Ok(None);
        }

        let exact = instantiated.provided_type == *requested;
        Ok(Some(RankedCandidate {
            callable: instantiated,
            precedence: Precedence {
                depth: link.depth,
                via_bundle: entry.via_bundle,
            },
            generic,
            exact,
        }))
    }
}

impl fmt::Debug for CandidateIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateIndex")
            .field("scope", &self.scope)
            .field("links", &self.links.len())
            .field("frontier", &self.frontier.known_types().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CallableDescriptor, ClassifierDescriptor, InMemoryCatalog, ScopeRef, TypeDescriptor};
    use crate::scope::ScopeKind;
    use crate::session::AnalysisSession;

    fn named(name: &str) -> TypeDescriptor {
        TypeDescriptor::named(name)
    }

    #[test]
    fn nearer_links_come_first() {
        let catalog = InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.foo", named("app.Service")))
            .provide(ScopeRef::Block("main".into()), CallableDescriptor::function("app.bar", named("app.Service")))
            .build();
        let session = AnalysisSession::from_catalog(catalog);
        let global = ResolutionScope::global(&session).unwrap();
        let block = global
            .child(ScopeKind::Block, "main")
            .injectables(session.injectables(&ScopeRef::Block("main".into())).unwrap().to_vec())
            .build();

        let mut index = CandidateIndex::new(&block, &EngineConfig::default()).unwrap();
        let service = session.type_ref(&named("app.Service")).unwrap();
        let found = index.candidates_for(&service).unwrap();

        let names: Vec<_> = found.iter().map(|c| c.callable.id.fq_name().to_string()).collect();
        assert_eq!(names, vec!["app.bar", "app.foo"]);
        assert_eq!(found[0].precedence.cmp_nearness(&found[1].precedence), Ordering::Greater);
    }

    #[test]
    fn generic_candidates_are_instantiated() {
        let catalog = InMemoryCatalog::builder()
            .classifier(ClassifierDescriptor::interface("app.List").type_parameters(["app.List.E"]))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function(
                    "app.emptyList",
                    TypeDescriptor::with_arguments("app.List", vec![named("app.emptyList.T")]),
                )
                .type_parameters(["app.emptyList.T"]),
            )
            .class("app.Foo", &[])
            .build();
        let session = AnalysisSession::from_catalog(catalog);
        let scope = ResolutionScope::global(&session).unwrap();
        let mut index = CandidateIndex::new(&scope, &EngineConfig::default()).unwrap();

        let requested = session
            .type_ref(&TypeDescriptor::with_arguments("app.List", vec![named("app.Foo")]))
            .unwrap();
        let found = index.candidates_for(&requested).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].generic);
        assert!(found[0].exact);
        assert_eq!(found[0].callable.provided_type, requested);
    }

    #[test]
    fn contributions_never_answer_plain_requests() {
        let catalog = InMemoryCatalog::builder()
            .contribute_to_set(ScopeRef::Global, CallableDescriptor::function("app.plugin", named("app.Plugin")))
            .build();
        let session = AnalysisSession::from_catalog(catalog);
        let scope = ResolutionScope::global(&session).unwrap();
        let mut index = CandidateIndex::new(&scope, &EngineConfig::default()).unwrap();

        let plugin = session.type_ref(&named("app.Plugin")).unwrap();
        assert!(index.candidates_for(&plugin).unwrap().is_empty());
        assert_eq!(index.contributions_for(CandidateKind::SetContribution, &plugin).unwrap().len(), 1);
    }

    #[test]
    fn target_scope_restricts_candidates() {
        let catalog = InMemoryCatalog::builder()
            .class("app.Screen", &[])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.presenter", named("app.Presenter")).target_scope(named("app.Screen")),
            )
            .build();
        let session = AnalysisSession::from_catalog(catalog);
        let global = ResolutionScope::global(&session).unwrap();
        let presenter = session.type_ref(&named("app.Presenter")).unwrap();

        let mut outside = CandidateIndex::new(&global, &EngineConfig::default()).unwrap();
        assert!(outside.candidates_for(&presenter).unwrap().is_empty());

        let screen = global
            .child(ScopeKind::Class, "class app.Screen")
            .owner(session.type_ref(&named("app.Screen")).unwrap())
            .build();
        let mut inside = CandidateIndex::new(&screen, &EngineConfig::default()).unwrap();
        assert_eq!(inside.candidates_for(&presenter).unwrap().len(), 1);
    }
}
