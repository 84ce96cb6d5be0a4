//! # ferrous-inject
//!
//! Compile-time dependency injection resolution for compiler plugins.
//!
//! Given the injection requests of a call site (the value parameters that
//! should be filled in automatically) and the chain of lexical scopes around
//! it, the engine picks exactly one provider for every request, recursively,
//! and returns either a wiring graph a code emitter can turn into calls, or
//! a single structured failure a diagnostic reporter can show.
//!
//! ## Features
//!
//! - **Nearest scope wins**: a provider in a block shadows one in its file,
//!   which shadows the global ones
//! - **Generic providers**: type parameters are inferred by unifying the
//!   provided type against the request, with variance and nullability
//! - **Module bundles**: objects whose members are providers, including
//!   generic bundles and bundles that include other bundles
//! - **Spread providers**: one declaration instantiated for every matching
//!   candidate type
//! - **Multibindings and lazy providers**: `Set<E>` and `Map<K, V>` requests
//!   aggregate contributions; function-type requests resolve their result
//!   with the function's parameters in scope
//! - **Deterministic**: the same catalog and call site always give the same
//!   graph, node order included
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_inject::{
//!     AnalysisSession, Callable, CallableDescriptor, CallableId, CallSite, CandidateKind,
//!     DeclarationKind, InMemoryCatalog, InjectableRequest, Resolver, ScopeChainBuilder, ScopeRef,
//!     SourcePosition, TypeDescriptor,
//! };
//!
//! let catalog = InMemoryCatalog::builder()
//!     .class("app.Unit", &[])
//!     .provide(ScopeRef::Global, CallableDescriptor::function("app.systemClock", TypeDescriptor::named("app.Clock")))
//!     .provide(ScopeRef::Block("test#0".into()), CallableDescriptor::function("app.fakeClock", TypeDescriptor::named("app.Clock")))
//!     .provide(
//!         ScopeRef::Global,
//!         CallableDescriptor::class("app.Scheduler").needs("clock", TypeDescriptor::named("app.Clock")),
//!     )
//!     .build();
//! let session = AnalysisSession::from_catalog(catalog);
//!
//! // The call site sits inside block `test#0` of `test.kt`
//! let scope = ScopeChainBuilder::new(session.clone())
//!     .build(&CallSite::new("test.kt").block("test#0"))
//!     .unwrap();
//! let caller = Callable::new(
//!     CallableId::new("app.test", SourcePosition::new("test.kt", 3, 1)),
//!     DeclarationKind::Function,
//!     CandidateKind::Provider,
//!     session.type_ref(&TypeDescriptor::named("app.Unit")).unwrap(),
//! );
//! let request = InjectableRequest::new(
//!     session.type_ref(&TypeDescriptor::named("app.Scheduler")).unwrap(),
//!     caller.id.clone(),
//!     0,
//!     "scheduler",
//! );
//!
//! let result = Resolver::new(session).resolve(&[request], &scope, &caller).unwrap();
//! let graph = result.graph().unwrap();
//!
//! // The block's clock shadows the global one
//! let clock = graph.nodes().iter().find(|n| n.ty.render() == "app.Clock").unwrap();
//! assert_eq!(clock.candidate().unwrap().id.fq_name(), "app.fakeClock");
//! ```
//!
//! ## Failures
//!
//! Everything a user can fix comes back as a [`ResolutionFailure`] inside
//! [`ResolutionResult::Error`]: a missing provider, a tie between equally
//! good providers, a dependency cycle, or a malformed declaration. Each one
//! carries the request chain that led to it, and [`render_failure`] turns it
//! into a [`Diagnostic`]. [`InjectError`] is reserved for inconsistent
//! catalog data.
//!
//! ```rust
//! use ferrous_inject::{
//!     resolve, AnalysisSession, CallableDescriptor, InMemoryCatalog, ResolutionFailure,
//!     ResolutionScope, ScopeRef, TypeDescriptor,
//! };
//!
//! let catalog = InMemoryCatalog::builder()
//!     .provide(ScopeRef::Global, CallableDescriptor::function("app.primary", TypeDescriptor::named("app.Db")))
//!     .provide(ScopeRef::Global, CallableDescriptor::function("app.replica", TypeDescriptor::named("app.Db")))
//!     .provide(ScopeRef::File("repo.kt".into()), CallableDescriptor::class("app.Repo").needs("db", TypeDescriptor::named("app.Db")))
//!     .build();
//! let session = AnalysisSession::from_catalog(catalog);
//! let repo = session.injectables(&ScopeRef::File("repo.kt".into())).unwrap()[0].clone();
//! let scope = ResolutionScope::global(&session).unwrap();
//!
//! let result = resolve(&repo.requests(), &scope, &repo).unwrap();
//! match result.failure() {
//!     Some(ResolutionFailure::CandidateAmbiguity { candidates, .. }) => {
//!         let names: Vec<_> = candidates.iter().map(|c| c.fq_name()).collect();
//!         assert_eq!(names, vec!["app.primary", "app.replica"]);
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod callable;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod graph_export;
pub mod index;
pub mod key;
pub mod observer;
pub mod result;
pub mod scope;
pub mod session;
pub mod types;
pub mod validation;

// Internal modules
mod internal;

pub use callable::{Callable, CandidateKind, DeclarationKind, InjectableRequest, ValueParameter};
pub use catalog::{
    AnnotationTag, CallableDescriptor, ClassifierDescriptor, ClassifierKind, DeclarationCatalog, DeclarationId,
    InMemoryCatalog, InMemoryCatalogBuilder, ScopeRef, TypeDescriptor, ValueParameterDescriptor,
};
pub use config::{ConfigSource, ConfigValue, EngineConfig, EnvironmentConfigSource, MapConfigSource, ENV_PREFIX};
pub use diagnostics::{render_failure, Diagnostic};
pub use engine::{resolve, RankingPolicy, RankingRule, Resolver, Selection};
pub use error::{InjectError, InjectResult};
pub use graph_export::{
    exports, DefaultGraphExporter, DependencyGraph, DependencyType, ExportFormat, ExportOptions, GraphBuilder,
    GraphEdge, GraphExporter, GraphMetadata, GraphNode, NodeCategory,
};
pub use index::{CandidateIndex, IndexError, Precedence, RankedCandidate};
pub use key::{CallableId, InstantiationKey, ScopeId, SourcePosition};
pub use observer::{LoggingObserver, ObservedEvent, RecordingObserver, ResolutionObserver};
pub use result::{
    CycleLink, DeclarationErrorKind, Dependency, DependencyTarget, NodeId, NodeKind, ResolutionFailure,
    ResolutionGraph, ResolutionNode, ResolutionResult,
};
pub use scope::{CallSite, ChildScopeBuilder, EnclosingDeclaration, ResolutionScope, ScopeChainBuilder, ScopeKind};
pub use session::{AnalysisSession, CallableList, SessionStats};
pub use types::{
    substitution_map, ClassifierBuilder, ClassifierRef, QualifierTag, SubstitutionMap, TypeRef, Variance,
    ANY_TYPE_NAME, UNIQUE_NAME_LIMIT,
};
pub use validation::{validate_callable, validate_scope, ValidationError, ValidationReport, ValidationWarning};
