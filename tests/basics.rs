use ferrous_inject::{
    resolve, AnalysisSession, Callable, CallableDescriptor, DependencyTarget, InMemoryCatalog,
    InMemoryCatalogBuilder, NodeKind, RecordingObserver, ResolutionFailure, ResolutionScope, Resolver, ScopeRef,
    TypeDescriptor, ValueParameterDescriptor,
};
use std::sync::Arc;

fn named(name: &str) -> TypeDescriptor {
    TypeDescriptor::named(name)
}

/// Registers the call-site declaration in a package no chain imports
fn with_entry(builder: InMemoryCatalogBuilder, entry: CallableDescriptor) -> Arc<AnalysisSession> {
    AnalysisSession::from_catalog(builder.provide(ScopeRef::Package("entry".into()), entry).build())
}

fn entry(session: &Arc<AnalysisSession>) -> Arc<Callable> {
    session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone()
}

fn resolve_entry(session: &Arc<AnalysisSession>) -> ferrous_inject::ResolutionResult {
    let main = entry(session);
    let scope = ResolutionScope::global(session).unwrap();
    resolve(&main.requests(), &scope, &main).unwrap()
}

#[test]
fn test_single_provider() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.config", named("app.Config"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("config", named("app.Config")),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.roots().len(), 1);
    assert_eq!(graph.nodes()[0].ty.render(), "app.Config");
    assert_eq!(graph.nodes()[0].candidate().unwrap().id.fq_name(), "app.config");
}

#[test]
fn test_shared_dependency_is_one_node() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.database", named("app.Database")))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::class("app.UserRepo").needs("db", named("app.Database")),
            )
            .provide(
                ScopeRef::Global,
                CallableDescriptor::class("app.OrderRepo").needs("db", named("app.Database")),
            ),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .needs("users", named("app.UserRepo"))
            .needs("orders", named("app.OrderRepo")),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    assert_eq!(graph.len(), 3);

    let databases: Vec<_> = graph
        .nodes()
        .iter()
        .filter(|n| n.ty.render() == "app.Database")
        .collect();
    assert_eq!(databases.len(), 1);

    // both repositories point at the same node
    let db = databases[0].id;
    for node in graph.nodes().iter().filter(|n| n.ty.render().ends_with("Repo")) {
        assert_eq!(node.children(), vec![db]);
    }
}

#[test]
fn test_nodes_complete_before_dependents() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.c", named("app.C")))
            .provide(ScopeRef::Global, CallableDescriptor::class("app.B").needs("c", named("app.C")))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::class("app.A")
                    .needs("b", named("app.B"))
                    .needs("c", named("app.C")),
            ),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("a", named("app.A")),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    for node in graph.nodes() {
        for child in node.children() {
            assert!(child < node.id, "{} depends on later node {}", node.id, child);
        }
    }
    let order: Vec<_> = graph.post_order().iter().map(|id| graph.node(*id).unwrap().ty.render()).collect();
    assert_eq!(order, vec!["app.C", "app.B", "app.A"]);
}

#[test]
fn test_default_value_fallback() {
    let session = with_entry(
        InMemoryCatalog::builder().class("app.Timeout", &[]),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .parameter(ValueParameterDescriptor::new("timeout", named("app.Timeout")).with_default()),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    assert!(graph.is_empty());
    assert_eq!(graph.roots()[0].target, DependencyTarget::Default);
}

#[test]
fn test_default_is_not_used_when_a_candidate_exists() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.timeout", named("app.Timeout"))),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .parameter(ValueParameterDescriptor::new("timeout", named("app.Timeout")).with_default()),
    );

    let result = resolve_entry(&session);
    assert!(matches!(result.graph().unwrap().roots()[0].target, DependencyTarget::Node(_)));
}

#[test]
fn test_default_used_when_candidate_dependency_is_missing() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .class("app.Missing", &[])
            .provide(ScopeRef::Global, CallableDescriptor::function("app.clock", named("app.Clock")))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.timeout", named("app.Timeout"))
                    .needs("clock", named("app.Clock"))
                    .needs("missing", named("app.Missing")),
            ),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .parameter(ValueParameterDescriptor::new("timeout", named("app.Timeout")).with_default()),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap_or_else(|| panic!("resolution failed: {:?}", result.failure()));
    assert_eq!(graph.roots()[0].target, DependencyTarget::Default);
    // the clock was only needed by the abandoned provider
    assert!(graph.is_empty());
}

#[test]
fn test_nested_default_absorbs_missing_dependency() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .class("app.Missing", &[])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.timeout", named("app.Timeout")).needs("missing", named("app.Missing")),
            )
            .provide(
                ScopeRef::Global,
                CallableDescriptor::class("app.Client")
                    .parameter(ValueParameterDescriptor::new("timeout", named("app.Timeout")).with_default()),
            ),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("client", named("app.Client")),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap_or_else(|| panic!("resolution failed: {:?}", result.failure()));
    assert_eq!(graph.len(), 1);
    match &graph.nodes()[0].kind {
        NodeKind::Callable { candidate, dependencies } => {
            assert_eq!(candidate.id.fq_name(), "app.Client");
            assert_eq!(dependencies[0].target, DependencyTarget::Default);
        }
        other => panic!("unexpected node {:?}", other),
    }
}

#[test]
fn test_default_does_not_hide_a_cycle() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.timeout", named("app.Timeout")).needs("policy", named("app.Policy")),
            )
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.policy", named("app.Policy")).needs("timeout", named("app.Timeout")),
            ),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .parameter(ValueParameterDescriptor::new("timeout", named("app.Timeout")).with_default()),
    );

    let result = resolve_entry(&session);
    assert!(matches!(result.failure(), Some(ResolutionFailure::CircularDependency { .. })));
}

#[test]
fn test_unresolved_carries_the_chain() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .class("app.Missing", &[])
            .provide(ScopeRef::Global, CallableDescriptor::class("app.B").needs("missing", named("app.Missing")))
            .provide(ScopeRef::Global, CallableDescriptor::class("app.A").needs("b", named("app.B"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("a", named("app.A")),
    );

    let result = resolve_entry(&session);
    match result.failure() {
        Some(ResolutionFailure::Unresolved { request, chain }) => {
            assert_eq!(request.ty.render(), "app.Missing");
            assert_eq!(request.parameter_name.as_ref(), "missing");
            let names: Vec<_> = chain.iter().map(|r| r.parameter_name.to_string()).collect();
            assert_eq!(names, vec!["a", "b", "missing"]);
        }
        other => panic!("expected unresolved, got {:?}", other),
    }
}

#[test]
fn test_subtype_candidate() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .class("app.PostgresDb", &["app.Db"])
            .provide(ScopeRef::Global, CallableDescriptor::function("app.postgres", named("app.PostgresDb"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("db", named("app.Db")),
    );

    let result = resolve_entry(&session);
    let main = entry(&session);
    let chosen = result.graph().unwrap().chosen_for(&main.requests()[0]).unwrap().clone();
    assert_eq!(chosen.id.fq_name(), "app.postgres");
}

#[test]
fn test_nullable_request_accepts_non_null_provider() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.logger", named("app.Logger"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("logger", named("app.Logger").nullable()),
    );
    assert!(resolve_entry(&session).is_success());
}

#[test]
fn test_nullable_provider_does_not_satisfy_non_null_request() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.logger", named("app.Logger").nullable())),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("logger", named("app.Logger")),
    );
    let result = resolve_entry(&session);
    assert!(matches!(result.failure(), Some(ResolutionFailure::Unresolved { .. })));
}

#[test]
fn test_assisted_parameters_are_not_requested() {
    let session = AnalysisSession::from_catalog(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.client", named("app.Client")))
            .provide(
                ScopeRef::Package("entry".into()),
                CallableDescriptor::class("app.Session")
                    .needs("client", named("app.Client"))
                    .needs("user", named("app.User")),
            )
            .assisted("app.Session", "user")
            .build(),
    );
    let session_class = entry(&session);
    let requests = session_class.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].parameter_name.as_ref(), "client");

    let scope = ResolutionScope::global(&session).unwrap();
    assert!(resolve(&requests, &scope, &session_class).unwrap().is_success());
}

#[test]
fn test_first_failing_request_wins() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .class("app.First", &[])
            .class("app.Second", &[]),
        CallableDescriptor::function("app.main", named("app.Unit"))
            .needs("first", named("app.First"))
            .needs("second", named("app.Second")),
    );
    let result = resolve_entry(&session);
    assert_eq!(result.failure().unwrap().request().unwrap().parameter_name.as_ref(), "first");
}

#[test]
fn test_observer_sees_every_request() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.database", named("app.Database")))
            .provide(ScopeRef::Global, CallableDescriptor::class("app.Repo").needs("db", named("app.Database"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("repo", named("app.Repo")),
    );
    let observer = Arc::new(RecordingObserver::new());
    let mut resolver = Resolver::new(session.clone());
    resolver.add_observer(observer.clone());

    let main = entry(&session);
    let scope = ResolutionScope::global(&session).unwrap();
    let result = resolver.resolve(&main.requests(), &scope, &main).unwrap();
    assert!(result.is_success());
    assert_eq!(observer.requested_types(), vec!["app.Repo", "app.Database"]);
}

#[test]
fn test_callable_node_records_dependencies() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.database", named("app.Database")))
            .provide(ScopeRef::Global, CallableDescriptor::class("app.Repo").needs("db", named("app.Database"))),
        CallableDescriptor::function("app.main", named("app.Unit")).needs("repo", named("app.Repo")),
    );
    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    let repo = graph.nodes().iter().find(|n| n.ty.render() == "app.Repo").unwrap();
    match &repo.kind {
        NodeKind::Callable { candidate, dependencies } => {
            assert_eq!(candidate.id.fq_name(), "app.Repo");
            assert_eq!(dependencies.len(), 1);
            assert_eq!(dependencies[0].request.parameter_name.as_ref(), "db");
            assert_eq!(dependencies[0].request.origin, candidate.id);
        }
        other => panic!("expected callable node, got {:?}", other),
    }
}
