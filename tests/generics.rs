use ferrous_inject::{
    resolve, AnalysisSession, Callable, CallableDescriptor, DeclarationErrorKind, EngineConfig, InMemoryCatalog,
    InMemoryCatalogBuilder, ResolutionFailure, ResolutionResult, ResolutionScope, Resolver, ScopeRef,
    TypeDescriptor, Variance,
};
use std::sync::Arc;

fn named(name: &str) -> TypeDescriptor {
    TypeDescriptor::named(name)
}

fn generic(name: &str, arguments: Vec<TypeDescriptor>) -> TypeDescriptor {
    TypeDescriptor::with_arguments(name, arguments)
}

/// `List<E>` and `Box<E>` plus the given declarations
fn catalog() -> InMemoryCatalogBuilder {
    InMemoryCatalog::builder()
        .classifier(ferrous_inject::ClassifierDescriptor::interface("app.List").type_parameters(["app.List.E"]))
        .classifier(ferrous_inject::ClassifierDescriptor::class("app.Box").type_parameters(["app.Box.E"]))
}

fn session_needing(builder: InMemoryCatalogBuilder, ty: TypeDescriptor) -> Arc<AnalysisSession> {
    AnalysisSession::from_catalog(
        builder
            .provide(
                ScopeRef::Package("entry".into()),
                CallableDescriptor::function("app.main", named("app.Unit")).needs("value", ty),
            )
            .build(),
    )
}

fn entry(session: &Arc<AnalysisSession>) -> Arc<Callable> {
    session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone()
}

fn resolve_with(session: &Arc<AnalysisSession>, config: EngineConfig) -> ResolutionResult {
    let main = entry(session);
    let scope = ResolutionScope::global(session).unwrap();
    Resolver::with_config(session.clone(), config)
        .resolve(&main.requests(), &scope, &main)
        .unwrap()
}

fn resolve_entry(session: &Arc<AnalysisSession>) -> ResolutionResult {
    let main = entry(session);
    let scope = ResolutionScope::global(session).unwrap();
    resolve(&main.requests(), &scope, &main).unwrap()
}

fn chosen(session: &Arc<AnalysisSession>, result: &ResolutionResult) -> Arc<Callable> {
    let graph = result
        .graph()
        .unwrap_or_else(|| panic!("resolution failed: {:?}", result.failure()));
    graph.chosen_for(&entry(session).requests()[0]).unwrap().clone()
}

#[test]
fn test_generic_provider_is_instantiated() {
    let session = session_needing(
        catalog().provide(
            ScopeRef::Global,
            CallableDescriptor::function("app.emptyList", generic("app.List", vec![named("app.emptyList.T")]))
                .type_parameters(["app.emptyList.T"]),
        ),
        generic("app.List", vec![named("app.Foo")]),
    );

    let result = resolve_entry(&session);
    let candidate = chosen(&session, &result);
    assert_eq!(candidate.id.fq_name(), "app.emptyList");
    assert_eq!(candidate.provided_type.render(), "app.List<app.Foo>");
    assert!(!candidate.is_generic());
    assert_eq!(result.graph().unwrap().nodes()[0].ty.render(), "app.List<app.Foo>");
}

#[test]
fn test_non_generic_beats_generic_at_same_depth() {
    let session = session_needing(
        catalog()
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.emptyList", generic("app.List", vec![named("app.emptyList.T")]))
                    .type_parameters(["app.emptyList.T"]),
            )
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.fooList", generic("app.List", vec![named("app.Foo")])),
            ),
        generic("app.List", vec![named("app.Foo")]),
    );

    let result = resolve_entry(&session);
    assert_eq!(chosen(&session, &result).id.fq_name(), "app.fooList");
}

#[test]
fn test_nearer_generic_beats_outer_concrete() {
    let session = session_needing(
        catalog()
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.fooList", generic("app.List", vec![named("app.Foo")])),
            )
            .provide(
                ScopeRef::File("main.kt".into()),
                CallableDescriptor::function("app.emptyList", generic("app.List", vec![named("app.emptyList.T")]))
                    .type_parameters(["app.emptyList.T"]),
            ),
        generic("app.List", vec![named("app.Foo")]),
    );

    let main = entry(&session);
    let result = Resolver::new(session.clone())
        .resolve_call_site(&ferrous_inject::CallSite::new("main.kt"), &main)
        .unwrap();
    assert_eq!(chosen(&session, &result).id.fq_name(), "app.emptyList");
}

#[test]
fn test_generic_dependencies_follow_the_binding() {
    let session = session_needing(
        catalog()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.foo", named("app.Foo")))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.box", generic("app.Box", vec![named("app.box.T")]))
                    .type_parameters(["app.box.T"])
                    .needs("value", named("app.box.T")),
            ),
        generic("app.Box", vec![named("app.Foo")]),
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    let box_node = graph.nodes().iter().find(|n| n.ty.render() == "app.Box<app.Foo>").unwrap();
    let value = graph.node(box_node.children()[0]).unwrap();
    assert_eq!(value.candidate().unwrap().id.fq_name(), "app.foo");
}

#[test]
fn test_unbound_type_parameter_in_dependency() {
    let session = session_needing(
        catalog().provide(
            ScopeRef::Global,
            CallableDescriptor::function("app.widget", named("app.Widget"))
                .type_parameters(["app.widget.T"])
                .needs("value", named("app.widget.T")),
        ),
        named("app.Widget"),
    );

    match resolve_entry(&session).failure() {
        Some(ResolutionFailure::DeclarationError { declaration, kind, .. }) => {
            assert_eq!(*kind, DeclarationErrorKind::UnsubstitutedTypeParameter);
            assert_eq!(declaration.as_ref().unwrap().fq_name(), "app.widget");
        }
        other => panic!("expected a declaration error, got {:?}", other),
    }
}

#[test]
fn test_bounded_type_parameter_rejects_non_conforming_request() {
    let session = session_needing(
        catalog()
            .class("app.Dog", &["app.Animal"])
            .class("app.Rock", &[])
            .bounded_parameter("app.kennel.T", vec![named("app.Animal")])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.kennel", generic("app.Box", vec![named("app.kennel.T")]))
                    .type_parameters(["app.kennel.T"]),
            ),
        generic("app.Box", vec![named("app.Rock")]),
    );
    assert!(matches!(resolve_entry(&session).failure(), Some(ResolutionFailure::Unresolved { .. })));

    let session = session_needing(
        catalog()
            .class("app.Dog", &["app.Animal"])
            .bounded_parameter("app.kennel.T", vec![named("app.Animal")])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.kennel", generic("app.Box", vec![named("app.kennel.T")]))
                    .type_parameters(["app.kennel.T"]),
            ),
        generic("app.Box", vec![named("app.Dog")]),
    );
    assert_eq!(chosen(&session, &resolve_entry(&session)).id.fq_name(), "app.kennel");
}

#[test]
fn test_variance_of_requested_argument() {
    let builder = || {
        catalog()
            .class("app.Dog", &["app.Animal"])
            .classifier(ferrous_inject::ClassifierDescriptor::interface("app.Source").type_parameters(["app.Source.T"]))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.dogs", generic("app.Source", vec![named("app.Dog")])),
            )
    };

    let covariant = session_needing(
        builder(),
        generic("app.Source", vec![named("app.Animal").variance(Variance::Out)]),
    );
    let candidate = chosen(&covariant, &resolve_entry(&covariant));
    assert_eq!(candidate.id.fq_name(), "app.dogs");

    let invariant = session_needing(builder(), generic("app.Source", vec![named("app.Animal")]));
    assert!(matches!(resolve_entry(&invariant).failure(), Some(ResolutionFailure::Unresolved { .. })));
}

#[test]
fn test_qualifiers_must_match() {
    let builder = || {
        catalog()
            .tag("app.Prod")
            .provide(ScopeRef::Global, CallableDescriptor::function("app.testDb", named("app.Db")))
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.prodDb", named("app.Db").qualified("app.Prod")),
            )
    };

    let plain = session_needing(builder(), named("app.Db"));
    assert_eq!(chosen(&plain, &resolve_entry(&plain)).id.fq_name(), "app.testDb");

    let tagged = session_needing(builder(), named("app.Db").qualified("app.Prod"));
    assert_eq!(chosen(&tagged, &resolve_entry(&tagged)).id.fq_name(), "app.prodDb");
}

#[test]
fn test_spread_provider_instantiated_per_matching_type() {
    let session = session_needing(
        catalog()
            .class("app.Http", &["app.Service"])
            .provide(ScopeRef::Global, CallableDescriptor::class("app.Http"))
            .spread_parameter("app.wrap.T", vec![named("app.Service")])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.wrap", generic("app.Box", vec![named("app.wrap.T")]))
                    .type_parameters(["app.wrap.T"])
                    .needs("inner", named("app.wrap.T")),
            ),
        generic("app.Box", vec![named("app.Http")]),
    );

    let result = resolve_entry(&session);
    let candidate = chosen(&session, &result);
    assert_eq!(candidate.id.fq_name(), "app.wrap");
    assert_eq!(candidate.provided_type.render(), "app.Box<app.Http>");

    let graph = result.graph().unwrap();
    let inner = graph.nodes().iter().find(|n| n.ty.render() == "app.Http").unwrap();
    assert_eq!(inner.candidate().unwrap().id.fq_name(), "app.Http");
}

#[test]
fn test_unbounded_spread_hits_the_limit() {
    let session = session_needing(
        catalog()
            .provide(ScopeRef::Global, CallableDescriptor::function("app.foo", named("app.Foo")))
            .spread_parameter("app.wrap.T", vec![])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.wrap", generic("app.Box", vec![named("app.wrap.T")]))
                    .type_parameters(["app.wrap.T"])
                    .needs("inner", named("app.wrap.T")),
            ),
        named("app.Foo"),
    );

    let config = EngineConfig {
        max_spread_instantiations: 8,
        ..EngineConfig::default()
    };
    match resolve_with(&session, config).failure() {
        Some(ResolutionFailure::DeclarationError { kind, .. }) => {
            assert_eq!(*kind, DeclarationErrorKind::ExpansionLimitExceeded);
        }
        other => panic!("expected the spread limit, got {:?}", other),
    }
}

#[test]
fn test_star_projection_accepts_any_argument() {
    let session = session_needing(
        catalog().provide(
            ScopeRef::Global,
            CallableDescriptor::function("app.fooList", generic("app.List", vec![named("app.Foo")])),
        ),
        generic("app.List", vec![TypeDescriptor::star()]),
    );
    assert_eq!(chosen(&session, &resolve_entry(&session)).id.fq_name(), "app.fooList");
}
