/// Unit tests for InjectError and the failure values resolution returns

use ferrous_inject::{
    AnalysisSession, CallableDescriptor, CallableId, ClassifierDescriptor, ClassifierRef, CycleLink,
    DeclarationErrorKind, EngineConfig, InMemoryCatalog, InjectError, InjectableRequest, ResolutionFailure,
    ResolutionScope, ScopeRef, SourcePosition, TypeDescriptor, TypeRef,
};
use std::error::Error;

fn id(name: &str) -> CallableId {
    CallableId::new(name, SourcePosition::new("app.kt", 1, 1))
}

fn request(ty: &str) -> InjectableRequest {
    InjectableRequest::new(TypeRef::of(&ClassifierRef::class(ty)), id("app.main"), 0, "value")
}

#[test]
fn test_error_display_unknown_classifier() {
    let error = InjectError::UnknownClassifier("app.Missing".to_string());
    assert_eq!(error.to_string(), "Unknown classifier: app.Missing");
    assert!(error.source().is_none());
}

#[test]
fn test_error_display_argument_count() {
    let error = InjectError::ArgumentCountMismatch {
        classifier: "app.Box".to_string(),
        expected: 1,
        found: 2,
    };
    assert_eq!(error.to_string(), "Argument count mismatch for app.Box: expected 1, found 2");
}

#[test]
fn test_error_display_remaining_variants() {
    let cases = vec![
        (
            InjectError::UnknownTypeParameter {
                callable: "app.make".to_string(),
                name: "app.Foo".to_string(),
            },
            "Unknown type parameter app.Foo declared by app.make",
        ),
        (
            InjectError::CyclicAlias(vec!["A".to_string(), "B".to_string(), "A".to_string()]),
            "Cyclic type alias: A -> B -> A",
        ),
        (
            InjectError::CorruptSubstitution("bad".to_string()),
            "Corrupt substitution: bad",
        ),
        (
            InjectError::InvalidConfig {
                key: "max_depth".to_string(),
                message: "must be greater than zero".to_string(),
            },
            "Invalid configuration for max_depth: must be greater than zero",
        ),
        (InjectError::Export("closed".to_string()), "Graph export failed: closed"),
    ];
    for (error, expected) in cases {
        assert_eq!(error.to_string(), expected);
    }
}

#[test]
fn test_error_is_std_error() {
    let error: Box<dyn Error + Send + Sync> = Box::new(InjectError::UnknownClassifier("x".to_string()));
    assert_eq!(error.to_string(), "Unknown classifier: x");
}

#[test]
fn test_session_reports_catalog_errors() {
    let session = AnalysisSession::from_catalog(
        InMemoryCatalog::builder()
            .classifier(ClassifierDescriptor::class("app.Box").type_parameters(["app.Box.E"]))
            .class("app.Foo", &[])
            .build(),
    );

    assert_eq!(
        session.classifier("app.Nope").unwrap_err(),
        InjectError::UnknownClassifier("app.Nope".to_string())
    );
    let err = session
        .type_ref(&TypeDescriptor::with_arguments(
            "app.Box",
            vec![TypeDescriptor::named("app.Foo"), TypeDescriptor::named("app.Foo")],
        ))
        .unwrap_err();
    assert!(matches!(err, InjectError::ArgumentCountMismatch { expected: 1, found: 2, .. }));
}

#[test]
fn test_type_parameter_must_be_a_type_parameter() {
    let session = AnalysisSession::from_catalog(
        InMemoryCatalog::builder()
            .class("app.Foo", &[])
            .provide(
                ScopeRef::Global,
                CallableDescriptor::function("app.make", TypeDescriptor::named("app.Widget")).type_parameters(["app.Foo"]),
            )
            .build(),
    );

    match ResolutionScope::global(&session) {
        Err(InjectError::UnknownTypeParameter { callable, name }) => {
            assert_eq!(callable, "app.make");
            assert_eq!(name, "app.Foo");
        }
        other => panic!("expected an unknown type parameter, got {:?}", other.map(|s| s.depth())),
    }
}

#[test]
fn test_invalid_config() {
    let config = EngineConfig {
        max_visited_types: 0,
        ..EngineConfig::default()
    };
    assert_eq!(
        config.validate().unwrap_err(),
        InjectError::InvalidConfig {
            key: "max_visited_types".to_string(),
            message: "must be greater than zero".to_string(),
        }
    );
    assert!(EngineConfig::default().validate().is_ok());
}

#[test]
fn test_failure_display() {
    let unresolved = ResolutionFailure::Unresolved {
        request: request("app.Db"),
        chain: vec![request("app.Db")],
    };
    assert_eq!(unresolved.to_string(), "No injectable found for app.Db");
    assert_eq!(unresolved.kind_name(), "unresolved");

    let ambiguous = ResolutionFailure::CandidateAmbiguity {
        request: request("app.Db"),
        candidates: vec![id("app.primary"), id("app.replica")],
        chain: vec![request("app.Db")],
    };
    assert_eq!(ambiguous.to_string(), "Ambiguous injectables for app.Db: app.primary, app.replica");

    let circular = ResolutionFailure::CircularDependency {
        request: request("app.A"),
        cycle: vec![CycleLink {
            ty: TypeRef::of(&ClassifierRef::class("app.A")),
            candidate: id("app.A"),
        }],
        chain: vec![request("app.A")],
    };
    assert_eq!(circular.to_string(), "Circular dependency: app.A -> app.A");

    let declaration = ResolutionFailure::DeclarationError {
        declaration: None,
        kind: DeclarationErrorKind::ExpansionLimitExceeded,
        chain: Vec::new(),
    };
    assert_eq!(declaration.to_string(), "Invalid declaration: expansion limit exceeded");
    assert!(declaration.request().is_none());
}
