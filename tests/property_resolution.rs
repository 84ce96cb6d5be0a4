/// Property-based tests for resolution
///
/// These tests verify that graph shape, determinism, and ambiguity follow
/// the same rules regardless of the declarations involved.

use ferrous_inject::{
    resolve, substitution_map, AnalysisSession, CallableDescriptor, ClassifierRef, InMemoryCatalog,
    ResolutionFailure, ResolutionScope, ScopeRef, TypeDescriptor, TypeRef,
};
use proptest::prelude::*;
use proptest::sample::Index;
use std::sync::Arc;

fn type_name(i: usize) -> String {
    format!("app.T{}", i)
}

/// Class `Ti` needs a subset of `T0..Ti`; the entry needs the last one
fn layered_session(dependencies: &[Vec<Index>]) -> Arc<AnalysisSession> {
    let mut builder = InMemoryCatalog::builder();
    for (i, picks) in dependencies.iter().enumerate() {
        let mut class = CallableDescriptor::class(type_name(i));
        if i > 0 {
            for (k, pick) in picks.iter().enumerate() {
                class = class.needs(format!("d{}", k), TypeDescriptor::named(type_name(pick.index(i))));
            }
        }
        builder = builder.provide(ScopeRef::Global, class);
    }
    let last = dependencies.len() - 1;
    builder = builder.provide(
        ScopeRef::Package("entry".into()),
        CallableDescriptor::function("app.main", TypeDescriptor::named("app.Unit"))
            .needs("root", TypeDescriptor::named(type_name(last))),
    );
    AnalysisSession::from_catalog(builder.build())
}

fn nested(classifier: &ClassifierRef, inner: TypeRef, depth: usize) -> TypeRef {
    (0..depth).fold(inner, |ty, _| TypeRef::with_arguments(classifier, vec![ty]))
}

// Property: acyclic declarations always resolve, each type once, dependencies first
proptest! {
    #[test]
    fn acyclic_graphs_resolve_in_completion_order(
        dependencies in prop::collection::vec(prop::collection::vec(any::<Index>(), 0..3), 1..12)
    ) {
        let session = layered_session(&dependencies);
        let main = session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone();
        let scope = ResolutionScope::global(&session).unwrap();

        let result = resolve(&main.requests(), &scope, &main).unwrap();
        let graph = result.graph().unwrap();

        let mut seen = std::collections::HashSet::new();
        for node in graph.nodes() {
            prop_assert!(seen.insert(node.ty.render()), "{} resolved twice", node.ty);
            for child in node.children() {
                prop_assert!(child < node.id);
            }
        }
        prop_assert_eq!(graph.post_order().len(), graph.len());
    }
}

// Property: resolving twice gives the same graph
proptest! {
    #[test]
    fn resolution_is_deterministic(
        dependencies in prop::collection::vec(prop::collection::vec(any::<Index>(), 0..3), 1..10)
    ) {
        let session = layered_session(&dependencies);
        let main = session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone();
        let scope = ResolutionScope::global(&session).unwrap();

        let first = resolve(&main.requests(), &scope, &main).unwrap();
        let second = resolve(&main.requests(), &scope, &main).unwrap();
        prop_assert_eq!(first, second);
    }
}

// Property: equally near providers are ambiguous, and every one of them is reported
proptest! {
    #[test]
    fn ties_report_every_candidate(count in 1usize..6) {
        let mut builder = InMemoryCatalog::builder();
        for i in 0..count {
            builder = builder.provide(
                ScopeRef::Global,
                CallableDescriptor::function(format!("app.db{}", i), TypeDescriptor::named("app.Db")),
            );
        }
        let session = AnalysisSession::from_catalog(
            builder
                .provide(
                    ScopeRef::Package("entry".into()),
                    CallableDescriptor::function("app.main", TypeDescriptor::named("app.Unit"))
                        .needs("db", TypeDescriptor::named("app.Db")),
                )
                .build(),
        );
        let main = session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone();
        let scope = ResolutionScope::global(&session).unwrap();

        let result = resolve(&main.requests(), &scope, &main).unwrap();
        if count == 1 {
            prop_assert!(result.is_success());
        } else {
            match result.failure() {
                Some(ResolutionFailure::CandidateAmbiguity { candidates, .. }) => {
                    prop_assert_eq!(candidates.len(), count);
                    let mut sorted = candidates.clone();
                    sorted.sort();
                    prop_assert_eq!(&sorted, candidates);
                }
                other => prop_assert!(false, "expected ambiguity, got {:?}", other),
            }
        }
    }
}

// Property: applying an inferred substitution is idempotent
proptest! {
    #[test]
    fn substitution_is_idempotent(depth in 0usize..6, nullable in any::<bool>()) {
        let element = ClassifierRef::type_parameter("app.Box.E");
        let boxed = ClassifierRef::builder("app.Box").type_parameters(vec![element]).build();
        let parameter = ClassifierRef::type_parameter("app.make.T");
        let foo = TypeRef::of(&ClassifierRef::class("app.Foo")).with_nullability(nullable);

        let parameterized = nested(&boxed, TypeRef::of(&parameter), depth);
        let concrete = nested(&boxed, foo, depth);
        let map = substitution_map(&concrete, &parameterized);

        let once = parameterized.substitute(&map);
        prop_assert_eq!(&once, &concrete);
        prop_assert_eq!(once.substitute(&map), once.clone());
    }
}
