#![no_main]

use ferrous_inject::{
    render_failure, validate_scope, AnalysisSession, CallableDescriptor, CallSite, EngineConfig, InMemoryCatalog,
    Resolver, ScopeRef, TypeDescriptor,
};
use libfuzzer_sys::fuzz_target;

const TYPES: usize = 8;

fn type_name(byte: u8) -> String {
    format!("app.T{}", byte as usize % TYPES)
}

fn scope_for(byte: u8) -> ScopeRef {
    match byte % 4 {
        0 => ScopeRef::Global,
        1 => ScopeRef::File("main.kt".into()),
        2 => ScopeRef::Block("main#0".into()),
        _ => ScopeRef::Package("hidden".into()),
    }
}

// Each 4-byte chunk declares one provider: scope, provided type, and two
// optional dependencies. Cycles, ties, and missing types are all expected.
fuzz_target!(|data: &[u8]| {
    if data.len() < 5 {
        return;
    }

    let mut builder = InMemoryCatalog::builder().collections("Set", "Map");
    for i in 0..TYPES {
        builder = builder.class(&format!("app.T{}", i), &[]);
    }
    for (i, chunk) in data[1..].chunks_exact(4).take(32).enumerate() {
        let mut descriptor = CallableDescriptor::function(format!("app.p{}", i), TypeDescriptor::named(type_name(chunk[1])));
        if chunk[2] & 0x80 != 0 {
            descriptor = descriptor.needs("a", TypeDescriptor::named(type_name(chunk[2])));
        }
        if chunk[3] & 0x80 != 0 {
            descriptor = descriptor.needs("b", TypeDescriptor::named(type_name(chunk[3])));
        }
        builder = if chunk[0] & 0x40 != 0 {
            builder.contribute_to_set(scope_for(chunk[0]), descriptor)
        } else {
            builder.provide(scope_for(chunk[0]), descriptor)
        };
    }

    let requested = if data[0] & 0x80 != 0 {
        TypeDescriptor::with_arguments("Set", vec![TypeDescriptor::named(type_name(data[0]))])
    } else {
        TypeDescriptor::named(type_name(data[0]))
    };
    let session = AnalysisSession::from_catalog(
        builder
            .provide(
                ScopeRef::Package("entry".into()),
                CallableDescriptor::function("app.main", TypeDescriptor::named("app.Unit")).needs("root", requested),
            )
            .build(),
    );

    let Ok(entries) = session.injectables(&ScopeRef::Package("entry".into())) else {
        return;
    };
    let main = entries[0].clone();
    let config = EngineConfig {
        max_depth: 64,
        ..EngineConfig::default()
    };
    let resolver = Resolver::with_config(session.clone(), config.clone());
    let site = CallSite::new("main.kt").block("main#0");

    let Ok(first) = resolver.resolve_call_site(&site, &main) else {
        return;
    };
    let second = resolver.resolve_call_site(&site, &main).expect("second resolution failed");
    assert_eq!(first.is_success(), second.is_success());

    match first.graph() {
        Some(graph) => {
            for node in graph.nodes() {
                for child in node.children() {
                    assert!(child < node.id);
                }
            }
        }
        None => {
            let failure = first.failure().expect("result is neither graph nor failure");
            assert!(!render_failure(failure, session.catalog()).message.is_empty());
        }
    }

    if let Ok(scope) = ferrous_inject::ScopeChainBuilder::new(session.clone()).build(&site) {
        let _ = validate_scope(&scope, &config);
    }
});
