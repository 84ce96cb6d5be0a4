use ferrous_inject::{
    resolve, AnalysisSession, AnnotationTag, Callable, CallableDescriptor, CandidateKind, ClassifierDescriptor,
    DeclarationId, InMemoryCatalog, InMemoryCatalogBuilder, ResolutionResult, ResolutionScope, ScopeRef,
    TypeDescriptor,
};
use std::sync::Arc;

fn named(name: &str) -> TypeDescriptor {
    TypeDescriptor::named(name)
}

fn with_entry(builder: InMemoryCatalogBuilder, needs: &[(&str, TypeDescriptor)]) -> Arc<AnalysisSession> {
    let main = needs.iter().fold(
        CallableDescriptor::function("app.main", named("app.Unit")),
        |main, (name, ty)| main.needs(*name, ty.clone()),
    );
    AnalysisSession::from_catalog(builder.provide(ScopeRef::Package("entry".into()), main).build())
}

fn entry(session: &Arc<AnalysisSession>) -> Arc<Callable> {
    session.injectables(&ScopeRef::Package("entry".into())).unwrap()[0].clone()
}

fn resolve_entry(session: &Arc<AnalysisSession>) -> ResolutionResult {
    let main = entry(session);
    let scope = ResolutionScope::global(session).unwrap();
    resolve(&main.requests(), &scope, &main).unwrap()
}

fn chosen_names(session: &Arc<AnalysisSession>, result: &ResolutionResult) -> Vec<String> {
    let graph = result
        .graph()
        .unwrap_or_else(|| panic!("resolution failed: {:?}", result.failure()));
    entry(session)
        .requests()
        .iter()
        .map(|r| graph.chosen_for(r).unwrap().id.fq_name().to_string())
        .collect()
}

#[test]
fn test_bundle_members_with_dependencies() {
    let session = with_entry(
        InMemoryCatalog::builder().bundle(
            ScopeRef::Global,
            "app.DataBundle",
            vec![
                CallableDescriptor::function("app.DataBundle.database", named("app.Database")),
                CallableDescriptor::function("app.DataBundle.repo", named("app.Repo")).needs("db", named("app.Database")),
            ],
        ),
        &[("repo", named("app.Repo"))],
    );

    let result = resolve_entry(&session);
    assert_eq!(chosen_names(&session, &result), vec!["app.DataBundle.repo"]);

    let graph = result.graph().unwrap();
    let repo = graph.nodes().iter().find(|n| n.ty.render() == "app.Repo").unwrap();
    let candidate = repo.candidate().unwrap();
    assert_eq!(candidate.contributed_by.as_ref().unwrap().render(), "app.DataBundle");
}

#[test]
fn test_nested_bundles() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .bundle(
                ScopeRef::Global,
                "app.AppBundle",
                vec![CallableDescriptor::function("app.AppBundle.config", named("app.Config"))],
            )
            .bundle(
                ScopeRef::Classifier("app.AppBundle".into()),
                "app.AppBundle.Network",
                vec![CallableDescriptor::function("app.AppBundle.Network.http", named("app.Http"))],
            ),
        &[("config", named("app.Config")), ("http", named("app.Http"))],
    );

    let result = resolve_entry(&session);
    assert_eq!(
        chosen_names(&session, &result),
        vec!["app.AppBundle.config", "app.AppBundle.Network.http"]
    );
}

#[test]
fn test_cyclic_bundle_inclusion_terminates() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .bundle(
                ScopeRef::Global,
                "app.Left",
                vec![CallableDescriptor::function("app.Left.left", named("app.LeftService"))],
            )
            .bundle(
                ScopeRef::Classifier("app.Left".into()),
                "app.Right",
                vec![CallableDescriptor::function("app.Right.right", named("app.RightService"))],
            )
            // Right includes Left again
            .declare(
                ScopeRef::Classifier("app.Right".into()),
                CallableDescriptor::class("app.Left"),
                &[AnnotationTag::Module],
            ),
        &[("left", named("app.LeftService")), ("right", named("app.RightService"))],
    );

    let result = resolve_entry(&session);
    assert_eq!(chosen_names(&session, &result), vec!["app.Left.left", "app.Right.right"]);
}

#[test]
fn test_bundle_answers_requests_for_itself() {
    let session = with_entry(
        InMemoryCatalog::builder().bundle(
            ScopeRef::Global,
            "app.Settings",
            vec![CallableDescriptor::property("app.Settings.locale", named("app.Locale"))],
        ),
        &[("settings", named("app.Settings"))],
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap();
    let node = &graph.nodes()[0];
    assert_eq!(node.candidate().unwrap().candidate_kind, CandidateKind::ModuleBundle);
    assert_eq!(chosen_names(&session, &result), vec!["app.Settings"]);
}

#[test]
fn test_generic_bundle_members_are_substituted() {
    let session = with_entry(
        InMemoryCatalog::builder()
            .classifier(ClassifierDescriptor::object("app.Repos").type_parameters(["app.Repos.T"]))
            .annotate(DeclarationId::Classifier("app.Repos".into()), AnnotationTag::Module)
            .classifier(ClassifierDescriptor::class("app.Repo").type_parameters(["app.Repo.E"]))
            .provide(
                ScopeRef::Classifier("app.Repos".into()),
                CallableDescriptor::function(
                    "app.Repos.repo",
                    TypeDescriptor::with_arguments("app.Repo", vec![named("app.Repos.T")]),
                ),
            )
            .declare(
                ScopeRef::Global,
                CallableDescriptor::function(
                    "app.userRepos",
                    TypeDescriptor::with_arguments("app.Repos", vec![named("app.User")]),
                ),
                &[AnnotationTag::Module],
            ),
        &[("users", TypeDescriptor::with_arguments("app.Repo", vec![named("app.User")]))],
    );

    let result = resolve_entry(&session);
    let graph = result.graph().unwrap_or_else(|| panic!("{:?}", result.failure()));
    let repo = graph.nodes().iter().find(|n| n.ty.render() == "app.Repo<app.User>").unwrap();
    let candidate = repo.candidate().unwrap();
    assert_eq!(candidate.id.fq_name(), "app.Repos.repo");
    assert_eq!(candidate.provided_type.render(), "app.Repo<app.User>");
    assert_eq!(candidate.contributed_by.as_ref().unwrap().render(), "app.Repos<app.User>");
}

#[test]
fn test_bundle_expansion_is_cached_per_session() {
    let session = with_entry(
        InMemoryCatalog::builder().bundle(
            ScopeRef::Global,
            "app.CacheBundle",
            vec![CallableDescriptor::function("app.CacheBundle.cache", named("app.Cache"))],
        ),
        &[("cache", named("app.Cache"))],
    );

    assert!(resolve_entry(&session).is_success());
    let after_first = session.stats();
    assert!(resolve_entry(&session).is_success());
    let after_second = session.stats();
    assert_eq!(after_first.bundle_expansions, after_second.bundle_expansions);
    assert_eq!(after_first.bundle_instantiations, after_second.bundle_instantiations);
}
