//! Resolution scope chains.
//!
//! A [`ResolutionScope`] is one link of the visibility chain a call site
//! sees: block, enclosing declarations, file with its imports, and finally
//! the global injectables. Links are immutable and shared; building a chain
//! for a call site only allocates the links themselves since injectables are
//! cached by the session.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::callable::{Callable, CandidateKind, DeclarationKind};
use crate::catalog::ScopeRef;
use crate::error::InjectResult;
use crate::key::{CallableId, ScopeId, SourcePosition};
use crate::session::AnalysisSession;
use crate::types::{ClassifierRef, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKind {
    Global,
    File,
    Class,
    /// Companion or static members of a class
    Companion,
    Function,
    Block,
    /// Parameters of a function-type provider
    Provider,
}

struct ScopeInner {
    id: ScopeId,
    name: String,
    kind: ScopeKind,
    depth: usize,
    parent: Option<ResolutionScope>,
    session: Arc<AnalysisSession>,
    injectables: Vec<Arc<Callable>>,
    owner_type: Option<TypeRef>,
    type_parameters: Vec<ClassifierRef>,
}

/// One link of a scope chain.
///
/// Children see their parents' candidates, never the other way round.
/// `depth` grows by one per link, so a larger depth means nearer to the
/// call site.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{AnalysisSession, InMemoryCatalog, ResolutionScope, ScopeKind};
///
/// let session = AnalysisSession::from_catalog(InMemoryCatalog::builder().build());
/// let global = ResolutionScope::global(&session).unwrap();
/// let block = global.child(ScopeKind::Block, "main").build();
///
/// assert_eq!(block.depth(), 1);
/// assert_eq!(block.chain().count(), 2);
/// assert_eq!(block.parent().unwrap().kind(), ScopeKind::Global);
/// ```
#[derive(Clone)]
pub struct ResolutionScope(Arc<ScopeInner>);

impl ResolutionScope {
    /// Root link holding the catalog-wide injectables
    pub fn global(session: &Arc<AnalysisSession>) -> InjectResult<Self> {
        let injectables = session.injectables(&ScopeRef::Global)?.to_vec();
        Ok(Self(Arc::new(ScopeInner {
            id: session.next_scope_id(),
            name: "global".to_string(),
            kind: ScopeKind::Global,
            depth: 0,
            parent: None,
            session: session.clone(),
            injectables,
            owner_type: None,
            type_parameters: Vec::new(),
        })))
    }

    pub fn child(&self, kind: ScopeKind, name: impl Into<String>) -> ChildScopeBuilder<'_> {
        ChildScopeBuilder {
            parent: self,
            kind,
            name: name.into(),
            injectables: Vec::new(),
            owner_type: None,
            type_parameters: Vec::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> ScopeKind {
        self.0.kind
    }

    pub fn depth(&self) -> usize {
        self.0.depth
    }

    pub fn parent(&self) -> Option<&ResolutionScope> {
        self.0.parent.as_ref()
    }

    pub fn session(&self) -> &Arc<AnalysisSession> {
        &self.0.session
    }

    /// Injectables declared directly in this link
    pub fn injectables(&self) -> &[Arc<Callable>] {
        &self.0.injectables
    }

    /// Type whose members this link holds, used for target-scope checks
    pub fn owner_type(&self) -> Option<&TypeRef> {
        self.0.owner_type.as_ref()
    }

    pub fn type_parameters(&self) -> &[ClassifierRef] {
        &self.0.type_parameters
    }

    /// This link followed by its ancestors, nearest first
    pub fn chain(&self) -> impl Iterator<Item = &ResolutionScope> {
        std::iter::successors(Some(self), |scope| scope.parent())
    }

    /// Whether some link of the chain is owned by a type assignable to `target`
    pub fn has_owner_matching(&self, target: &TypeRef) -> bool {
        self.chain()
            .filter_map(|scope| scope.owner_type())
            .any(|owner| owner.is_assignable_to(target))
    }
}

impl fmt::Debug for ResolutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionScope")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("depth", &self.0.depth)
            .field("injectables", &self.0.injectables.len())
            .finish()
    }
}

/// Builder returned by [`ResolutionScope::child`].
pub struct ChildScopeBuilder<'a> {
    parent: &'a ResolutionScope,
    kind: ScopeKind,
    name: String,
    injectables: Vec<Arc<Callable>>,
    owner_type: Option<TypeRef>,
    type_parameters: Vec<ClassifierRef>,
}

impl<'a> ChildScopeBuilder<'a> {
    pub fn injectables(mut self, injectables: Vec<Arc<Callable>>) -> Self {
        self.injectables.extend(injectables);
        self
    }

    pub fn injectable(mut self, callable: Callable) -> Self {
        self.injectables.push(Arc::new(callable));
        self
    }

    pub fn owner(mut self, owner: TypeRef) -> Self {
        self.owner_type = Some(owner);
        self
    }

    pub fn type_parameters(mut self, parameters: Vec<ClassifierRef>) -> Self {
        self.type_parameters = parameters;
        self
    }

    pub fn build(self) -> ResolutionScope {
        let session = self.parent.session().clone();
        ResolutionScope(Arc::new(ScopeInner {
            id: session.next_scope_id(),
            name: self.name,
            kind: self.kind,
            depth: self.parent.depth() + 1,
            parent: Some(self.parent.clone()),
            session,
            injectables: self.injectables,
            owner_type: self.owner_type,
            type_parameters: self.type_parameters,
        }))
    }
}

/// A declaration enclosing a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnclosingDeclaration {
    Class {
        fq_name: String,
        companion: Option<String>,
    },
    Function {
        id: CallableId,
        type_parameters: Vec<String>,
    },
    Property {
        id: CallableId,
    },
}

impl EnclosingDeclaration {
    pub fn class(fq_name: impl Into<String>) -> Self {
        EnclosingDeclaration::Class {
            fq_name: fq_name.into(),
            companion: None,
        }
    }

    pub fn class_with_companion(fq_name: impl Into<String>, companion: impl Into<String>) -> Self {
        EnclosingDeclaration::Class {
            fq_name: fq_name.into(),
            companion: Some(companion.into()),
        }
    }

    pub fn function(id: CallableId) -> Self {
        EnclosingDeclaration::Function {
            id,
            type_parameters: Vec::new(),
        }
    }
}

/// Lexical context of a call site, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallSite {
    pub file: String,
    /// `pkg.*` imports a package; a module classifier imports its bundle;
    /// any other classifier imports its members
    pub imports: Vec<String>,
    pub enclosing: Vec<EnclosingDeclaration>,
    /// Host block ids, outermost first
    pub blocks: Vec<String>,
    pub position: Option<SourcePosition>,
}

impl CallSite {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn import(mut self, name: impl Into<String>) -> Self {
        self.imports.push(name.into());
        self
    }

    pub fn inside(mut self, declaration: EnclosingDeclaration) -> Self {
        self.enclosing.push(declaration);
        self
    }

    pub fn block(mut self, id: impl Into<String>) -> Self {
        self.blocks.push(id.into());
        self
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }
}

/// Builds scope chains for call sites.
///
/// ```rust
/// use ferrous_inject::{
///     AnalysisSession, CallSite, CallableDescriptor, InMemoryCatalog, ScopeChainBuilder,
///     ScopeKind, ScopeRef, TypeDescriptor,
/// };
///
/// let catalog = InMemoryCatalog::builder()
///     .provide(ScopeRef::Global, CallableDescriptor::function("app.foo", TypeDescriptor::named("app.Service")))
///     .build();
/// let session = AnalysisSession::from_catalog(catalog);
///
/// let scope = ScopeChainBuilder::new(session)
///     .build(&CallSite::new("main.kt").block("main#0"))
///     .unwrap();
/// let kinds: Vec<_> = scope.chain().map(|s| s.kind()).collect();
/// assert_eq!(kinds, vec![ScopeKind::Block, ScopeKind::File, ScopeKind::Global]);
/// ```
pub struct ScopeChainBuilder {
    session: Arc<AnalysisSession>,
}

impl ScopeChainBuilder {
    pub fn new(session: Arc<AnalysisSession>) -> Self {
        Self { session }
    }

    pub fn build(&self, site: &CallSite) -> InjectResult<ResolutionScope> {
        let global = ResolutionScope::global(&self.session)?;
        let mut scope = self.file_link(&global, site)?;

        for declaration in &site.enclosing {
            scope = self.declaration_links(&scope, declaration)?;
        }
        for block in &site.blocks {
            let injectables = self.session.injectables(&ScopeRef::Block(block.clone()))?;
            scope = scope
                .child(ScopeKind::Block, format!("block {}", block))
                .injectables(injectables.to_vec())
                .build();
        }
        debug!(file = %site.file, depth = scope.depth(), "built scope chain");
        Ok(scope)
    }

    fn file_link(&self, global: &ResolutionScope, site: &CallSite) -> InjectResult<ResolutionScope> {
        let mut injectables = self.session.injectables(&ScopeRef::File(site.file.clone()))?.to_vec();

        for import in &site.imports {
            if let Some(package) = import.strip_suffix(".*") {
                injectables.extend(self.session.injectables(&ScopeRef::Package(package.to_string()))?.iter().cloned());
                continue;
            }
            if self.session.catalog().lookup_classifier(import).is_none() {
                injectables.extend(self.session.injectables(&ScopeRef::Package(import.clone()))?.iter().cloned());
                continue;
            }

            let classifier = self.session.classifier(import)?;
            if !classifier.is_provider_bundle() {
                injectables.extend(self.session.injectables(&ScopeRef::Classifier(import.clone()))?.iter().cloned());
            } else if classifier.type_parameters().is_empty() {
                let bundle = Callable::new(
                    CallableId::new(import.as_str(), SourcePosition::new(site.file.as_str(), 0, 0)),
                    DeclarationKind::Class,
                    CandidateKind::ModuleBundle,
                    TypeRef::of(&classifier),
                );
                injectables.push(Arc::new(bundle));
            } else {
                warn!(import = %import, "generic bundle imports need explicit type arguments; skipped");
            }
        }

        Ok(global
            .child(ScopeKind::File, format!("file {}", site.file))
            .injectables(injectables)
            .build())
    }

    fn declaration_links(
        &self,
        parent: &ResolutionScope,
        declaration: &EnclosingDeclaration,
    ) -> InjectResult<ResolutionScope> {
        match declaration {
            EnclosingDeclaration::Class { fq_name, companion } => {
                let mut scope = parent.clone();
                if let Some(companion) = companion {
                    let injectables = self.session.injectables(&ScopeRef::Classifier(companion.clone()))?;
                    scope = scope
                        .child(ScopeKind::Companion, format!("companion {}", companion))
                        .injectables(injectables.to_vec())
                        .build();
                }
                let classifier = self.session.classifier(fq_name)?;
                let injectables = self.session.injectables(&ScopeRef::Classifier(fq_name.clone()))?;
                Ok(scope
                    .child(ScopeKind::Class, format!("class {}", fq_name))
                    .injectables(injectables.to_vec())
                    .owner(classifier.default_type())
                    .type_parameters(classifier.type_parameters().to_vec())
                    .build())
            }
            EnclosingDeclaration::Function { id, type_parameters } => {
                let parameters = type_parameters
                    .iter()
                    .map(|p| self.session.classifier(p))
                    .collect::<InjectResult<Vec<_>>>()?;
                let injectables = self.session.injectables(&ScopeRef::Declaration(id.clone()))?;
                Ok(parent
                    .child(ScopeKind::Function, format!("function {}", id))
                    .injectables(injectables.to_vec())
                    .type_parameters(parameters)
                    .build())
            }
            EnclosingDeclaration::Property { id } => {
                let injectables = self.session.injectables(&ScopeRef::Declaration(id.clone()))?;
                Ok(parent
                    .child(ScopeKind::Function, format!("property {}", id))
                    .injectables(injectables.to_vec())
                    .build())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CallableDescriptor, InMemoryCatalog, TypeDescriptor};

    fn session() -> Arc<AnalysisSession> {
        let catalog = InMemoryCatalog::builder()
            .class("app.Screen", &[])
            .provide(
                ScopeRef::Classifier("app.Screen".into()),
                CallableDescriptor::function("app.Screen.presenter", TypeDescriptor::named("app.Presenter")),
            )
            .provide(
                ScopeRef::Classifier("app.Screen.Companion".into()),
                CallableDescriptor::function("app.Screen.Companion.factory", TypeDescriptor::named("app.Factory")),
            )
            .provide(
                ScopeRef::Package("app.util".into()),
                CallableDescriptor::function("app.util.clock", TypeDescriptor::named("app.Clock")),
            )
            .build();
        AnalysisSession::from_catalog(catalog)
    }

    #[test]
    fn class_links_follow_their_companion() {
        let site = CallSite::new("screen.kt")
            .inside(EnclosingDeclaration::class_with_companion("app.Screen", "app.Screen.Companion"));
        let scope = ScopeChainBuilder::new(session()).build(&site).unwrap();

        let kinds: Vec<_> = scope.chain().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![ScopeKind::Class, ScopeKind::Companion, ScopeKind::File, ScopeKind::Global]
        );
        assert_eq!(scope.owner_type().unwrap().render(), "app.Screen");
        assert_eq!(scope.injectables().len(), 1);
    }

    #[test]
    fn package_imports_add_declarations_to_the_file_link() {
        let site = CallSite::new("main.kt").import("app.util.*");
        let scope = ScopeChainBuilder::new(session()).build(&site).unwrap();
        assert_eq!(scope.kind(), ScopeKind::File);
        assert_eq!(scope.injectables()[0].id.fq_name(), "app.util.clock");
    }

    #[test]
    fn scope_ids_are_unique() {
        let session = session();
        let global = ResolutionScope::global(&session).unwrap();
        let a = global.child(ScopeKind::Block, "a").build();
        let b = global.child(ScopeKind::Block, "b").build();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.depth(), b.depth());
    }
}
