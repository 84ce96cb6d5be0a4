//! Shared analysis state: the catalog plus read-mostly memo tables.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::callable::{Callable, CandidateKind, ValueParameter};
use crate::catalog::{
    AnnotationTag, CallableDescriptor, ClassifierDescriptor, ClassifierKind, DeclarationCatalog,
    DeclarationId, ScopeRef, TypeDescriptor,
};
use crate::error::{InjectError, InjectResult};
use crate::key::{CallableId, InstantiationKey, ScopeId};
use crate::types::{ClassifierBuilder, ClassifierRef, QualifierTag, TypeRef};

/// Shared list of callables, cheap to clone
pub type CallableList = Arc<[Arc<Callable>]>;

/// Per-compilation context owning every cache derived from the catalog.
///
/// A session is `Send + Sync`; independent call sites may resolve against
/// it from several threads. Each cache is populated on first access and
/// only read afterwards. Classifier conversion is serialized and publishes
/// a batch of fully-linked classifiers at once, so readers never observe a
/// classifier whose super-types are still missing.
///
/// Dropping the session detaches super-type links of every classifier it
/// created. [`TypeRef`]s that outlive their session keep their structure
/// but no longer see super-types or alias expansions.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{AnalysisSession, ClassifierDescriptor, InMemoryCatalog, TypeDescriptor};
///
/// let catalog = InMemoryCatalog::builder()
///     .classifier(ClassifierDescriptor::interface("app.Service"))
///     .classifier(ClassifierDescriptor::class("app.Impl").extends(TypeDescriptor::named("app.Service")))
///     .build();
/// let session = AnalysisSession::from_catalog(catalog);
///
/// let service = session.classifier("app.Service").unwrap();
/// let impl_ = session.classifier("app.Impl").unwrap();
/// assert_eq!(impl_.super_types()[0].classifier, service);
/// assert!(session.classifier("app.Missing").is_err());
/// ```
pub struct AnalysisSession {
    catalog: Arc<dyn DeclarationCatalog>,
    classifiers: RwLock<AHashMap<Arc<str>, ClassifierRef>>,
    conversion: Mutex<()>,
    callables: RwLock<AHashMap<CallableId, Arc<Callable>>>,
    scope_injectables: RwLock<AHashMap<ScopeRef, CallableList>>,
    bundle_members: RwLock<AHashMap<InstantiationKey, CallableList>>,
    bundle_expansions: RwLock<AHashMap<InstantiationKey, CallableList>>,
    top: OnceCell<ClassifierRef>,
    next_scope: AtomicU64,
}

/// Cache sizes, mostly useful in tests and benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub classifiers: usize,
    pub callables: usize,
    pub scopes: usize,
    pub bundle_instantiations: usize,
    pub bundle_expansions: usize,
}

#[derive(Default)]
struct ConversionBatch {
    created: AHashMap<Arc<str>, ClassifierRef>,
    to_link: Vec<(ClassifierRef, ClassifierDescriptor)>,
}

impl AnalysisSession {
    pub fn new(catalog: Arc<dyn DeclarationCatalog>) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            classifiers: RwLock::new(AHashMap::new()),
            conversion: Mutex::new(()),
            callables: RwLock::new(AHashMap::new()),
            scope_injectables: RwLock::new(AHashMap::new()),
            bundle_members: RwLock::new(AHashMap::new()),
            bundle_expansions: RwLock::new(AHashMap::new()),
            top: OnceCell::new(),
            next_scope: AtomicU64::new(0),
        })
    }

    pub fn from_catalog<C: DeclarationCatalog + 'static>(catalog: C) -> Arc<Self> {
        Self::new(Arc::new(catalog))
    }

    pub fn catalog(&self) -> &dyn DeclarationCatalog {
        self.catalog.as_ref()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            classifiers: self.classifiers.read().len(),
            callables: self.callables.read().len(),
            scopes: self.scope_injectables.read().len(),
            bundle_instantiations: self.bundle_members.read().len(),
            bundle_expansions: self.bundle_expansions.read().len(),
        }
    }

    pub(crate) fn next_scope_id(&self) -> ScopeId {
        ScopeId(self.next_scope.fetch_add(1, Ordering::Relaxed))
    }

    // ===== Classifiers and types =====

    /// Classifier with the given fully-qualified name, converted on first use
    pub fn classifier(&self, fq_name: &str) -> InjectResult<ClassifierRef> {
        if let Some(found) = self.classifiers.read().get(fq_name) {
            return Ok(found.clone());
        }
        self.convert(|session, batch| session.create_unlinked(fq_name, batch))
    }

    /// The universal top type
    pub fn top_type(&self) -> InjectResult<ClassifierRef> {
        self.top
            .get_or_try_init(|| self.classifier(self.catalog.top_type_name()))
            .cloned()
    }

    /// Converts a host type description
    pub fn type_ref(&self, descriptor: &TypeDescriptor) -> InjectResult<TypeRef> {
        self.convert(|session, batch| session.type_in_batch(descriptor, batch))
    }

    fn convert<T>(
        &self,
        f: impl FnOnce(&Self, &mut ConversionBatch) -> InjectResult<T>,
    ) -> InjectResult<T> {
        let _guard = self.conversion.lock();
        let mut batch = ConversionBatch::default();
        let result = f(self, &mut batch).and_then(|value| {
            self.link_batch(&mut batch)?;
            Ok(value)
        });

        match result {
            Ok(value) => {
                if !batch.created.is_empty() {
                    debug!(count = batch.created.len(), "publishing converted classifiers");
                    let mut cache = self.classifiers.write();
                    for (name, classifier) in batch.created.drain() {
                        cache.insert(name, classifier);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                for classifier in batch.created.values() {
                    classifier.detach_links();
                }
                Err(err)
            }
        }
    }

    fn create_unlinked(&self, fq_name: &str, batch: &mut ConversionBatch) -> InjectResult<ClassifierRef> {
        if let Some(found) = self.classifiers.read().get(fq_name) {
            return Ok(found.clone());
        }
        if let Some(found) = batch.created.get(fq_name) {
            return Ok(found.clone());
        }

        let is_top = fq_name == self.catalog.top_type_name();
        let descriptor = match self.catalog.lookup_classifier(fq_name) {
            Some(descriptor) => descriptor,
            None if is_top => ClassifierDescriptor::class(fq_name),
            None => return Err(InjectError::UnknownClassifier(fq_name.to_string())),
        };
        let annotations = self
            .catalog
            .annotations_of(&DeclarationId::Classifier(fq_name.to_string()));

        let mut type_parameters = Vec::with_capacity(descriptor.type_parameters.len());
        for name in &descriptor.type_parameters {
            let parameter = self.catalog.lookup_classifier(name);
            if !matches!(parameter, Some(ref p) if p.kind == ClassifierKind::TypeParameter) {
                return Err(InjectError::UnknownTypeParameter {
                    callable: fq_name.to_string(),
                    name: name.clone(),
                });
            }
            type_parameters.push(self.create_unlinked(name, batch)?);
        }

        let mut builder = ClassifierBuilder::new(fq_name).type_parameters(type_parameters);
        if descriptor.kind == ClassifierKind::TypeParameter {
            builder = builder.type_parameter();
            if annotations.contains(&AnnotationTag::Spread) {
                builder = builder.spread();
            }
        }
        if descriptor.is_function_type {
            builder = builder.function();
        }
        if annotations.contains(&AnnotationTag::Module) {
            builder = builder.provider_bundle();
        }
        if annotations.contains(&AnnotationTag::Tag) {
            builder = builder.tag();
        }
        if is_top {
            builder = builder.top();
        }

        let (classifier, _, _) = builder.build_unlinked();
        batch.created.insert(classifier.fq_name_arc(), classifier.clone());
        batch.to_link.push((classifier.clone(), descriptor));
        Ok(classifier)
    }

    fn type_in_batch(&self, descriptor: &TypeDescriptor, batch: &mut ConversionBatch) -> InjectResult<TypeRef> {
        if descriptor.star {
            let top = self.create_unlinked(self.catalog.top_type_name(), batch)?;
            return Ok(TypeRef::star(&top).with_variance(descriptor.variance));
        }

        let classifier = self.create_unlinked(&descriptor.classifier, batch)?;
        let arguments = descriptor
            .arguments
            .iter()
            .map(|a| self.type_in_batch(a, batch))
            .collect::<InjectResult<Vec<_>>>()?;

        let mut ty = TypeRef::try_with_arguments(&classifier, arguments)?
            .with_variance(descriptor.variance)
            .with_nullability(descriptor.nullable);
        if let Some(tag) = &descriptor.qualifier {
            ty = ty.with_qualifier(QualifierTag::new(tag.as_str()));
        }
        Ok(ty)
    }

    fn link_batch(&self, batch: &mut ConversionBatch) -> InjectResult<()> {
        while let Some((classifier, descriptor)) = batch.to_link.pop() {
            let super_types = descriptor
                .super_types
                .iter()
                .map(|t| self.type_in_batch(t, batch))
                .collect::<InjectResult<Vec<_>>>()?;
            let expanded = descriptor
                .expanded_type
                .as_ref()
                .map(|t| self.type_in_batch(t, batch))
                .transpose()?;
            classifier.attach_links(super_types, expanded);
        }

        for classifier in batch.created.values() {
            check_alias_chain(classifier)?;
        }
        Ok(())
    }

    // ===== Callables =====

    /// Normalized callable for a declaration, cached by [`CallableId`].
    ///
    /// Parameters of injectable declarations are injected unless marked
    /// assisted; parameters of any other declaration only when marked inject.
    pub fn callable(&self, descriptor: &CallableDescriptor) -> InjectResult<Arc<Callable>> {
        let id = descriptor.id();
        if let Some(found) = self.callables.read().get(&id) {
            return Ok(found.clone());
        }
        let converted = Arc::new(self.convert_callable(id.clone(), descriptor)?);
        Ok(self.callables.write().entry(id).or_insert(converted).clone())
    }

    fn convert_callable(&self, id: CallableId, descriptor: &CallableDescriptor) -> InjectResult<Callable> {
        let annotations = self
            .catalog
            .annotations_of(&DeclarationId::Callable(id.clone()));

        let type_parameters = descriptor
            .type_parameters
            .iter()
            .map(|name| {
                let parameter = self.classifier(name)?;
                if !parameter.is_type_parameter() {
                    return Err(InjectError::UnknownTypeParameter {
                        callable: descriptor.fq_name.clone(),
                        name: name.clone(),
                    });
                }
                Ok(parameter)
            })
            .collect::<InjectResult<Vec<_>>>()?;

        let provided_type = self.type_ref(&descriptor.returns)?;
        let candidate_kind = if annotations.contains(&AnnotationTag::IntoSet) {
            CandidateKind::SetContribution
        } else if annotations.contains(&AnnotationTag::IntoMap) {
            CandidateKind::MapContribution
        } else if annotations.contains(&AnnotationTag::Module) || provided_type.is_provider_bundle() {
            CandidateKind::ModuleBundle
        } else {
            CandidateKind::Provider
        };

        let injectable = [
            AnnotationTag::Provide,
            AnnotationTag::Module,
            AnnotationTag::IntoSet,
            AnnotationTag::IntoMap,
        ]
        .iter()
        .any(|tag| annotations.contains(tag));

        let mut value_parameters = Vec::with_capacity(descriptor.value_parameters.len());
        for (index, parameter) in descriptor.value_parameters.iter().enumerate() {
            let tags = self
                .catalog
                .annotations_of(&DeclarationId::Parameter(id.clone(), index));
            let is_injected = if injectable {
                !tags.contains(&AnnotationTag::Assisted)
            } else {
                tags.contains(&AnnotationTag::Inject)
            };
            value_parameters.push(ValueParameter {
                name: parameter.name.as_str().into(),
                ty: self.type_ref(&parameter.ty)?,
                is_injected,
                has_default: parameter.has_default,
                is_extension_receiver: parameter.is_extension_receiver,
                is_variadic: parameter.is_variadic,
            });
        }

        let target_scope = descriptor
            .target_scope
            .as_ref()
            .map(|t| self.type_ref(t))
            .transpose()?;

        let mut callable = Callable::new(id, descriptor.kind, candidate_kind, provided_type)
            .with_type_parameters(type_parameters)
            .with_value_parameters(value_parameters);
        callable.target_scope = target_scope;
        Ok(callable)
    }

    // ===== Scopes and bundles =====

    /// Injectables declared directly in `scope`, in catalog order
    pub fn injectables(&self, scope: &ScopeRef) -> InjectResult<CallableList> {
        if let Some(found) = self.scope_injectables.read().get(scope) {
            return Ok(found.clone());
        }
        let converted = self
            .catalog
            .declared_injectables(scope)
            .iter()
            .map(|d| self.callable(d))
            .collect::<InjectResult<Vec<_>>>()?;
        let list: CallableList = converted.into();
        debug!(scope = %scope.label(), count = list.len(), "collected injectables");
        Ok(self
            .scope_injectables
            .write()
            .entry(scope.clone())
            .or_insert(list)
            .clone())
    }

    /// Direct members of a bundle instantiation, with the bundle's type
    /// arguments applied. Memoized per [`InstantiationKey`].
    pub fn bundle_members(&self, bundle: &TypeRef) -> InjectResult<CallableList> {
        let key = InstantiationKey::of(bundle);
        if let Some(found) = self.bundle_members.read().get(&key) {
            return Ok(found.clone());
        }

        let declared = self.injectables(&ScopeRef::Classifier(bundle.classifier.fq_name().to_string()))?;
        let arguments = bundle.argument_map();
        let members: Vec<Arc<Callable>> = declared
            .iter()
            .map(|member| {
                let mut instance = member.substitute(&arguments);
                instance.contributed_by = Some(bundle.clone());
                Arc::new(instance)
            })
            .collect();
        debug!(bundle = %key, members = members.len(), "instantiated bundle");

        Ok(self
            .bundle_members
            .write()
            .entry(key)
            .or_insert_with(|| members.into())
            .clone())
    }

    pub(crate) fn cached_expansion(&self, key: &InstantiationKey) -> Option<CallableList> {
        self.bundle_expansions.read().get(key).cloned()
    }

    pub(crate) fn store_expansion(&self, key: InstantiationKey, members: CallableList) -> CallableList {
        self.bundle_expansions
            .write()
            .entry(key)
            .or_insert(members)
            .clone()
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        for classifier in self.classifiers.get_mut().values() {
            classifier.detach_links();
        }
    }
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("stats", &self.stats())
            .finish()
    }
}

fn check_alias_chain(classifier: &ClassifierRef) -> InjectResult<()> {
    let mut path = vec![classifier.fq_name().to_string()];
    let mut current = classifier.expanded_type();
    while let Some(ty) = current {
        let name = ty.classifier.fq_name().to_string();
        if path.contains(&name) {
            path.push(name);
            return Err(InjectError::CyclicAlias(path));
        }
        path.push(name);
        current = ty.classifier.expanded_type();
    }
    Ok(())
}
