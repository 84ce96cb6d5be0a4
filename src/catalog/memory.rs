//! In-memory catalog for tests, benchmarks, and hosts that pre-serialize
//! their declarations.

use std::collections::BTreeSet;

use ahash::AHashMap;

use super::{
    AnnotationTag, CallableDescriptor, ClassifierDescriptor, ClassifierKind, DeclarationCatalog,
    DeclarationId, ScopeRef, TypeDescriptor,
};
use crate::key::SourcePosition;
use crate::types::ANY_TYPE_NAME;

/// Catalog backed by hash maps, assembled with [`InMemoryCatalogBuilder`].
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{
///     CallableDescriptor, DeclarationCatalog, InMemoryCatalog, ScopeRef, TypeDescriptor,
/// };
///
/// let catalog = InMemoryCatalog::builder()
///     .provide(
///         ScopeRef::Global,
///         CallableDescriptor::function("app.provideFoo", TypeDescriptor::named("app.Service")),
///     )
///     .build();
///
/// // Unknown classifiers referenced by declarations are registered as plain classes
/// assert!(catalog.lookup_classifier("app.Service").is_some());
/// assert_eq!(catalog.declared_injectables(&ScopeRef::Global).len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    classifiers: AHashMap<String, ClassifierDescriptor>,
    injectables: AHashMap<ScopeRef, Vec<CallableDescriptor>>,
    annotations: AHashMap<DeclarationId, BTreeSet<AnnotationTag>>,
    top_type: String,
}

impl InMemoryCatalog {
    pub fn builder() -> InMemoryCatalogBuilder {
        InMemoryCatalogBuilder::new()
    }

    /// Number of injectable declarations across all scopes
    pub fn injectable_count(&self) -> usize {
        self.injectables.values().map(Vec::len).sum()
    }
}

impl DeclarationCatalog for InMemoryCatalog {
    fn lookup_classifier(&self, fq_name: &str) -> Option<ClassifierDescriptor> {
        self.classifiers.get(fq_name).cloned()
    }

    fn declared_injectables(&self, scope: &ScopeRef) -> Vec<CallableDescriptor> {
        self.injectables.get(scope).cloned().unwrap_or_default()
    }

    fn annotations_of(&self, declaration: &DeclarationId) -> BTreeSet<AnnotationTag> {
        self.annotations.get(declaration).cloned().unwrap_or_default()
    }

    fn top_type_name(&self) -> &str {
        &self.top_type
    }
}

/// Builder for [`InMemoryCatalog`].
///
/// Declarations without a position get a sequential one (`line` counts
/// declarations in insertion order), so overloads never collide.
pub struct InMemoryCatalogBuilder {
    classifiers: Vec<ClassifierDescriptor>,
    declarations: Vec<(ScopeRef, CallableDescriptor, Vec<AnnotationTag>)>,
    annotations: Vec<(DeclarationId, AnnotationTag)>,
    parameter_annotations: Vec<(String, String, AnnotationTag)>,
    top_type: String,
}

impl InMemoryCatalogBuilder {
    pub fn new() -> Self {
        Self {
            classifiers: Vec::new(),
            declarations: Vec::new(),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            top_type: ANY_TYPE_NAME.to_string(),
        }
    }

    pub fn classifier(mut self, descriptor: ClassifierDescriptor) -> Self {
        self.classifiers.push(descriptor);
        self
    }

    /// Plain class extending the named super-types
    pub fn class(self, fq_name: &str, super_types: &[&str]) -> Self {
        let descriptor = super_types
            .iter()
            .fold(ClassifierDescriptor::class(fq_name), |d, s| {
                d.extends(TypeDescriptor::named(*s))
            });
        self.classifier(descriptor)
    }

    /// Qualifier tag classifier
    pub fn tag(self, fq_name: &str) -> Self {
        self.classifier(ClassifierDescriptor::class(fq_name))
            .annotate(DeclarationId::Classifier(fq_name.to_string()), AnnotationTag::Tag)
    }

    /// Type parameter with upper bounds
    pub fn bounded_parameter(self, fq_name: &str, bounds: Vec<TypeDescriptor>) -> Self {
        let descriptor = bounds
            .into_iter()
            .fold(ClassifierDescriptor::type_parameter(fq_name), |d, b| d.extends(b));
        self.classifier(descriptor)
    }

    /// Spread type parameter with upper bounds
    pub fn spread_parameter(self, fq_name: &str, bounds: Vec<TypeDescriptor>) -> Self {
        self.bounded_parameter(fq_name, bounds)
            .annotate(DeclarationId::Classifier(fq_name.to_string()), AnnotationTag::Spread)
    }

    /// Registers `Set<E>` and `Map<K, V>` under the given names
    pub fn collections(self, set: &str, map: &str) -> Self {
        self.classifier(ClassifierDescriptor::interface(set).type_parameters([format!("{}.E", set)]))
            .classifier(
                ClassifierDescriptor::interface(map)
                    .type_parameters([format!("{}.K", map), format!("{}.V", map)]),
            )
    }

    pub fn declare(
        mut self,
        scope: ScopeRef,
        descriptor: CallableDescriptor,
        tags: &[AnnotationTag],
    ) -> Self {
        self.declarations.push((scope, descriptor, tags.to_vec()));
        self
    }

    pub fn provide(self, scope: ScopeRef, descriptor: CallableDescriptor) -> Self {
        self.declare(scope, descriptor, &[AnnotationTag::Provide])
    }

    pub fn contribute_to_set(self, scope: ScopeRef, descriptor: CallableDescriptor) -> Self {
        self.declare(scope, descriptor, &[AnnotationTag::Provide, AnnotationTag::IntoSet])
    }

    pub fn contribute_to_map(self, scope: ScopeRef, descriptor: CallableDescriptor) -> Self {
        self.declare(scope, descriptor, &[AnnotationTag::Provide, AnnotationTag::IntoMap])
    }

    /// Object bundle named `fq_name`, declared in `scope`, whose members are
    /// provided from inside the bundle
    pub fn bundle(mut self, scope: ScopeRef, fq_name: &str, members: Vec<CallableDescriptor>) -> Self {
        self = self
            .classifier(ClassifierDescriptor::object(fq_name))
            .annotate(DeclarationId::Classifier(fq_name.to_string()), AnnotationTag::Module)
            .declare(scope, CallableDescriptor::class(fq_name), &[AnnotationTag::Module]);
        for member in members {
            self = self.provide(ScopeRef::Classifier(fq_name.to_string()), member);
        }
        self
    }

    pub fn annotate(mut self, declaration: DeclarationId, tag: AnnotationTag) -> Self {
        self.annotations.push((declaration, tag));
        self
    }

    /// Annotates the named parameter of every declaration named `callable`
    pub fn annotate_parameter(mut self, callable: &str, parameter: &str, tag: AnnotationTag) -> Self {
        self.parameter_annotations
            .push((callable.to_string(), parameter.to_string(), tag));
        self
    }

    pub fn assisted(self, callable: &str, parameter: &str) -> Self {
        self.annotate_parameter(callable, parameter, AnnotationTag::Assisted)
    }

    pub fn top_type(mut self, fq_name: &str) -> Self {
        self.top_type = fq_name.to_string();
        self
    }

    pub fn build(self) -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog {
            top_type: self.top_type,
            ..InMemoryCatalog::default()
        };

        for descriptor in self.classifiers {
            catalog.classifiers.insert(descriptor.fq_name.clone(), descriptor);
        }

        let mut declared = Vec::with_capacity(self.declarations.len());
        for (line, (scope, mut descriptor, tags)) in self.declarations.into_iter().enumerate() {
            if descriptor.position.is_none() {
                let file = match &scope {
                    ScopeRef::File(name) => name.clone(),
                    _ => "memory.kt".to_string(),
                };
                descriptor.position = Some(SourcePosition::new(file, line as u32 + 1, 1));
            }
            let id = descriptor.id();
            for tag in tags {
                catalog
                    .annotations
                    .entry(DeclarationId::Callable(id.clone()))
                    .or_default()
                    .insert(tag);
            }
            declared.push((scope, descriptor));
        }

        for (callable, parameter, tag) in &self.parameter_annotations {
            for (_, descriptor) in declared.iter().filter(|(_, d)| &d.fq_name == callable) {
                if let Some(index) = descriptor
                    .value_parameters
                    .iter()
                    .position(|p| &p.name == parameter)
                {
                    catalog
                        .annotations
                        .entry(DeclarationId::Parameter(descriptor.id(), index))
                        .or_default()
                        .insert(*tag);
                }
            }
        }
        for (declaration, tag) in self.annotations {
            catalog.annotations.entry(declaration).or_default().insert(tag);
        }

        register_implicit_classifiers(&mut catalog, &declared);

        for (scope, descriptor) in declared {
            catalog.injectables.entry(scope).or_default().push(descriptor);
        }
        catalog
    }
}

impl Default for InMemoryCatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers type parameters and referenced-but-undeclared classifiers
fn register_implicit_classifiers(
    catalog: &mut InMemoryCatalog,
    declared: &[(ScopeRef, CallableDescriptor)],
) {
    let mut parameters: Vec<String> = Vec::new();
    let mut referenced: Vec<String> = vec![catalog.top_type.clone()];

    for (_, descriptor) in declared {
        parameters.extend(descriptor.type_parameters.iter().cloned());
        let mut types = vec![&descriptor.returns];
        types.extend(descriptor.value_parameters.iter().map(|p| &p.ty));
        types.extend(descriptor.target_scope.iter());
        for ty in types {
            referenced.extend(ty.classifier_names().into_iter().map(str::to_string));
        }
    }
    for descriptor in catalog.classifiers.values() {
        parameters.extend(descriptor.type_parameters.iter().cloned());
        for ty in descriptor.super_types.iter().chain(descriptor.expanded_type.iter()) {
            referenced.extend(ty.classifier_names().into_iter().map(str::to_string));
        }
    }

    for name in parameters {
        catalog
            .classifiers
            .entry(name.clone())
            .or_insert_with(|| ClassifierDescriptor::new(name, ClassifierKind::TypeParameter));
    }
    for name in referenced {
        catalog
            .classifiers
            .entry(name.clone())
            .or_insert_with(|| ClassifierDescriptor::class(name));
    }
}
