//! The declaration catalog: the host compiler's view of declarations.
//!
//! The engine never parses source or inspects host types. Everything it
//! knows about classifiers, injectable declarations, and annotations comes
//! through [`DeclarationCatalog`]. Descriptors are plain data in terms of
//! fully-qualified names; the [`AnalysisSession`](crate::AnalysisSession)
//! converts them into the engine's type model and caches the result.

mod memory;

pub use memory::{InMemoryCatalog, InMemoryCatalogBuilder};

use std::collections::BTreeSet;

use crate::callable::DeclarationKind;
use crate::key::{CallableId, SourcePosition};
use crate::types::{TypeRef, Variance, ANY_TYPE_NAME};

/// Read-only source of declarations.
///
/// Implementations must be deterministic: the same query returns the same
/// answer for the lifetime of a session.
pub trait DeclarationCatalog: Send + Sync {
    /// Describes the classifier with the given fully-qualified name
    fn lookup_classifier(&self, fq_name: &str) -> Option<ClassifierDescriptor>;

    /// Injectable declarations (providers, bundles, contributions) declared
    /// directly in `scope`
    fn declared_injectables(&self, scope: &ScopeRef) -> Vec<CallableDescriptor>;

    fn annotations_of(&self, declaration: &DeclarationId) -> BTreeSet<AnnotationTag>;

    /// Human-readable rendering for diagnostics
    fn render_type(&self, ty: &TypeRef) -> String {
        ty.render()
    }

    /// Fully-qualified name of the universal top type
    fn top_type_name(&self) -> &str {
        ANY_TYPE_NAME
    }
}

/// Annotation markers the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnnotationTag {
    /// Declaration is an injectable provider
    Provide,
    /// Declaration (or classifier) is a module bundle
    Module,
    /// Classifier is a qualifier tag
    Tag,
    /// Type parameter is a spread parameter
    Spread,
    /// Parameter of a non-injectable declaration is injected
    Inject,
    /// Parameter of an injectable is supplied by the caller
    Assisted,
    IntoSet,
    IntoMap,
}

/// A visibility context the catalog can enumerate injectables for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeRef {
    /// Catalog-wide injectables
    Global,
    Package(String),
    File(String),
    /// Members of a class, object, or companion
    Classifier(String),
    /// Local declarations of a function or property
    Declaration(CallableId),
    /// Host-defined id of an executable block
    Block(String),
}

impl ScopeRef {
    pub fn label(&self) -> String {
        match self {
            ScopeRef::Global => "global".to_string(),
            ScopeRef::Package(name) => format!("package {}", name),
            ScopeRef::File(name) => format!("file {}", name),
            ScopeRef::Classifier(name) => format!("class {}", name),
            ScopeRef::Declaration(id) => format!("declaration {}", id),
            ScopeRef::Block(id) => format!("block {}", id),
        }
    }
}

/// Anything the catalog can report annotations for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclarationId {
    Classifier(String),
    Callable(CallableId),
    /// Value parameter of a callable, by index
    Parameter(CallableId, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifierKind {
    Class,
    Interface,
    Object,
    TypeParameter,
    TypeAlias,
}

/// Host description of a classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierDescriptor {
    pub fq_name: String,
    pub kind: ClassifierKind,
    /// Fully-qualified names of the classifier's own type parameters
    pub type_parameters: Vec<String>,
    /// Super-types, or upper bounds for a type parameter
    pub super_types: Vec<TypeDescriptor>,
    /// Alias target
    pub expanded_type: Option<TypeDescriptor>,
    pub is_function_type: bool,
}

impl ClassifierDescriptor {
    pub fn new(fq_name: impl Into<String>, kind: ClassifierKind) -> Self {
        Self {
            fq_name: fq_name.into(),
            kind,
            type_parameters: Vec::new(),
            super_types: Vec::new(),
            expanded_type: None,
            is_function_type: false,
        }
    }

    pub fn class(fq_name: impl Into<String>) -> Self {
        Self::new(fq_name, ClassifierKind::Class)
    }

    pub fn interface(fq_name: impl Into<String>) -> Self {
        Self::new(fq_name, ClassifierKind::Interface)
    }

    pub fn object(fq_name: impl Into<String>) -> Self {
        Self::new(fq_name, ClassifierKind::Object)
    }

    pub fn type_parameter(fq_name: impl Into<String>) -> Self {
        Self::new(fq_name, ClassifierKind::TypeParameter)
    }

    pub fn alias(fq_name: impl Into<String>, expanded: TypeDescriptor) -> Self {
        Self {
            expanded_type: Some(expanded),
            ..Self::new(fq_name, ClassifierKind::TypeAlias)
        }
    }

    /// Function type `name<P1.., R>` with `arity` parameters
    pub fn function(fq_name: impl Into<String>, arity: usize) -> Self {
        let fq_name = fq_name.into();
        let mut type_parameters: Vec<String> =
            (1..=arity).map(|i| format!("{}.P{}", fq_name, i)).collect();
        type_parameters.push(format!("{}.R", fq_name));
        Self {
            type_parameters,
            is_function_type: true,
            ..Self::new(fq_name, ClassifierKind::Interface)
        }
    }

    pub fn type_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn extends(mut self, super_type: TypeDescriptor) -> Self {
        self.super_types.push(super_type);
        self
    }
}

/// Host description of a type use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
    pub classifier: String,
    pub arguments: Vec<TypeDescriptor>,
    pub variance: Variance,
    pub nullable: bool,
    pub star: bool,
    /// Fully-qualified name of a tag classifier
    pub qualifier: Option<String>,
}

impl TypeDescriptor {
    pub fn named(classifier: impl Into<String>) -> Self {
        Self {
            classifier: classifier.into(),
            arguments: Vec::new(),
            variance: Variance::Invariant,
            nullable: false,
            star: false,
            qualifier: None,
        }
    }

    pub fn with_arguments(classifier: impl Into<String>, arguments: Vec<TypeDescriptor>) -> Self {
        Self {
            arguments,
            ..Self::named(classifier)
        }
    }

    pub fn star() -> Self {
        Self {
            star: true,
            ..Self::named(ANY_TYPE_NAME)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn qualified(mut self, tag: impl Into<String>) -> Self {
        self.qualifier = Some(tag.into());
        self
    }

    pub fn variance(mut self, variance: Variance) -> Self {
        self.variance = variance;
        self
    }

    /// Every classifier name this type mentions
    pub fn classifier_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        if !self.star {
            out.push(&self.classifier);
        }
        if let Some(q) = &self.qualifier {
            out.push(q);
        }
        for a in &self.arguments {
            a.collect_names(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueParameterDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    pub has_default: bool,
    pub is_extension_receiver: bool,
    pub is_variadic: bool,
}

impl ValueParameterDescriptor {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            has_default: false,
            is_extension_receiver: false,
            is_variadic: false,
        }
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn extension_receiver(mut self) -> Self {
        self.is_extension_receiver = true;
        self
    }

    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }
}

/// Host description of a callable declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableDescriptor {
    pub fq_name: String,
    pub position: Option<SourcePosition>,
    pub kind: DeclarationKind,
    /// Return type, or the constructed class for class declarations
    pub returns: TypeDescriptor,
    /// Fully-qualified names of declared type parameters
    pub type_parameters: Vec<String>,
    pub value_parameters: Vec<ValueParameterDescriptor>,
    pub target_scope: Option<TypeDescriptor>,
}

impl CallableDescriptor {
    pub fn new(fq_name: impl Into<String>, kind: DeclarationKind, returns: TypeDescriptor) -> Self {
        Self {
            fq_name: fq_name.into(),
            position: None,
            kind,
            returns,
            type_parameters: Vec::new(),
            value_parameters: Vec::new(),
            target_scope: None,
        }
    }

    pub fn function(fq_name: impl Into<String>, returns: TypeDescriptor) -> Self {
        Self::new(fq_name, DeclarationKind::Function, returns)
    }

    pub fn property(fq_name: impl Into<String>, returns: TypeDescriptor) -> Self {
        Self::new(fq_name, DeclarationKind::Property, returns)
    }

    /// Constructor of the class with the given name
    pub fn class(fq_name: impl Into<String>) -> Self {
        let fq_name = fq_name.into();
        let returns = TypeDescriptor::named(fq_name.clone());
        Self::new(fq_name, DeclarationKind::Class, returns)
    }

    pub fn at(mut self, position: SourcePosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn type_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_parameters = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn parameter(mut self, parameter: ValueParameterDescriptor) -> Self {
        self.value_parameters.push(parameter);
        self
    }

    /// Shorthand for a parameter of the named type
    pub fn needs(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.parameter(ValueParameterDescriptor::new(name, ty))
    }

    pub fn target_scope(mut self, target: TypeDescriptor) -> Self {
        self.target_scope = Some(target);
        self
    }

    pub fn id(&self) -> CallableId {
        CallableId::new(
            self.fq_name.as_str(),
            self.position
                .clone()
                .unwrap_or_else(|| SourcePosition::new("<unknown>", 0, 0)),
        )
    }
}
