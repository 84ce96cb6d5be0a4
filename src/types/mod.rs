//! Host-independent type model.
//!
//! [`ClassifierRef`] names a type constructor (class, interface, alias, or
//! type parameter); [`TypeRef`] applies one to arguments and adds
//! nullability, projection, and qualifier information. Equality on both is
//! structural so types rebuilt by substitution compare equal to the
//! originals.

mod substitute;
mod subtype;
mod unique_name;

pub use substitute::substitution_map;
pub use unique_name::UNIQUE_NAME_LIMIT;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{InjectError, InjectResult};

/// Fully-qualified name of the universal top type used when no catalog overrides it.
pub const ANY_TYPE_NAME: &str = "Any";

/// Maximum depth for super-type and alias walks. Well-formed hierarchies
/// never get close; malformed catalog data stops here instead of overflowing.
pub(crate) const MAX_WALK_DEPTH: usize = 64;

/// Mapping from type parameters to the types that replace them.
///
/// Ordered so iteration (and therefore anything derived from it) is
/// deterministic.
pub type SubstitutionMap = BTreeMap<ClassifierRef, TypeRef>;

/// Use-site variance of a type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
pub enum Variance {
    #[default]
    Invariant,
    /// Contravariant (`in T`)
    In,
    /// Covariant (`out T`)
    Out,
}

impl Variance {
    pub fn label(self) -> &'static str {
        match self {
            Variance::Invariant => "",
            Variance::In => "in",
            Variance::Out => "out",
        }
    }
}

/// Nominal "color" that distinguishes otherwise identical types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifierTag(Arc<str>);

impl QualifierTag {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QualifierTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ===== Classifiers =====

struct ClassifierData {
    fq_name: Arc<str>,
    type_parameters: Vec<ClassifierRef>,
    is_type_parameter: bool,
    is_spread: bool,
    is_function: bool,
    is_provider_bundle: bool,
    is_tag: bool,
    is_top: bool,
    links: RwLock<ClassifierLinks>,
}

#[derive(Clone)]
struct ClassifierLinks {
    super_types: Arc<[TypeRef]>,
    expanded_type: Option<TypeRef>,
}

impl Default for ClassifierLinks {
    fn default() -> Self {
        Self {
            super_types: Arc::from(Vec::new()),
            expanded_type: None,
        }
    }
}

/// Identity of a named type constructor.
///
/// Equality, ordering, and hashing only look at the fully-qualified name:
/// two refs built for the same name are the same classifier.
///
/// Super-types (upper bounds, for type parameters) and alias expansions are
/// attached after construction, which is what lets a hierarchy such as
/// `class Foo : Comparable<Foo>` refer to itself.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{ClassifierRef, TypeRef};
///
/// let service = ClassifierRef::class("app.Service");
/// let impl_ = ClassifierRef::builder("app.ServiceImpl")
///     .super_types(vec![TypeRef::of(&service)])
///     .build();
///
/// assert_eq!(impl_.short_name(), "ServiceImpl");
/// assert_eq!(impl_.super_types().len(), 1);
/// assert_eq!(ClassifierRef::class("app.Service"), service);
/// ```
#[derive(Clone)]
pub struct ClassifierRef(Arc<ClassifierData>);

impl ClassifierRef {
    /// Plain class without type parameters or super-types
    pub fn class(fq_name: impl Into<Arc<str>>) -> Self {
        ClassifierBuilder::new(fq_name).build()
    }

    /// Unbounded type parameter
    pub fn type_parameter(fq_name: impl Into<Arc<str>>) -> Self {
        ClassifierBuilder::new(fq_name).type_parameter().build()
    }

    /// Universal top type
    pub fn top(fq_name: impl Into<Arc<str>>) -> Self {
        ClassifierBuilder::new(fq_name).top().build()
    }

    pub fn builder(fq_name: impl Into<Arc<str>>) -> ClassifierBuilder {
        ClassifierBuilder::new(fq_name)
    }

    pub fn fq_name(&self) -> &str {
        &self.0.fq_name
    }

    pub(crate) fn fq_name_arc(&self) -> Arc<str> {
        self.0.fq_name.clone()
    }

    pub fn short_name(&self) -> &str {
        let name = self.fq_name();
        name.rsplit('.').next().unwrap_or(name)
    }

    pub fn type_parameters(&self) -> &[ClassifierRef] {
        &self.0.type_parameters
    }

    pub fn is_type_parameter(&self) -> bool {
        self.0.is_type_parameter
    }

    /// Whether this type parameter may be instantiated against any frontier type
    pub fn is_spread(&self) -> bool {
        self.0.is_spread
    }

    pub fn is_function(&self) -> bool {
        self.0.is_function
    }

    pub fn is_provider_bundle(&self) -> bool {
        self.0.is_provider_bundle
    }

    pub fn is_tag(&self) -> bool {
        self.0.is_tag
    }

    pub fn is_top(&self) -> bool {
        self.0.is_top
    }

    /// Declared super-types, or upper bounds when this is a type parameter.
    ///
    /// Expressed in terms of this classifier's own type parameters; use
    /// [`TypeRef::super_types`] for a view substituted with actual arguments.
    pub fn super_types(&self) -> Arc<[TypeRef]> {
        self.0.links.read().super_types.clone()
    }

    /// Alias target, in terms of this classifier's own type parameters
    pub fn expanded_type(&self) -> Option<TypeRef> {
        self.0.links.read().expanded_type.clone()
    }

    /// The classifier applied to its own type parameters
    pub fn default_type(&self) -> TypeRef {
        TypeRef::with_arguments(
            self,
            self.type_parameters().iter().map(|p| p.default_type()).collect(),
        )
    }

    pub(crate) fn attach_links(&self, super_types: Vec<TypeRef>, expanded_type: Option<TypeRef>) {
        let mut links = self.0.links.write();
        links.super_types = Arc::from(super_types);
        links.expanded_type = expanded_type;
    }

    /// Drops super-type and expansion links, releasing reference cycles
    pub(crate) fn detach_links(&self) {
        *self.0.links.write() = ClassifierLinks::default();
    }
}

impl PartialEq for ClassifierRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.fq_name == other.0.fq_name
    }
}

impl Eq for ClassifierRef {}

impl Hash for ClassifierRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.fq_name.hash(state);
    }
}

impl PartialOrd for ClassifierRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClassifierRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.fq_name.cmp(&other.0.fq_name)
    }
}

impl fmt::Debug for ClassifierRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassifierRef({})", self.fq_name())
    }
}

/// Builder for [`ClassifierRef`].
pub struct ClassifierBuilder {
    fq_name: Arc<str>,
    type_parameters: Vec<ClassifierRef>,
    super_types: Vec<TypeRef>,
    expanded_type: Option<TypeRef>,
    is_type_parameter: bool,
    is_spread: bool,
    is_function: bool,
    is_provider_bundle: bool,
    is_tag: bool,
    is_top: bool,
}

impl ClassifierBuilder {
    pub fn new(fq_name: impl Into<Arc<str>>) -> Self {
        Self {
            fq_name: fq_name.into(),
            type_parameters: Vec::new(),
            super_types: Vec::new(),
            expanded_type: None,
            is_type_parameter: false,
            is_spread: false,
            is_function: false,
            is_provider_bundle: false,
            is_tag: false,
            is_top: false,
        }
    }

    pub fn type_parameters(mut self, parameters: Vec<ClassifierRef>) -> Self {
        self.type_parameters = parameters;
        self
    }

    /// Super-types, or upper bounds for a type parameter
    pub fn super_types(mut self, super_types: Vec<TypeRef>) -> Self {
        self.super_types = super_types;
        self
    }

    pub fn expanded_type(mut self, expanded: TypeRef) -> Self {
        self.expanded_type = Some(expanded);
        self
    }

    pub fn type_parameter(mut self) -> Self {
        self.is_type_parameter = true;
        self
    }

    pub fn spread(mut self) -> Self {
        self.is_type_parameter = true;
        self.is_spread = true;
        self
    }

    pub fn function(mut self) -> Self {
        self.is_function = true;
        self
    }

    pub fn provider_bundle(mut self) -> Self {
        self.is_provider_bundle = true;
        self
    }

    pub fn tag(mut self) -> Self {
        self.is_tag = true;
        self
    }

    pub fn top(mut self) -> Self {
        self.is_top = true;
        self
    }

    /// Builds the classifier without attaching links; the caller attaches
    /// them once every classifier they mention exists.
    pub(crate) fn build_unlinked(self) -> (ClassifierRef, Vec<TypeRef>, Option<TypeRef>) {
        let classifier = ClassifierRef(Arc::new(ClassifierData {
            fq_name: self.fq_name,
            type_parameters: self.type_parameters,
            is_type_parameter: self.is_type_parameter,
            is_spread: self.is_spread,
            is_function: self.is_function,
            is_provider_bundle: self.is_provider_bundle,
            is_tag: self.is_tag,
            is_top: self.is_top,
            links: RwLock::new(ClassifierLinks::default()),
        }));
        (classifier, self.super_types, self.expanded_type)
    }

    pub fn build(self) -> ClassifierRef {
        let (classifier, super_types, expanded) = self.build_unlinked();
        classifier.attach_links(super_types, expanded);
        classifier
    }
}

// ===== Types =====

/// A classifier applied to arguments.
///
/// Equality, hashing, and ordering cover classifier, arguments, qualifier,
/// nullability, and star projection. Use-site variance is carried along but
/// does not distinguish types.
///
/// # Examples
///
/// ```rust
/// use ferrous_inject::{ClassifierRef, TypeRef, QualifierTag};
///
/// let string = TypeRef::of(&ClassifierRef::class("kotlin.String"));
/// let t = ClassifierRef::type_parameter("kotlin.collections.List.T");
/// let list = ClassifierRef::builder("kotlin.collections.List")
///     .type_parameters(vec![t])
///     .build();
///
/// let strings = TypeRef::with_arguments(&list, vec![string.clone()]);
/// assert_eq!(strings.render(), "kotlin.collections.List<kotlin.String>");
/// assert_eq!(string.clone().nullable().render(), "kotlin.String?");
/// assert_eq!(
///     string.clone().with_qualifier(QualifierTag::new("app.UserId")).render(),
///     "@app.UserId kotlin.String"
/// );
/// assert_ne!(string.clone(), string.nullable());
/// ```
#[derive(Clone)]
pub struct TypeRef {
    pub classifier: ClassifierRef,
    pub arguments: Vec<TypeRef>,
    pub variance: Variance,
    pub is_marked_nullable: bool,
    pub is_star_projection: bool,
    pub qualifier: Option<QualifierTag>,
}

impl TypeRef {
    /// Type of a classifier without arguments
    pub fn of(classifier: &ClassifierRef) -> Self {
        Self::with_arguments(classifier, Vec::new())
    }

    pub fn with_arguments(classifier: &ClassifierRef, arguments: Vec<TypeRef>) -> Self {
        Self {
            classifier: classifier.clone(),
            arguments,
            variance: Variance::Invariant,
            is_marked_nullable: false,
            is_star_projection: false,
            qualifier: None,
        }
    }

    /// Like [`TypeRef::with_arguments`] but checks the argument count
    pub fn try_with_arguments(classifier: &ClassifierRef, arguments: Vec<TypeRef>) -> InjectResult<Self> {
        let expected = classifier.type_parameters().len();
        if expected != arguments.len() {
            return Err(InjectError::ArgumentCountMismatch {
                classifier: classifier.fq_name().to_string(),
                expected,
                found: arguments.len(),
            });
        }
        Ok(Self::with_arguments(classifier, arguments))
    }

    /// `*` projection
    pub fn star(top: &ClassifierRef) -> Self {
        Self {
            is_star_projection: true,
            ..Self::of(top)
        }
    }

    pub fn nullable(self) -> Self {
        self.with_nullability(true)
    }

    pub fn with_nullability(mut self, nullable: bool) -> Self {
        self.is_marked_nullable = nullable;
        self
    }

    pub fn with_qualifier(mut self, qualifier: QualifierTag) -> Self {
        self.qualifier = Some(qualifier);
        self
    }

    pub fn without_qualifier(mut self) -> Self {
        self.qualifier = None;
        self
    }

    pub fn with_variance(mut self, variance: Variance) -> Self {
        self.variance = variance;
        self
    }

    pub fn is_type_parameter(&self) -> bool {
        self.classifier.is_type_parameter()
    }

    pub fn is_function_type(&self) -> bool {
        self.classifier.is_function()
    }

    pub fn is_provider_bundle(&self) -> bool {
        self.classifier.is_provider_bundle()
    }

    pub fn is_tag(&self) -> bool {
        self.classifier.is_tag()
    }

    /// Whether any type parameter occurs anywhere in this type
    pub fn contains_type_parameter(&self) -> bool {
        self.classifier.is_type_parameter()
            || self.arguments.iter().any(|a| a.contains_type_parameter())
    }

    /// Whether any of `parameters` occurs anywhere in this type
    pub fn mentions_any(&self, parameters: &[ClassifierRef]) -> bool {
        parameters.contains(&self.classifier)
            || self.arguments.iter().any(|a| a.mentions_any(parameters))
    }

    /// Maps this type's classifier parameters onto its arguments
    pub(crate) fn argument_map(&self) -> SubstitutionMap {
        self.classifier
            .type_parameters()
            .iter()
            .cloned()
            .zip(self.arguments.iter().cloned())
            .collect()
    }

    /// Declared super-types substituted with this type's arguments
    pub fn super_types(&self) -> Vec<TypeRef> {
        let map = self.argument_map();
        self.classifier
            .super_types()
            .iter()
            .map(|s| s.substitute(&map))
            .collect()
    }

    /// One step of alias expansion; nullability of the alias use carries over
    pub fn expanded(&self) -> Option<TypeRef> {
        let expanded = self.classifier.expanded_type()?;
        let mut result = expanded.substitute(&self.argument_map());
        result.is_marked_nullable |= self.is_marked_nullable;
        if result.qualifier.is_none() {
            result.qualifier = self.qualifier.clone();
        }
        Some(result)
    }

    /// Follows alias expansion until a non-alias type is reached
    pub fn fully_expanded(&self) -> TypeRef {
        let mut current = self.clone();
        for _ in 0..MAX_WALK_DEPTH {
            match current.expanded() {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// This type viewed as `classifier`, found by walking alias expansions
    /// and super-types. `None` when `classifier` is not an ancestor.
    pub fn subtype_view(&self, classifier: &ClassifierRef) -> Option<TypeRef> {
        self.subtype_view_at(classifier, 0)
    }

    fn subtype_view_at(&self, classifier: &ClassifierRef, depth: usize) -> Option<TypeRef> {
        if depth > MAX_WALK_DEPTH {
            return None;
        }
        if &self.classifier == classifier {
            return Some(self.clone());
        }
        if let Some(expanded) = self.expanded() {
            if let Some(view) = expanded.subtype_view_at(classifier, depth + 1) {
                return Some(view);
            }
        }
        self.super_types()
            .iter()
            .find_map(|s| s.subtype_view_at(classifier, depth + 1))
    }

    /// Human-readable rendering for diagnostics
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        if let Some(qualifier) = &self.qualifier {
            out.push('@');
            out.push_str(qualifier.name());
            out.push(' ');
        }
        if self.is_star_projection {
            out.push('*');
            return;
        }
        if self.classifier.is_type_parameter() {
            out.push_str(self.classifier.short_name());
        } else {
            out.push_str(self.classifier.fq_name());
        }
        if !self.arguments.is_empty() {
            out.push('<');
            for (index, argument) in self.arguments.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                if argument.variance != Variance::Invariant && !argument.is_star_projection {
                    out.push_str(argument.variance.label());
                    out.push(' ');
                }
                argument.render_into(out);
            }
            out.push('>');
        }
        if self.is_marked_nullable {
            out.push('?');
        }
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.classifier == other.classifier
            && self.is_marked_nullable == other.is_marked_nullable
            && self.is_star_projection == other.is_star_projection
            && self.qualifier == other.qualifier
            && self.arguments == other.arguments
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.classifier.hash(state);
        self.arguments.hash(state);
        self.is_marked_nullable.hash(state);
        self.is_star_projection.hash(state);
        self.qualifier.hash(state);
    }
}

impl PartialOrd for TypeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.classifier
            .cmp(&other.classifier)
            .then_with(|| self.arguments.cmp(&other.arguments))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            .then_with(|| self.is_marked_nullable.cmp(&other.is_marked_nullable))
            .then_with(|| self.is_star_projection.cmp(&other.is_star_projection))
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.render())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
