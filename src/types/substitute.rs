//! Type substitution and substitution-map recovery.

use ahash::AHashSet;

use super::{SubstitutionMap, TypeRef};

impl TypeRef {
    /// Replaces every type parameter that is a key of `map` with its mapped
    /// type, recursing into arguments.
    ///
    /// The usage's nullability is OR-ed into the replacement (`T?` with
    /// `T = String` gives `String?`) and the usage's qualifier, when present,
    /// wins over the replacement's. Substituting with an empty map returns an
    /// equal type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ferrous_inject::{ClassifierRef, SubstitutionMap, TypeRef};
    ///
    /// let t = ClassifierRef::type_parameter("app.Box.T");
    /// let boxed = ClassifierRef::builder("app.Box").type_parameters(vec![t.clone()]).build();
    /// let string = TypeRef::of(&ClassifierRef::class("kotlin.String"));
    ///
    /// let mut map = SubstitutionMap::new();
    /// map.insert(t.clone(), string);
    ///
    /// let generic = TypeRef::with_arguments(&boxed, vec![TypeRef::of(&t).nullable()]);
    /// assert_eq!(generic.substitute(&map).render(), "app.Box<kotlin.String?>");
    /// assert_eq!(generic.substitute(&SubstitutionMap::new()), generic);
    /// ```
    pub fn substitute(&self, map: &SubstitutionMap) -> TypeRef {
        if map.is_empty() {
            return self.clone();
        }
        if !self.is_star_projection {
            if let Some(mapped) = map.get(&self.classifier) {
                let mut result = mapped.clone();
                result.is_marked_nullable |= self.is_marked_nullable;
                if self.qualifier.is_some() {
                    result.qualifier = self.qualifier.clone();
                }
                result.variance = self.variance;
                return result;
            }
        }
        if self.arguments.is_empty() {
            return self.clone();
        }
        TypeRef {
            arguments: self.arguments.iter().map(|a| a.substitute(map)).collect(),
            ..self.clone()
        }
    }
}

/// Recovers how the type parameters of `parameterized` map onto `concrete`.
///
/// Walks both types in lockstep and records `parameter -> argument` wherever
/// `parameterized` exposes a bare type parameter. When the classifiers
/// differ, the walk continues through the subtype view of either side, and
/// the upper bounds of every recorded parameter are walked too so that
/// `T : List<E>` also binds `E`. The first binding for a parameter wins.
///
/// ```rust
/// use ferrous_inject::{substitution_map, ClassifierRef, TypeRef};
///
/// let t = ClassifierRef::type_parameter("app.Box.T");
/// let boxed = ClassifierRef::builder("app.Box").type_parameters(vec![t.clone()]).build();
/// let string = TypeRef::of(&ClassifierRef::class("kotlin.String"));
///
/// let map = substitution_map(
///     &TypeRef::with_arguments(&boxed, vec![string.clone()]),
///     &TypeRef::with_arguments(&boxed, vec![TypeRef::of(&t)]),
/// );
/// assert_eq!(map.get(&t), Some(&string));
/// ```
pub fn substitution_map(concrete: &TypeRef, parameterized: &TypeRef) -> SubstitutionMap {
    let mut map = SubstitutionMap::new();
    let mut visited = AHashSet::new();
    collect(concrete, parameterized, &mut map, &mut visited);
    map
}

fn collect(
    concrete: &TypeRef,
    parameterized: &TypeRef,
    map: &mut SubstitutionMap,
    visited: &mut AHashSet<(TypeRef, TypeRef)>,
) {
    if concrete.is_star_projection || parameterized.is_star_projection {
        return;
    }
    if !visited.insert((concrete.clone(), parameterized.clone())) {
        return;
    }

    if parameterized.classifier.is_type_parameter() {
        let mut bound = concrete.clone();
        if parameterized.is_marked_nullable {
            bound.is_marked_nullable = false;
        }
        if parameterized.qualifier.is_some() && parameterized.qualifier == concrete.qualifier {
            bound.qualifier = None;
        }
        bound.variance = Default::default();
        map.entry(parameterized.classifier.clone())
            .or_insert_with(|| bound.clone());

        for upper in parameterized.classifier.super_types().iter() {
            if !upper.contains_type_parameter() {
                continue;
            }
            if upper.classifier.is_type_parameter() {
                collect(&bound, upper, map, visited);
            } else if let Some(view) = bound.subtype_view(&upper.classifier) {
                collect_arguments(&view, upper, map, visited);
            }
        }
        return;
    }

    if concrete.classifier == parameterized.classifier {
        collect_arguments(concrete, parameterized, map, visited);
        return;
    }

    // Candidate `ArrayList<T>` for a requested `List<String>`
    if let Some(view) = parameterized.subtype_view(&concrete.classifier) {
        collect_arguments(concrete, &view, map, visited);
        return;
    }
    if let Some(view) = concrete.subtype_view(&parameterized.classifier) {
        collect_arguments(&view, parameterized, map, visited);
    }
}

fn collect_arguments(
    concrete: &TypeRef,
    parameterized: &TypeRef,
    map: &mut SubstitutionMap,
    visited: &mut AHashSet<(TypeRef, TypeRef)>,
) {
    for (c, p) in concrete.arguments.iter().zip(parameterized.arguments.iter()) {
        collect(c, p, map, visited);
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{ClassifierRef, QualifierTag};
    use super::*;

    #[test]
    fn substitute_keeps_unmapped_parameters() {
        let t = ClassifierRef::type_parameter("T");
        let u = ClassifierRef::type_parameter("U");
        let mut map = SubstitutionMap::new();
        map.insert(t.clone(), class("Foo"));

        assert_eq!(TypeRef::of(&u).substitute(&map), TypeRef::of(&u));
        assert_eq!(TypeRef::of(&t).substitute(&map), class("Foo"));
    }

    #[test]
    fn substitute_prefers_usage_qualifier() {
        let t = ClassifierRef::type_parameter("T");
        let tag = QualifierTag::new("Named");
        let mut map = SubstitutionMap::new();
        map.insert(t.clone(), class("Foo"));

        let usage = TypeRef::of(&t).with_qualifier(tag.clone());
        assert_eq!(usage.substitute(&map).qualifier, Some(tag));
    }

    #[test]
    fn substitute_is_idempotent() {
        let list = generic("List", &["E"]);
        let e = list.type_parameters()[0].clone();
        let mut map = SubstitutionMap::new();
        map.insert(e.clone(), class("Foo"));

        let ty = TypeRef::with_arguments(&list, vec![TypeRef::of(&e)]);
        let once = ty.substitute(&map);
        assert_eq!(once.substitute(&map), once);
    }

    #[test]
    fn map_through_subtype_view() {
        let list = generic("List", &["E"]);
        let t = ClassifierRef::type_parameter("ArrayList.T");
        let array_list = ClassifierRef::builder("ArrayList")
            .type_parameters(vec![t.clone()])
            .super_types(vec![TypeRef::with_arguments(&list, vec![TypeRef::of(&t)])])
            .build();

        let requested = TypeRef::with_arguments(&list, vec![class("String")]);
        let candidate = TypeRef::with_arguments(&array_list, vec![TypeRef::of(&t)]);
        let map = substitution_map(&requested, &candidate);
        assert_eq!(map.get(&t), Some(&class("String")));
    }

    #[test]
    fn nullable_parameter_binds_non_null_argument() {
        let t = ClassifierRef::type_parameter("T");
        let map = substitution_map(&class("Foo").nullable(), &TypeRef::of(&t).nullable());
        assert_eq!(map.get(&t), Some(&class("Foo")));
    }

    #[test]
    fn first_binding_wins() {
        let pair = generic("Pair", &["A", "B"]);
        let t = ClassifierRef::type_parameter("T");
        let parameterized = TypeRef::with_arguments(&pair, vec![TypeRef::of(&t), TypeRef::of(&t)]);
        let concrete = TypeRef::with_arguments(&pair, vec![class("Foo"), class("Bar")]);
        let map = substitution_map(&concrete, &parameterized);
        assert_eq!(map.get(&t), Some(&class("Foo")));
    }

    #[test]
    fn upper_bounds_bind_nested_parameters() {
        let list = generic("List", &["E"]);
        let e = ClassifierRef::type_parameter("fn.E");
        let t = ClassifierRef::builder("fn.T")
            .type_parameter()
            .super_types(vec![TypeRef::with_arguments(&list, vec![TypeRef::of(&e)])])
            .build();

        let concrete = TypeRef::with_arguments(&list, vec![class("Foo")]);
        let map = substitution_map(&concrete, &TypeRef::of(&t));
        assert_eq!(map.get(&t), Some(&concrete));
        assert_eq!(map.get(&e), Some(&class("Foo")));
    }
}
