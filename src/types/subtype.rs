//! Subtyping and candidate assignability.

use super::{TypeRef, Variance, MAX_WALK_DEPTH};

impl TypeRef {
    /// Whether `self` is a subtype of `other`.
    ///
    /// ```rust
    /// use ferrous_inject::{ClassifierRef, TypeRef};
    ///
    /// let any = TypeRef::of(&ClassifierRef::top("Any"));
    /// let service = ClassifierRef::class("app.Service");
    /// let impl_ = ClassifierRef::builder("app.ServiceImpl")
    ///     .super_types(vec![TypeRef::of(&service)])
    ///     .build();
    ///
    /// let impl_ty = TypeRef::of(&impl_);
    /// assert!(impl_ty.is_subtype_of(&TypeRef::of(&service)));
    /// assert!(impl_ty.is_subtype_of(&any));
    /// assert!(impl_ty.is_subtype_of(&impl_ty.clone().nullable()));
    /// assert!(!impl_ty.clone().nullable().is_subtype_of(&impl_ty));
    /// ```
    pub fn is_subtype_of(&self, other: &TypeRef) -> bool {
        subtype(self, other, 0)
    }

    /// Whether a candidate providing `self` can satisfy a request for `other`.
    ///
    /// Unlike [`TypeRef::is_subtype_of`], type parameters on either side are
    /// treated as unification variables constrained by their upper bounds.
    pub fn is_assignable_to(&self, other: &TypeRef) -> bool {
        assignable(self, other, 0)
    }
}

fn nullability_conforms(sub: &TypeRef, sup: &TypeRef) -> bool {
    !sub.is_marked_nullable || sup.is_marked_nullable
}

fn satisfies_bounds(ty: &TypeRef, parameter: &TypeRef, depth: usize) -> bool {
    if parameter.qualifier.is_some() && parameter.qualifier != ty.qualifier {
        return false;
    }
    // `T?` accepts nullable types; bounds are checked against the non-null form
    let ty = if parameter.is_marked_nullable {
        ty.clone().with_nullability(false)
    } else {
        ty.clone()
    };
    parameter
        .classifier
        .super_types()
        .iter()
        .all(|bound| subtype(&ty, bound, depth + 1))
}

fn subtype(sub: &TypeRef, sup: &TypeRef, depth: usize) -> bool {
    if depth > MAX_WALK_DEPTH {
        return false;
    }
    if sub.is_star_projection || sup.is_star_projection {
        return true;
    }
    if sub.classifier == sup.classifier {
        return nullability_conforms(sub, sup)
            && sub.qualifier == sup.qualifier
            && arguments_conform(sub, sup, depth);
    }
    if sup.classifier.is_top() {
        return nullability_conforms(sub, sup)
            && (sup.qualifier.is_none() || sub.qualifier == sup.qualifier);
    }
    if sup.classifier.is_type_parameter() {
        return satisfies_bounds(sub, sup, depth);
    }
    if let Some(expanded) = sub.expanded() {
        return subtype(&expanded, sup, depth + 1);
    }
    if let Some(expanded) = sup.expanded() {
        return subtype(sub, &expanded, depth + 1);
    }
    if sub.classifier.is_type_parameter() {
        return nullability_conforms(sub, sup)
            && sub
                .classifier
                .super_types()
                .iter()
                .any(|bound| subtype(bound, sup, depth + 1));
    }
    match sub.subtype_view(&sup.classifier) {
        Some(mut view) => {
            view.is_marked_nullable = sub.is_marked_nullable;
            view.qualifier = sub.qualifier.clone();
            nullability_conforms(sub, sup)
                && view.qualifier == sup.qualifier
                && arguments_conform(&view, sup, depth)
        }
        None => false,
    }
}

fn arguments_conform(sub: &TypeRef, sup: &TypeRef, depth: usize) -> bool {
    sub.arguments.len() == sup.arguments.len()
        && sub
            .arguments
            .iter()
            .zip(sup.arguments.iter())
            .all(|(a, b)| match b.variance {
                Variance::Out => subtype(a, b, depth + 1),
                Variance::In => subtype(b, a, depth + 1),
                Variance::Invariant => equivalent(a, b, depth + 1),
            })
}

/// Invariant argument position: equal up to type-parameter unification
fn equivalent(a: &TypeRef, b: &TypeRef, depth: usize) -> bool {
    if depth > MAX_WALK_DEPTH {
        return false;
    }
    if a.is_star_projection || b.is_star_projection {
        return true;
    }
    if a.classifier.is_type_parameter() || b.classifier.is_type_parameter() {
        return assignable(a, b, depth);
    }
    if a.classifier != b.classifier {
        let (a, b) = (a.fully_expanded(), b.fully_expanded());
        return a.classifier == b.classifier && equivalent(&a, &b, depth + 1);
    }
    a.is_marked_nullable == b.is_marked_nullable
        && a.qualifier == b.qualifier
        && a.arguments.len() == b.arguments.len()
        && a.arguments
            .iter()
            .zip(b.arguments.iter())
            .all(|(x, y)| match y.variance {
                Variance::Invariant => equivalent(x, y, depth + 1),
                Variance::Out => assignable(x, y, depth + 1),
                Variance::In => assignable(y, x, depth + 1),
            })
}

fn assignable(candidate: &TypeRef, requested: &TypeRef, depth: usize) -> bool {
    if depth > MAX_WALK_DEPTH {
        return false;
    }
    if candidate.is_star_projection || requested.is_star_projection {
        return true;
    }
    if candidate.classifier == requested.classifier {
        return nullability_conforms(candidate, requested)
            && candidate.qualifier == requested.qualifier
            && candidate.arguments.len() == requested.arguments.len()
            && candidate
                .arguments
                .iter()
                .zip(requested.arguments.iter())
                .all(|(a, b)| match b.variance {
                    Variance::Invariant => equivalent(a, b, depth + 1),
                    Variance::Out => assignable(a, b, depth + 1),
                    Variance::In => assignable(b, a, depth + 1),
                });
    }
    if requested.classifier.is_type_parameter() {
        return satisfies_bounds(candidate, requested, depth);
    }
    if candidate.classifier.is_type_parameter() {
        // `T?` can only provide nullable types
        if candidate.is_marked_nullable && !requested.is_marked_nullable {
            return false;
        }
        return satisfies_bounds(requested, candidate, depth);
    }
    subtype(candidate, requested, depth + 1)
}
