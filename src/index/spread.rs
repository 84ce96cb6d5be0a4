//! Spread-provider instantiation over the resolution frontier.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use ahash::AHashSet;
use tracing::debug;

use super::IndexError;
use crate::callable::Callable;
use crate::key::CallableId;
use crate::result::DeclarationErrorKind;
use crate::types::{ClassifierRef, SubstitutionMap, TypeRef, Variance};

/// A callable with one spread type parameter, waiting for frontier types.
#[derive(Clone)]
pub(crate) struct SpreadTemplate {
    pub callable: Arc<Callable>,
    pub parameter: ClassifierRef,
    /// Link position counted from the root of the chain
    pub link: usize,
    pub via_bundle: bool,
}

/// A template bound to one frontier type.
pub(crate) struct SpreadInstance {
    pub callable: Arc<Callable>,
    pub link: usize,
    pub via_bundle: bool,
}

/// Types known to the current resolution, and every spread template
/// instantiated against them so far.
///
/// Registration is a worklist: an instance's provided type joins the
/// frontier and may instantiate further templates. `limit` caps the total
/// number of instances.
#[derive(Clone)]
pub(crate) struct SpreadFrontier {
    templates: Vec<SpreadTemplate>,
    known: BTreeSet<TypeRef>,
    seen: AHashSet<(CallableId, TypeRef)>,
    instances: usize,
    limit: usize,
}

impl SpreadFrontier {
    pub fn new(limit: usize) -> Self {
        Self {
            templates: Vec::new(),
            known: BTreeSet::new(),
            seen: AHashSet::new(),
            instances: 0,
            limit,
        }
    }

    pub fn known_types(&self) -> &BTreeSet<TypeRef> {
        &self.known
    }

    /// Adds a template and instantiates it against every known type
    pub fn add_template(&mut self, template: SpreadTemplate) -> Result<Vec<SpreadInstance>, IndexError> {
        self.templates.push(template);
        let index = self.templates.len() - 1;

        let known: Vec<TypeRef> = self.known.iter().cloned().collect();
        let mut produced = Vec::new();
        for ty in known {
            if let Some(instance) = self.instantiate(index, &ty)? {
                produced.push(instance);
            }
        }

        let mut out = Vec::new();
        for instance in produced {
            let provided = instance.callable.provided_type.clone();
            out.push(instance);
            out.extend(self.register(&provided)?);
        }
        Ok(out)
    }

    /// Adds `ty` to the frontier, returning every instance this produced
    pub fn register(&mut self, ty: &TypeRef) -> Result<Vec<SpreadInstance>, IndexError> {
        if ty.contains_type_parameter() || ty.is_star_projection {
            return Ok(Vec::new());
        }

        let mut queue = VecDeque::new();
        queue.push_back(ty.clone().with_variance(Variance::Invariant));
        let mut out = Vec::new();

        while let Some(next) = queue.pop_front() {
            if !self.known.insert(next.clone()) {
                continue;
            }
            for index in 0..self.templates.len() {
                if let Some(instance) = self.instantiate(index, &next)? {
                    let provided = instance.callable.provided_type.clone();
                    if !provided.contains_type_parameter() {
                        queue.push_back(provided.with_variance(Variance::Invariant));
                    }
                    out.push(instance);
                }
            }
        }
        Ok(out)
    }

    fn instantiate(&mut self, index: usize, ty: &TypeRef) -> Result<Option<SpreadInstance>, IndexError> {
        let template = &self.templates[index];
        if !TypeRef::of(&template.parameter).is_assignable_to(ty) {
            return Ok(None);
        }
        if !self.seen.insert((template.callable.id.clone(), ty.clone())) {
            return Ok(None);
        }

        self.instances += 1;
        if self.instances > self.limit {
            return Err(IndexError::Declaration {
                declaration: Some(template.callable.id.clone()),
                kind: DeclarationErrorKind::ExpansionLimitExceeded,
            });
        }

        let mut map = SubstitutionMap::new();
        map.insert(template.parameter.clone(), ty.clone());
        let mut instance = template.callable.substitute(&map);
        instance.spread_origin = Some(template.callable.id.clone());
        debug!(spread = %template.callable.id, against = %ty, "instantiated spread provider");

        Ok(Some(SpreadInstance {
            callable: Arc::new(instance),
            link: template.link,
            via_bundle: template.via_bundle,
        }))
    }
}
