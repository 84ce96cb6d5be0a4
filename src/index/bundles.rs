//! Module-bundle flattening.

use tracing::{debug, warn};

use super::IndexError;
use crate::callable::{Callable, CandidateKind};
use crate::key::{CallableId, InstantiationKey};
use crate::result::DeclarationErrorKind;
use crate::session::{AnalysisSession, CallableList};
use crate::types::TypeRef;

/// Every callable a bundle contributes, nested bundles included.
///
/// Memoized per instantiation in the session. An instantiation already on
/// the current expansion path is skipped, which keeps cyclic includes
/// finite; expansions that skipped something are not memoized since their
/// content depends on where the walk started.
pub(crate) fn flatten(
    session: &AnalysisSession,
    bundle: &Callable,
    limit: usize,
) -> Result<CallableList, IndexError> {
    let key = InstantiationKey::of(&bundle.provided_type);
    if let Some(cached) = session.cached_expansion(&key) {
        return Ok(cached);
    }

    let mut walk = Flattening {
        session,
        limit,
        path: Vec::new(),
        instantiations: 0,
    };
    let (members, _) = walk.expand(&bundle.provided_type, &bundle.id)?;
    Ok(members.into())
}

struct Flattening<'a> {
    session: &'a AnalysisSession,
    limit: usize,
    path: Vec<InstantiationKey>,
    instantiations: usize,
}

impl Flattening<'_> {
    /// Returns the members and whether the expansion is complete
    fn expand(
        &mut self,
        bundle: &TypeRef,
        declaration: &CallableId,
    ) -> Result<(Vec<std::sync::Arc<Callable>>, bool), IndexError> {
        if bundle.contains_type_parameter() {
            debug!(bundle = %bundle, "bundle type not fully known; not expanded");
            return Ok((Vec::new(), false));
        }

        let key = InstantiationKey::of(bundle);
        if let Some(cached) = self.session.cached_expansion(&key) {
            return Ok((cached.to_vec(), true));
        }
        if self.path.contains(&key) {
            warn!(bundle = %key, "bundle includes itself; skipping nested include");
            return Ok((Vec::new(), false));
        }

        self.instantiations += 1;
        if self.instantiations > self.limit {
            return Err(IndexError::Declaration {
                declaration: Some(declaration.clone()),
                kind: DeclarationErrorKind::ExpansionLimitExceeded,
            });
        }

        self.path.push(key.clone());
        let direct = self.session.bundle_members(bundle)?;
        let mut members = Vec::with_capacity(direct.len());
        let mut complete = true;
        for member in direct.iter() {
            members.push(member.clone());
            if member.candidate_kind == CandidateKind::ModuleBundle {
                let (nested, nested_complete) = self.expand(&member.provided_type, &member.id)?;
                complete &= nested_complete;
                members.extend(nested);
            }
        }
        self.path.pop();

        if complete {
            let stored = self.session.store_expansion(key, members.clone().into());
            return Ok((stored.to_vec(), true));
        }
        Ok((members, false))
    }
}
