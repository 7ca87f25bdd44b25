//! Resolving resource references to existing resources

use crate::error::{CloudError, Result};
use crate::model::ResourceRef;
use crate::provider::ResourceLookup;

/// Find the resource a reference points at.
///
/// An explicit ID wins; otherwise the name is looked up. Absence is
/// `Ok(None)` so callers can decide between create and no-op.
pub async fn locate<L>(lookup: &L, reference: &ResourceRef) -> Result<Option<L::Resource>>
where
    L: ResourceLookup + ?Sized,
{
    reference.require()?;

    if let Some(id) = reference.id {
        tracing::debug!("Looking up {} by id {}", lookup.kind(), id);
        return lookup.get_by_id(id).await;
    }

    match &reference.name {
        Some(name) => {
            tracing::debug!("Looking up {} by name {}", lookup.kind(), name);
            lookup.get_by_name(name).await
        }
        None => Ok(None),
    }
}

/// Resolve a token that may be either a name or a numeric ID.
///
/// The name is tried first. A token that is not a valid ID fails without
/// a second remote call.
pub async fn resolve<L>(lookup: &L, token: &str) -> Result<L::Resource>
where
    L: ResourceLookup + ?Sized,
{
    if let Some(resource) = lookup.get_by_name(token).await? {
        return Ok(resource);
    }

    let not_found = || CloudError::NotFound {
        kind: lookup.kind().to_string(),
        token: token.to_string(),
    };

    let id: u64 = token.parse().map_err(|_| not_found())?;
    lookup.get_by_id(id).await?.ok_or_else(not_found)
}
