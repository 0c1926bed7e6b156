//! Runtime lookup for stores that may be touched from threads outside tokio.

use tokio::runtime::Handle;

/// The runtime a store spawns its background work on: the one it already
/// uses, otherwise the caller's. `None` when neither exists.
pub(crate) fn resolve(cached: &mut Option<Handle>) -> Option<Handle> {
    if cached.is_none() {
        *cached = Handle::try_current().ok();
    }
    cached.clone()
}
