//! Global stores for application state.

pub mod factory;

use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tokio::sync::watch;

pub use factory::{FactoryStore, FactoryStoreOptions, PollConfig};

use crate::api_client::{ApiClient, HttpWorkspaceSource};
use crate::config::sync_config;
use crate::store::lock;
use crate::transport::default_transport;
use crate::visibility::Visibility;

/// Page visibility as last reported by the host.
static PAGE_VISIBILITY: Lazy<watch::Sender<Visibility>> =
    Lazy::new(|| watch::channel(Visibility::Visible).0);

static DEFAULT_FACTORY_STORE: Lazy<Mutex<Option<FactoryStore>>> = Lazy::new(|| Mutex::new(None));

/// Report a visibility change to the default workspace store.
pub fn set_page_visibility(visibility: Visibility) {
    PAGE_VISIBILITY.send_replace(visibility);
}

pub fn page_visibility() -> Visibility {
    *PAGE_VISIBILITY.borrow()
}

/// Process-wide workspace list store, built on first use.
pub fn default_factory_store() -> FactoryStore {
    lock(&DEFAULT_FACTORY_STORE)
        .get_or_insert_with(|| {
            let config = sync_config();
            let api = ApiClient::new().with_base_url(config.base_url.clone());
            FactoryStore::new(
                Arc::new(HttpWorkspaceSource::new(api)),
                default_transport(),
                PAGE_VISIBILITY.subscribe(),
                FactoryStoreOptions {
                    poll: config.poll,
                    signal_url: Some(config.signal_url()),
                },
            )
        })
        .clone()
}

/// Destroy the default workspace store. The next call to
/// [`default_factory_store`] builds a fresh one.
pub fn reset_default_factory_store() {
    let store = lock(&DEFAULT_FACTORY_STORE).take();
    if let Some(store) = store {
        store.destroy();
    }
}
