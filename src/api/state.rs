//! Shared application state

use std::sync::Arc;

use crate::cache::{EventsClient, QueryCache};
use crate::config::Config;
use crate::handlers::AccountHandler;
use crate::identity::IdentityProvider;
use crate::projection::ProjectionService;
use crate::session::{SessionContext, SessionMirror};
use crate::store::DocumentStore;

/// Everything a request handler needs, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub cache: Arc<QueryCache>,
    pub events: EventsClient,
    pub accounts: AccountHandler,
    pub projection: ProjectionService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let cache = Arc::new(QueryCache::new());
        Self {
            events: EventsClient::new(store.clone(), cache.clone(), config.query_cache_ttl),
            accounts: AccountHandler::new(store.clone(), identity.clone()),
            projection: ProjectionService::new(store.clone()),
            config: Arc::new(config),
            store,
            identity,
            cache,
        }
    }

    /// A fresh session context writing through `mirror`
    pub fn session(&self, mirror: Arc<dyn SessionMirror>) -> SessionContext {
        SessionContext::new(
            self.identity.clone(),
            self.store.clone(),
            self.cache.clone(),
            mirror,
        )
        .with_identity_ttl(self.config.identity_cache_ttl)
    }
}
