//! Shared application state.

use std::sync::Arc;

use mercado_core::{ChangeEvent, ChangeKind, Collection};
use mercado_db::Database;

use crate::auth::JwtManager;
use crate::config::ServerConfig;
use crate::feed::Feed;

/// Cloned into every handler; all fields are cheap handles.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<ServerConfig>,
    pub jwt: Arc<JwtManager>,
    pub feed: Feed,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs);
        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            feed: Feed::new(),
        }
    }

    /// Announces a change on the feed.
    pub fn publish(&self, collection: Collection, id: impl Into<String>, kind: ChangeKind) {
        self.feed.publish(ChangeEvent::new(collection, id, kind));
    }

    pub fn allow_negative_stock(&self) -> bool {
        self.config.inventory.allow_negative_stock
    }
}
