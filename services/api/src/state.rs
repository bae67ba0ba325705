//! Application state shared across handlers

use common::cache::CacheStore;
use common::jwt::TokenProvider;
use common::session::SessionRefresher;
use common::users::{UserReader, UserWriter};
use std::sync::Arc;
use std::time::Duration;

use crate::profiles::ProfileCache;
use crate::repositories::{TestReader, TestWriter};
use crate::scoring::ScoringEngine;
use crate::test_cache::TestVisibilityCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub tests: TestVisibilityCache,
    pub scoring: ScoringEngine,
    pub profiles: ProfileCache,
    pub sessions: SessionRefresher,
}

impl AppState {
    /// Wire the components from their collaborators
    pub fn new(
        test_reader: Arc<dyn TestReader>,
        test_writer: Arc<dyn TestWriter>,
        users: Arc<dyn UserReader>,
        user_writer: Arc<dyn UserWriter>,
        cache: Arc<dyn CacheStore>,
        tokens: Arc<dyn TokenProvider>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            tests: TestVisibilityCache::new(
                test_reader.clone(),
                test_writer.clone(),
                users.clone(),
                cache.clone(),
                cache_ttl,
            ),
            scoring: ScoringEngine::new(test_reader, test_writer),
            profiles: ProfileCache::new(users.clone(), user_writer, cache, cache_ttl),
            sessions: SessionRefresher::new(users, tokens),
        }
    }
}
