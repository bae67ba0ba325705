//! Cache-aside visibility layer for tests
//!
//! [`TestVisibilityCache`] serves test reads from the cache store when it
//! can, falls back to the repository on a miss, and enforces who may see an
//! inactive test. It also owns invalidation: every write path drops the
//! single-test key and the owner's listing keys it could have affected.
//!
//! Cache entries may lag the repository by at most the configured TTL. In
//! particular a `test:{id}` entry populated while the test was active keeps
//! serving non-owners until it expires or a write path invalidates it. The
//! visibility rule itself is applied to every hit, so an entry cached as
//! inactive (by its owner) never reaches anyone else.

use chrono::Utc;
use common::cache::{CacheStore, keys};
use common::users::{User, UserReader};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{CreateTestRequest, Question, Role, Test, TestPage};
use crate::repositories::{TestReader, TestWriter};

/// Cache-aside wrapper around the test repository
#[derive(Clone)]
pub struct TestVisibilityCache {
    tests: Arc<dyn TestReader>,
    writer: Arc<dyn TestWriter>,
    users: Arc<dyn UserReader>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl TestVisibilityCache {
    pub fn new(
        tests: Arc<dyn TestReader>,
        writer: Arc<dyn TestWriter>,
        users: Arc<dyn UserReader>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self {
            tests,
            writer,
            users,
            cache,
            ttl,
        }
    }

    /// Resolve a login to its user; an unknown login is `NotFound`
    pub async fn resolve_requester(&self, login: &str) -> ApiResult<User> {
        Ok(self.users.get_user_by_login(login).await?)
    }

    /// One page of an owner's tests
    pub async fn get_all(&self, owner_id: Uuid, limit: i64, offset: i64) -> ApiResult<TestPage> {
        let key = keys::test_listing(owner_id, limit, offset);
        if let Some(page) = self.read_cached::<TestPage>(&key).await {
            return Ok(page);
        }

        let (tests, count) = self.tests.get_all_tests(owner_id, offset, limit).await?;
        let page = TestPage { tests, count };
        self.write_cached(&key, &page).await;
        Ok(page)
    }

    /// A single test and the requester's role on it
    ///
    /// An inactive test is only handed to its owner; non-owners get
    /// `PrivateAccessDenied`. The check uses the `is_active` flag of whatever
    /// copy was found, cached or fresh. Denied reads cache nothing.
    pub async fn get_by_id(&self, test_id: Uuid, requester_login: &str) -> ApiResult<(Test, Role)> {
        let requester = self.resolve_requester(requester_login).await?;

        let key = keys::single_test(test_id);
        if let Some(test) = self.read_cached::<Test>(&key).await {
            let role = Self::visible_role(&test, requester.id, requester_login)?;
            return Ok((test, role));
        }

        let test = self.tests.get_test_by_id(test_id).await?;
        let role = Self::visible_role(&test, requester.id, requester_login)?;

        self.write_cached(&key, &test).await;
        Ok((test, role))
    }

    fn visible_role(test: &Test, requester_id: Uuid, requester_login: &str) -> ApiResult<Role> {
        let role = Role::of(requester_id, test);
        if !test.is_active && role != Role::Owner {
            warn!(test_id = %test.id, login = %requester_login, "Inactive test requested by non-owner");
            return Err(ApiError::PrivateAccessDenied);
        }
        Ok(role)
    }

    /// Create a test owned by the requester and drop the owner's listings
    pub async fn create(&self, requester_login: &str, request: CreateTestRequest) -> ApiResult<Test> {
        let owner = self.resolve_requester(requester_login).await?;

        let test = Test {
            id: Uuid::new_v4(),
            owner_id: owner.id,
            name: request.name,
            is_active: true,
            pass_count: 0,
            questions: request
                .questions
                .into_iter()
                .map(|q| Question {
                    id: Uuid::new_v4(),
                    name: q.name,
                    description: q.description,
                    variants: q.variants,
                })
                .collect(),
            created_at: Utc::now(),
        };

        self.writer.create_test(&test).await?;
        self.invalidate_listings(owner.id).await;

        info!(test_id = %test.id, owner = %requester_login, "Test created");
        Ok(test)
    }

    /// Delete a test; only its owner may
    pub async fn delete(&self, test_id: Uuid, requester_login: &str) -> ApiResult<()> {
        let test = self.authored_test(test_id, requester_login).await?;

        self.invalidate_listings(test.owner_id).await;
        self.invalidate_test(test_id).await;
        self.writer.delete_test(test_id).await?;

        info!(test_id = %test_id, owner = %requester_login, "Test deleted");
        Ok(())
    }

    /// Switch a test on or off; only its owner may
    pub async fn change_active_status(
        &self,
        test_id: Uuid,
        is_active: bool,
        requester_login: &str,
    ) -> ApiResult<()> {
        let test = self.authored_test(test_id, requester_login).await?;

        self.invalidate_test(test_id).await;
        self.invalidate_listings(test.owner_id).await;
        self.writer.change_active_status(test_id, is_active).await?;

        info!(test_id = %test_id, is_active = is_active, "Test status changed");
        Ok(())
    }

    /// Load a test and check the requester wrote it
    async fn authored_test(&self, test_id: Uuid, requester_login: &str) -> ApiResult<Test> {
        let requester = self.resolve_requester(requester_login).await?;
        let test = self.tests.get_test_by_id(test_id).await?;

        if test.owner_id != requester.id {
            warn!(test_id = %test_id, login = %requester_login, "Mutation attempted by non-author");
            return Err(ApiError::NotAuthor);
        }
        Ok(test)
    }

    async fn read_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.cache.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = key, backend = self.cache.backend_name(), error = %e, "Cache read failed, using repository");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Dropping corrupted cache entry");
                self.invalidate_key(key).await;
                None
            }
        }
    }

    async fn write_cached<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if let Err(e) = self.cache.set(key, &raw, self.ttl).await {
            warn!(key = key, backend = self.cache.backend_name(), error = %e, "Cache write failed, skipping");
        }
    }

    async fn invalidate_test(&self, test_id: Uuid) {
        self.invalidate_key(&keys::single_test(test_id)).await;
    }

    async fn invalidate_key(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key = key, error = %e, "Cache delete failed");
        }
    }

    async fn invalidate_listings(&self, owner_id: Uuid) {
        let pattern = keys::owner_listing_pattern(owner_id);
        match self.cache.delete_by_pattern(&pattern).await {
            Ok(deleted) => debug!(pattern = %pattern, deleted = deleted, "Owner listings invalidated"),
            Err(e) => warn!(pattern = %pattern, error = %e, "Cache pattern delete failed"),
        }
    }
}
