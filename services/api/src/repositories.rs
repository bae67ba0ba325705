//! Repositories for test persistence
//!
//! Reads and writes are split into two capability traits so that a component
//! asks only for what it uses: the visibility cache needs both, the scoring
//! engine reads the canonical test and writes the pass counter.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::Test;


pub use self::test::PgTestRepository;

/// Read access to tests
#[async_trait]
pub trait TestReader: Send + Sync {
    /// One page of an owner's tests, newest first, with the owner's total count
    async fn get_all_tests(
        &self,
        owner_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> DatabaseResult<(Vec<Test>, i64)>;

    /// A test with its questions; an unknown ID is `DatabaseError::NotFound`
    async fn get_test_by_id(&self, id: Uuid) -> DatabaseResult<Test>;
}

/// Write access to tests
#[async_trait]
pub trait TestWriter: Send + Sync {
    /// Persist a new test with its questions and variants
    async fn create_test(&self, test: &Test) -> DatabaseResult<()>;

    async fn delete_test(&self, id: Uuid) -> DatabaseResult<()>;

    async fn change_active_status(&self, id: Uuid, is_active: bool) -> DatabaseResult<()>;

    /// Overwrite the pass counter with `new_count`
    async fn increment_pass_count(&self, id: Uuid, new_count: i64) -> DatabaseResult<()>;
}
