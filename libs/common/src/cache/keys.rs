//! Cache key grammar for test payloads.
//!
//! Listing keys embed the owner so that every page of an owner's listing can
//! be dropped with one pattern delete when any of their tests changes.

use std::fmt::Display;

/// Key of one page of an owner's test listing.
///
/// `tests:user:{ownerID}:limit:{L}:offset:{O}`
#[must_use]
pub fn test_listing(owner_id: impl Display, limit: i64, offset: i64) -> String {
    format!("tests:user:{}:limit:{}:offset:{}", owner_id, limit, offset)
}

/// Pattern matching every listing page of one owner.
#[must_use]
pub fn owner_listing_pattern(owner_id: impl Display) -> String {
    format!("tests:user:{}:*", owner_id)
}

/// Key of a single test.
///
/// `test:{testID}`
#[must_use]
pub fn single_test(test_id: impl Display) -> String {
    format!("test:{}", test_id)
}

/// Key of a user's public profile.
///
/// `user:login:{login}`
#[must_use]
pub fn user_profile(login: &str) -> String {
    format!("user:login:{}", login)
}
