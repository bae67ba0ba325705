//! API models for request and response payloads

use serde::{Deserialize, Serialize};

pub mod user;

pub use self::test::{
    Question, Role, SubmittedQuestion, SubmittedTest, SubmittedVariant, Test, TestPage, TestView,
    Variant,
};
pub use self::user::{UpdateProfileRequest, UserProfile};

/// Default page size of test listings
pub const DEFAULT_PAGE_LIMIT: i64 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Query parameters for test listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTestsQuery {
    /// Number of tests per page
    pub limit: Option<i64>,
    /// Number of tests to skip
    pub offset: Option<i64>,
}

impl ListTestsQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Response for test listing with pagination
#[derive(Debug, Clone, Serialize)]
pub struct TestListResponse {
    pub items: Vec<Test>,
    pub count: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request for test creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTestRequest {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<NewQuestion>,
}

/// Question of a test being created; its ID is assigned on creation
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl CreateTestRequest {
    /// Check the payload is worth persisting
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Test name is required".to_string());
        }
        if self.questions.iter().any(|q| q.name.trim().is_empty()) {
            return Err("Question name is required".to_string());
        }
        if self
            .questions
            .iter()
            .flat_map(|q| q.variants.iter())
            .any(|v| v.name.trim().is_empty())
        {
            return Err("Variant name is required".to_string());
        }
        Ok(())
    }
}

/// Request for switching a test on or off
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeActiveStatusRequest {
    pub is_active: bool,
}

/// Score of a submission; `percentage` is null when nothing could be matched
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResultResponse {
    pub percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_query_defaults_and_clamps() {
        let query = ListTestsQuery::default();
        assert_eq!(query.limit(), 10);
        assert_eq!(query.offset(), 0);

        let query = ListTestsQuery {
            limit: Some(1000),
            offset: Some(-5),
        };
        assert_eq!(query.limit(), 100);
        assert_eq!(query.offset(), 0);

        let query = ListTestsQuery {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(query.limit(), 1);
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_create_request_requires_names() {
        let request: CreateTestRequest = serde_json::from_value(serde_json::json!({
            "name": "Quiz",
            "questions": [{ "name": "Q1", "variants": [{ "name": "", "is_correct": true }] }]
        }))
        .unwrap();
        assert!(request.validate().is_err());

        let request: CreateTestRequest =
            serde_json::from_value(serde_json::json!({ "name": "  " })).unwrap();
        assert!(request.validate().is_err());

        let request: CreateTestRequest = serde_json::from_value(serde_json::json!({
            "name": "Quiz",
            "questions": [{ "name": "Q1", "variants": [{ "name": "A", "is_correct": true }] }]
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }
}
