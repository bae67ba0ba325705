//! API service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use common::session::CurrentUser;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::session_middleware,
    models::{
        ChangeActiveStatusRequest, CreateTestRequest, ListTestsQuery, Role, SubmitResultResponse,
        SubmittedTest, TestListResponse, TestView, UpdateProfileRequest,
    },
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/tests", get(list_tests).post(create_test))
        .route("/api/tests/:id", get(get_test).delete(delete_test))
        .route("/api/tests/:id/active", put(change_active_status))
        .route("/api/tests/:id/submit", post(submit_test))
        .route("/api/users/me", get(get_own_profile).put(update_own_profile))
        .route("/api/users/:login", get(get_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

/// List the caller's own tests
pub async fn list_tests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<ListTestsQuery>,
) -> ApiResult<impl IntoResponse> {
    let owner = state.tests.resolve_requester(&user.login).await?;
    let (limit, offset) = (query.limit(), query.offset());

    let page = state.tests.get_all(owner.id, limit, offset).await?;

    Ok(Json(TestListResponse {
        items: page.tests,
        count: page.count,
        limit,
        offset,
    }))
}

/// Create a test owned by the caller
pub async fn create_test(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreateTestRequest>,
) -> ApiResult<impl IntoResponse> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let test = state.tests.create(&user.login, payload).await?;

    Ok((StatusCode::CREATED, Json(TestView::new(test, Role::Owner))))
}

/// Get a test by ID, hiding the answer key from non-owners
pub async fn get_test(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (test, role) = state.tests.get_by_id(id, &user.login).await?;

    Ok(Json(TestView::new(test, role)))
}

/// Delete a test
pub async fn delete_test(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.tests.delete(id, &user.login).await?;

    Ok(Json(json!({"message": "Test deleted successfully"})))
}

/// Switch a test on or off
pub async fn change_active_status(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChangeActiveStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .tests
        .change_active_status(id, payload.is_active, &user.login)
        .await?;

    Ok(Json(json!({
        "id": id,
        "is_active": payload.is_active
    })))
}

/// Score a submission
pub async fn submit_test(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmittedTest>,
) -> ApiResult<impl IntoResponse> {
    let percentage = state.scoring.submit(id, &payload).await?;

    Ok(Json(SubmitResultResponse { percentage }))
}

/// The caller's own profile
pub async fn get_own_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.profiles.find_by_login(&user.login).await?))
}

/// Update the caller's name or avatar
pub async fn update_own_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.profiles.update(&user.login, payload).await?))
}

/// Another user's public profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
    Path(login): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.profiles.find_by_login(&login).await?))
}
