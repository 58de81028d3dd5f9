//! 사용자 관리 라우트.
//!
//! 관리자 전용 엔드포인트입니다. 모든 핸들러가 [`AdminUser`] 추출기를
//! 거치므로 admin 역할이 아닌 토큰은 핸들러 본문에 도달하지 못합니다.
//!
//! # 엔드포인트
//!
//! - `GET    /api/v1/users` - 사용자 목록 (검색 + 페이지네이션)
//! - `GET    /api/v1/users/{id}` - 사용자 단건 조회
//! - `PUT    /api/v1/users/{id}/role` - 역할 변경
//! - `PUT    /api/v1/users/{id}/active` - 활성 상태 변경
//! - `DELETE /api/v1/users/{id}` - 사용자 삭제

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use identity_core::UserRole;

use crate::auth::AdminUser;
use crate::error::{ApiErrorResponse, ApiResult};
use crate::repository::UserRepository;
use crate::routes::auth::UserResponse;
use crate::state::AppState;

// ==================== Request/Response 타입 ====================

/// 사용자 목록 조회 쿼리
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct UserListQuery {
    /// 페이지 번호 (1부터 시작)
    #[serde(default = "default_page")]
    pub page: i64,
    /// 페이지 크기 (1 ~ 100)
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    /// 이메일 또는 표시 이름 부분 일치 검색어
    #[serde(default)]
    pub search: Option<String>,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    20
}

/// 사용자 목록 응답
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// 역할 변경 요청
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// 새 역할 ("admin" | "mentor" | "student")
    pub role: String,
}

/// 활성 상태 변경 요청
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateActiveRequest {
    pub is_active: bool,
}

/// 사용자 삭제 응답
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteUserResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub message: String,
}

// ==================== 헬퍼 함수 ====================

fn parse_user_id(id: &str) -> Result<Uuid, (StatusCode, Json<ApiErrorResponse>)> {
    Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new(
                "INVALID_USER_ID",
                "사용자 ID는 UUID 형식이어야 합니다",
            )),
        )
    })
}

fn user_not_found() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiErrorResponse::new(
            "USER_NOT_FOUND",
            "사용자를 찾을 수 없습니다",
        )),
    )
}

fn db_not_configured() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new(
            "DB_NOT_CONFIGURED",
            "데이터베이스가 설정되지 않았습니다",
        )),
    )
}

fn database_error() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiErrorResponse::new(
            "DATABASE_ERROR",
            "데이터베이스 작업에 실패했습니다",
        )),
    )
}

/// 페이지 번호와 페이지 크기를 허용 범위로 자르고 OFFSET을 계산합니다.
///
/// 쿼리스트링에서 온 i64 값이라 포화 연산으로 계산한다.
/// page가 i64::MAX여도 OFFSET은 음수로 뒤집히지 않는다.
fn pagination_window(page: i64, per_page: i64) -> (i64, i64, i64) {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = page.saturating_sub(1).saturating_mul(per_page);
    (page, per_page, offset)
}

// ==================== 핸들러 ====================

/// 사용자 목록 조회
///
/// GET /api/v1/users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "목록 조회 성공", body = UserListResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    let (page, per_page, offset) = pagination_window(query.page, query.per_page);
    let search = query.search.as_deref();

    let users = UserRepository::list(pool, search, per_page, offset)
        .await
        .map_err(|e| {
            error!("사용자 목록 조회 실패: {}", e);
            database_error()
        })?;

    let total = UserRepository::count(pool, search).await.map_err(|e| {
        error!("사용자 수 조회 실패: {}", e);
        database_error()
    })?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    }))
}

/// 사용자 단건 조회
///
/// GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "사용자 UUID")),
    responses(
        (status = 200, description = "조회 성공", body = UserResponse),
        (status = 400, description = "UUID 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    match UserRepository::find_by_id(pool, user_id).await {
        Ok(Some(record)) => Ok(Json(record.into())),
        Ok(None) => Err(user_not_found()),
        Err(e) => {
            error!("사용자 조회 실패: {}", e);
            Err(database_error())
        }
    }
}

/// 역할 변경
///
/// PUT /api/v1/users/{id}/role
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/role",
    params(("id" = String, Path, description = "사용자 UUID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "변경 성공", body = UserResponse),
        (status = 400, description = "UUID 또는 역할 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;

    let role = UserRole::parse(&request.role).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new(
                "INVALID_ROLE",
                format!("알 수 없는 역할입니다: {}", request.role),
            )),
        )
    })?;

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    match UserRepository::update_role(pool, user_id, role).await {
        Ok(Some(record)) => {
            info!(admin = %claims.sub, user_id = %user_id, role = %role.as_str(), "역할 변경");
            Ok(Json(record.into()))
        }
        Ok(None) => Err(user_not_found()),
        Err(e) => {
            error!("역할 변경 실패: {}", e);
            Err(database_error())
        }
    }
}

/// 활성 상태 변경
///
/// PUT /api/v1/users/{id}/active
#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/active",
    params(("id" = String, Path, description = "사용자 UUID")),
    request_body = UpdateActiveRequest,
    responses(
        (status = 200, description = "변경 성공", body = UserResponse),
        (status = 400, description = "UUID 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_user_active(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateActiveRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user_id = parse_user_id(&id)?;

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    match UserRepository::set_active(pool, user_id, request.is_active).await {
        Ok(Some(record)) => {
            info!(
                admin = %claims.sub,
                user_id = %user_id,
                is_active = request.is_active,
                "활성 상태 변경"
            );
            Ok(Json(record.into()))
        }
        Ok(None) => Err(user_not_found()),
        Err(e) => {
            error!("활성 상태 변경 실패: {}", e);
            Err(database_error())
        }
    }
}

/// 사용자 삭제
///
/// DELETE /api/v1/users/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "사용자 UUID")),
    responses(
        (status = 200, description = "삭제 성공", body = DeleteUserResponse),
        (status = 400, description = "UUID 형식 오류", body = ApiErrorResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 403, description = "권한 없음", body = ApiErrorResponse),
        (status = 404, description = "사용자 없음", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteUserResponse>> {
    let user_id = parse_user_id(&id)?;

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    match UserRepository::delete(pool, user_id).await {
        Ok(true) => {
            info!(admin = %claims.sub, user_id = %user_id, "사용자 삭제");
            Ok(Json(DeleteUserResponse {
                success: true,
                user_id,
                message: "사용자가 삭제되었습니다".to_string(),
            }))
        }
        Ok(false) => Err(user_not_found()),
        Err(e) => {
            error!("사용자 삭제 실패: {}", e);
            Err(database_error())
        }
    }
}

// ==================== 라우터 ====================

/// 사용자 관리 라우터 생성.
pub fn users_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).delete(delete_user))
        .route("/{id}/role", put(update_user_role))
        .route("/{id}/active", put(update_user_active))
}
