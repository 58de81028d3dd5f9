//! API 라우트.
//!
//! 모든 REST API 엔드포인트를 정의하고 라우터를 구성합니다.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/auth` - 가입, 로그인, 토큰 갱신, 내 프로필
//! - `/api/v1/users` - 사용자 관리 (관리자 전용)

pub mod auth;
pub mod health;
pub mod users;

pub use auth::{
    auth_router, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, UserResponse,
};
pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use users::{
    users_router, DeleteUserResponse, UpdateActiveRequest, UpdateRoleRequest, UserListQuery,
    UserListResponse,
};

use axum::Router;

use crate::state::AppState;

/// 전체 API 라우터 생성.
///
/// 모든 서브 라우터를 조합하여 하나의 라우터로 반환합니다.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        // 헬스 체크 엔드포인트
        .nest("/health", health_router())
        // API v1 엔드포인트
        .nest("/api/v1/auth", auth_router())
        .nest("/api/v1/users", users_router())
}
