//! 사용자 인증/관리 REST API 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - Axum 기반 REST API
//! - Argon2 비밀번호 해싱
//! - 액세스/리프레시 이중 JWT 발급 및 검증
//! - 역할 기반 접근 제어 (admin/student)
//! - 헬스 체크 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`auth`]: 비밀번호 해싱, JWT 발급/검증, 인증 미들웨어
//! - [`repository`]: 사용자 저장소 (PostgreSQL)
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어
//! - [`openapi`]: OpenAPI 문서 및 Swagger UI

pub mod auth;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod repository;
pub mod routes;
pub mod state;

pub use auth::{
    hash_password, verify_password, AccessClaims, AdminUser, AuthError, AuthUser, RefreshClaims,
    RoleGuard, TokenClass, TokenError, TokenIssuer, TokenPair,
};
pub use error::{ApiErrorResponse, ApiResult};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use openapi::{swagger_ui_router, ApiDoc};
pub use repository::{NewUser, UserRecord, UserRepository};
pub use routes::{auth_router, create_api_router, health_router, users_router};
pub use state::AppState;

#[cfg(any(test, feature = "test-utils"))]
pub use state::create_test_state;
