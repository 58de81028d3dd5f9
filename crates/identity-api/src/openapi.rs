//! OpenAPI 문서화 설정.
//!
//! utoipa를 사용하여 REST API의 OpenAPI 3.0 스펙을 생성합니다.
//! Swagger UI는 `/swagger-ui` 경로에서 사용 가능합니다.
//!
//! # 자동 생성 구조
//!
//! 각 라우트 모듈은 자체 스키마를 정의하고, 중앙 `ApiDoc`에서 자동으로 집계합니다.
//! 새로운 엔드포인트를 추가할 때:
//!
//! 1. 응답/요청 타입에 `#[derive(ToSchema)]` 추가
//! 2. 핸들러에 `#[utoipa::path(...)]` 어노테이션 추가
//! 3. 이 파일의 `components(schemas(...))` 및 `paths(...)` 섹션에 추가
//!
//! 인증이 필요한 핸들러는 `security(("bearer_auth" = []))`를 선언하면
//! Swagger UI의 Authorize 버튼으로 토큰을 넣어 호출할 수 있습니다.

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

// ==================== 각 모듈에서 스키마 Import ====================

use crate::auth::TokenPair;
use crate::error::ApiErrorResponse;
use crate::routes::{
    // Health 모듈
    ComponentHealth,
    ComponentStatus,
    // Users 모듈
    DeleteUserResponse,
    HealthResponse,
    // Auth 모듈
    LoginRequest,
    RefreshRequest,
    RefreshResponse,
    RegisterRequest,
    UpdateActiveRequest,
    UpdateRoleRequest,
    UserListResponse,
    UserResponse,
};

// ==================== OpenAPI 문서 정의 ====================

/// Identity API 문서.
///
/// 모든 엔드포인트와 스키마를 포함하는 OpenAPI 3.0 스펙입니다.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Identity Service API",
        version = "0.1.0",
        description = r#"
# 사용자 인증/관리 REST API

회원 가입, JWT 기반 로그인, 토큰 갱신, 사용자 관리를 제공합니다.

## 주요 기능

- **가입/로그인**: Argon2 해싱 기반 자격 증명 관리
- **토큰**: 액세스/리프레시 이중 토큰, 리프레시 시 역할 재조회
- **내 프로필**: 액세스 토큰으로 본인 정보 조회
- **사용자 관리**: 관리자 전용 목록/역할/활성화/삭제

## 인증

보호된 엔드포인트는 JWT Bearer 토큰 인증이 필요합니다.
`Authorization: Bearer <token>` 헤더를 포함하세요.
리프레시 토큰은 `POST /api/v1/auth/refresh` 본문으로만 제출합니다.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
        contact(
            name = "Identity Team",
            url = "https://github.com/user/identity-service"
        )
    ),
    servers(
        (url = "http://localhost:3000", description = "로컬 개발 서버"),
    ),
    tags(
        (name = "health", description = "헬스 체크 - 서버 상태 확인"),
        (name = "auth", description = "인증 - 가입/로그인/토큰 갱신/내 프로필"),
        (name = "users", description = "사용자 관리 - 관리자 전용 CRUD")
    ),
    modifiers(&SecurityAddon),
    // ==================== 스키마 등록 ====================
    components(
        schemas(
            // ===== Health =====
            HealthResponse,
            ComponentHealth,
            ComponentStatus,

            // ===== Common =====
            ApiErrorResponse,

            // ===== Auth =====
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            RefreshResponse,
            TokenPair,
            UserResponse,

            // ===== Users =====
            UserListResponse,
            UpdateRoleRequest,
            UpdateActiveRequest,
            DeleteUserResponse,
        )
    ),
    // ==================== 경로 등록 ====================
    paths(
        // ===== Health =====
        crate::routes::health::health_check,
        crate::routes::health::health_ready,

        // ===== Auth =====
        crate::routes::auth::register,
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::me,

        // ===== Users =====
        crate::routes::users::list_users,
        crate::routes::users::get_user,
        crate::routes::users::update_user_role,
        crate::routes::users::update_user_active,
        crate::routes::users::delete_user,
    )
)]
pub struct ApiDoc;

/// Bearer 인증 스키마 등록.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

// ==================== Swagger UI 라우터 ====================

/// Swagger UI 라우터 생성.
///
/// 다음 경로에 문서 UI를 마운트합니다:
/// - `/swagger-ui` - Swagger UI 대화형 문서
/// - `/api-docs/openapi.json` - OpenAPI JSON 스펙
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

// ==================== 테스트 ====================
