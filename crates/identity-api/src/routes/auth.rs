//! 인증 라우트.
//!
//! 회원 가입, 자격 증명 로그인, 액세스 토큰 갱신, 내 프로필 조회를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/auth/register` - 회원 가입
//! - `POST /api/v1/auth/login` - 로그인 (액세스 + 리프레시 토큰 발급)
//! - `POST /api/v1/auth/refresh` - 액세스 토큰 재발급
//! - `GET  /api/v1/auth/me` - 내 프로필 조회
//!
//! # 응답 정책
//!
//! 로그인 실패는 원인(없는 이메일, 비밀번호 불일치, 비활성 계정)과
//! 무관하게 동일한 401 응답 하나로 수렴합니다. 응답 차이로 계정 존재
//! 여부를 탐색할 수 없게 하기 위한 것이므로, 분기별 응답을 추가할 때
//! 주의가 필요합니다.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use identity_core::{normalize_email, UserRole};

use crate::auth::{
    hash_password, validate_password_strength, verify_password, AuthError, AuthUser,
    PasswordError, TokenPair,
};
use crate::error::{ApiErrorResponse, ApiResult};
use crate::metrics::{record_login, record_registration, record_token_refresh};
use crate::repository::{NewUser, UserRecord, UserRepository};
use crate::state::AppState;

// ==================== Request/Response 타입 ====================

/// 회원 가입 요청
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// 이메일 (정규화 후 유일해야 함)
    #[validate(email(message = "올바른 이메일 형식이 아닙니다"))]
    pub email: String,
    /// 비밀번호 (8자 이상, 영문과 숫자 포함)
    #[validate(
        length(min = 8, max = 128, message = "비밀번호는 8자 이상 128자 이하여야 합니다"),
        custom(function = password_strength)
    )]
    pub password: String,
    /// 표시 이름 (선택)
    #[validate(length(max = 64, message = "표시 이름은 64자 이하여야 합니다"))]
    #[serde(default)]
    pub display_name: Option<String>,
}

/// 로그인 요청
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 토큰 갱신 요청
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// 토큰 갱신 응답.
///
/// 리프레시 토큰은 회전하지 않으므로 새 액세스 토큰만 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// 사용자 응답.
///
/// 비밀번호 해시를 비롯한 자격 증명 관련 필드는 어떤 경우에도 포함되지
/// 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            display_name: record.display_name,
            role: record.role,
            is_active: record.is_active,
            last_login_at: record.last_login_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

// ==================== 헬퍼 함수 ====================

/// 비밀번호 강도 검증 (validator 커스텀 규칙)
fn password_strength(password: &str) -> Result<(), ValidationError> {
    validate_password_strength(password).map_err(|reason| {
        let mut err = ValidationError::new("password_strength");
        err.message = Some(reason.into());
        err
    })
}

/// 필드별 검증 에러를 하나의 메시지로 합칩니다.
fn validation_message(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        for err in field_errors {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            parts.push(format!("{}: {}", field, message));
        }
    }
    // HashMap 순회 순서가 매번 달라지므로 정렬해서 응답을 고정한다
    parts.sort();
    parts.join("; ")
}

/// 로그인 실패 공통 응답.
///
/// 원인과 무관하게 이 형태 하나만 나가야 합니다.
fn invalid_credentials() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorResponse::new(
            "INVALID_CREDENTIALS",
            "이메일 또는 비밀번호가 올바르지 않습니다",
        )),
    )
}

/// 미등록 이메일 경로에서 검증 대상으로 쓰는 더미 해시.
///
/// hash_password의 기본 파라미터(m=19456, t=2, p=1)와 동일해서
/// 계정 유무에 관계없이 검증 한 번 분량의 시간이 걸립니다.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// 조회된 계정에 대한 로그인 거절 사유.
///
/// 어느 갈래든 바깥 응답은 `invalid_credentials()` 하나로 수렴하고,
/// 사유는 로그와 실패 카운터 분기에만 쓰입니다.
#[derive(Debug)]
enum LoginRejection {
    /// 비밀번호 불일치. 실패 카운터를 올리는 유일한 사유.
    WrongPassword,
    /// 저장된 해시를 검증할 수 없음 (손상된 데이터)
    UnverifiableHash(PasswordError),
    /// 비활성 계정. 카운터는 건드리지 않는다.
    Inactive,
}

/// 비밀번호 검증 결과와 계정 상태를 허용/거절 판정으로 접습니다.
///
/// 비밀번호 불일치가 비활성 여부보다 먼저 판정됩니다.
fn decide_login(
    verified: Result<(), PasswordError>,
    is_active: bool,
) -> Result<(), LoginRejection> {
    match verified {
        Err(PasswordError::VerificationFailed) => Err(LoginRejection::WrongPassword),
        Err(e) => Err(LoginRejection::UnverifiableHash(e)),
        Ok(()) if !is_active => Err(LoginRejection::Inactive),
        Ok(()) => Ok(()),
    }
}

/// 갱신 실패 공통 응답.
fn refresh_unauthorized() -> (StatusCode, Json<ApiErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorResponse::new("UNAUTHORIZED", "인증이 필요합니다")),
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

/// PostgreSQL 유니크 제약 위반 여부 (SQLSTATE 23505)
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

// ==================== 핸들러 ====================

/// 회원 가입
///
/// POST /api/v1/auth/register
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "가입 성공", body = UserResponse),
        (status = 400, description = "입력 검증 실패", body = ApiErrorResponse),
        (status = 409, description = "이미 사용 중인 이메일", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    // 이메일 정규화가 검증과 중복 확인보다 먼저다
    let request = RegisterRequest {
        email: normalize_email(&request.email),
        ..request
    };

    if let Err(errors) = request.validate() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiErrorResponse::new(
                "VALIDATION_ERROR",
                validation_message(&errors),
            )),
        ));
    }

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    // 중복 이메일 사전 확인. 동시 가입은 유니크 인덱스가 막는다.
    match UserRepository::find_by_email(pool, &request.email).await {
        Ok(Some(_)) => {
            return Err((
                StatusCode::CONFLICT,
                Json(ApiErrorResponse::new(
                    "EMAIL_TAKEN",
                    "이미 사용 중인 이메일입니다",
                )),
            ));
        }
        Ok(None) => {}
        Err(e) => {
            error!("사용자 조회 실패: {}", e);
            return Err(database_error());
        }
    }

    // Argon2 해싱은 CPU 바운드라 blocking 풀에서 실행
    let password = request.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            error!("해싱 태스크 join 실패: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "HASHING_ERROR",
                    "비밀번호 처리에 실패했습니다",
                )),
            )
        })?
        .map_err(|e| {
            error!("비밀번호 해싱 실패: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "HASHING_ERROR",
                    "비밀번호 처리에 실패했습니다",
                )),
            )
        })?;

    let input = NewUser {
        email: request.email,
        password_hash,
        display_name: request.display_name,
        role: UserRole::Student,
    };

    let record = match UserRepository::create(pool, input).await {
        Ok(record) => record,
        Err(e) if is_unique_violation(&e) => {
            return Err((
                StatusCode::CONFLICT,
                Json(ApiErrorResponse::new(
                    "EMAIL_TAKEN",
                    "이미 사용 중인 이메일입니다",
                )),
            ));
        }
        Err(e) => {
            error!("사용자 생성 실패: {}", e);
            return Err(database_error());
        }
    };

    info!(user_id = %record.id, "신규 사용자 가입");
    record_registration();

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// 로그인
///
/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "로그인 성공", body = TokenPair),
        (status = 401, description = "자격 증명 불일치", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let email = normalize_email(&request.email);

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    let record = match UserRepository::find_by_email(pool, &email).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            // 계정 유무로 응답 시간이 갈리지 않게 더미 해시로 같은 검증을 수행
            let password = request.password;
            let _ =
                tokio::task::spawn_blocking(move || verify_password(&password, DUMMY_PASSWORD_HASH))
                    .await;
            debug!("로그인 실패: 등록되지 않은 이메일");
            record_login("failure");
            return Err(invalid_credentials());
        }
        Err(e) => {
            error!("사용자 조회 실패: {}", e);
            return Err(database_error());
        }
    };

    // Argon2 검증도 blocking 풀에서 실행
    let password = request.password;
    let stored_hash = record.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| {
            error!("검증 태스크 join 실패: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "HASHING_ERROR",
                    "비밀번호 처리에 실패했습니다",
                )),
            )
        })?;

    if let Err(rejection) = decide_login(verified, record.is_active) {
        match rejection {
            LoginRejection::WrongPassword => {
                // 실패 횟수 기록은 best-effort, 실패해도 응답은 동일
                if let Err(e) = UserRepository::record_login_failure(pool, record.id).await {
                    warn!(user_id = %record.id, "로그인 실패 기록 저장 실패: {}", e);
                }
                debug!(user_id = %record.id, "로그인 실패: 비밀번호 불일치");
            }
            LoginRejection::UnverifiableHash(e) => {
                // 저장된 해시가 손상된 경우. 서버 문제지만 응답은 같은 401로 수렴한다.
                error!(user_id = %record.id, "비밀번호 검증 불가: {}", e);
            }
            LoginRejection::Inactive => {
                // 올바른 비밀번호라도 비활성 계정이면 같은 401 (실패 카운터는 건드리지 않음)
                debug!(user_id = %record.id, "로그인 거부: 비활성 계정");
            }
        }
        record_login("failure");
        return Err(invalid_credentials());
    }

    let role = match record.parsed_role() {
        Some(role) => role,
        None => {
            error!(user_id = %record.id, stored_role = %record.role, "저장된 역할을 해석할 수 없습니다");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "INTERNAL_ERROR",
                    "계정 정보를 처리할 수 없습니다",
                )),
            ));
        }
    };

    // 성공 북키핑 (카운터 리셋 + 로그인 시각), 실패는 로그만 남긴다
    if let Err(e) = UserRepository::record_login_success(pool, record.id).await {
        warn!(user_id = %record.id, "로그인 성공 기록 저장 실패: {}", e);
    }

    let pair = state
        .tokens
        .issue_pair(&record.id.to_string(), role)
        .map_err(|e| {
            error!(user_id = %record.id, "토큰 발급 실패: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "TOKEN_ERROR",
                    "토큰 발급에 실패했습니다",
                )),
            )
        })?;

    info!(user_id = %record.id, "로그인 성공");
    record_login("success");

    Ok(Json(pair))
}

/// 액세스 토큰 갱신
///
/// POST /api/v1/auth/refresh
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "재발급 성공", body = RefreshResponse),
        (status = 401, description = "유효하지 않은 리프레시 토큰", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    // 저장소를 건드리기 전에 토큰 클래스와 서명부터 검증한다
    let claims = match state.tokens.verify_refresh(&request.refresh_token) {
        Ok(claims) => claims,
        Err(_) => {
            record_token_refresh("failure");
            return Err(refresh_unauthorized());
        }
    };

    let pool = state.db_pool.as_ref().ok_or_else(|| {
        error!("데이터베이스가 설정되지 않았습니다");
        db_not_configured()
    })?;

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            debug!("리프레시 토큰 subject가 UUID가 아닙니다");
            record_token_refresh("failure");
            return Err(refresh_unauthorized());
        }
    };

    let record = match UserRepository::find_by_id(pool, user_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            // 토큰은 유효하지만 계정이 사라진 경우도 같은 401
            debug!(user_id = %user_id, "갱신 거부: 계정 없음");
            record_token_refresh("failure");
            return Err(refresh_unauthorized());
        }
        Err(e) => {
            error!("사용자 조회 실패: {}", e);
            return Err(database_error());
        }
    };

    if !record.is_active {
        debug!(user_id = %record.id, "갱신 거부: 비활성 계정");
        record_token_refresh("failure");
        return Err(refresh_unauthorized());
    }

    // 역할은 토큰이 아니라 저장소에서 다시 읽는다.
    // 그 사이 역할이 바뀌었어도 새 액세스 토큰에는 현재 값이 실린다.
    let role = match record.parsed_role() {
        Some(role) => role,
        None => {
            error!(user_id = %record.id, stored_role = %record.role, "저장된 역할을 해석할 수 없습니다");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorResponse::new(
                    "INTERNAL_ERROR",
                    "계정 정보를 처리할 수 없습니다",
                )),
            ));
        }
    };

    let access_token = state.tokens.issue_access(&claims.sub, role).map_err(|e| {
        error!(user_id = %record.id, "토큰 발급 실패: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiErrorResponse::new(
                "TOKEN_ERROR",
                "토큰 발급에 실패했습니다",
            )),
        )
    })?;

    debug!(user_id = %record.id, "액세스 토큰 재발급");
    record_token_refresh("success");

    Ok(Json(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.access_ttl_minutes() * 60,
    }))
}

/// 내 프로필 조회
///
/// GET /api/v1/auth/me
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "프로필 조회 성공", body = UserResponse),
        (status = 401, description = "인증 실패", body = ApiErrorResponse),
        (status = 500, description = "서버 오류", body = ApiErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, AuthUser(claims): AuthUser) -> impl IntoResponse {
    let pool = match &state.db_pool {
        Some(pool) => pool,
        None => {
            error!("데이터베이스가 설정되지 않았습니다");
            return db_not_configured().into_response();
        }
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            debug!("액세스 토큰 subject가 UUID가 아닙니다");
            return AuthError::Unauthorized.into_response();
        }
    };

    match UserRepository::find_by_id(pool, user_id).await {
        Ok(Some(record)) => Json(UserResponse::from(record)).into_response(),
        Ok(None) => {
            // 유효한 토큰이지만 계정이 사라진 경우: 404가 아니라 401
            debug!(user_id = %user_id, "프로필 조회 거부: 계정 없음");
            AuthError::Unauthorized.into_response()
        }
        Err(e) => {
            error!("사용자 조회 실패: {}", e);
            database_error().into_response()
        }
    }
}

// ==================== 라우터 ====================

/// 인증 라우터 생성.
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
}
