//! 요청 신원 추출.
//!
//! `Authorization: Bearer <token>` 헤더에서 액세스 토큰을 꺼내 검증하고,
//! 검증된 클레임을 핸들러 인자로 전달하는 extractor들을 정의합니다.
//!
//! 실패는 전부 닫힌 방향(fail closed)입니다. 헤더 없음, 스킴 오류,
//! 토큰 변조, 만료 중 무엇이 원인이든 동일한 401 응답이 나가며,
//! 원인은 debug 로그로만 남습니다. 호출자가 실패 원인으로 토큰 상태를
//! 탐색할 수 없게 하기 위함입니다.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use super::guard::RoleGuard;
use super::jwt::{AccessClaims, TokenIssuer};

/// 인증/인가 에러.
///
/// 인증 실패(401)와 인가 실패(403)만 구분합니다. 401 안에서의 세부
/// 원인은 응답에 드러나지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// 신원을 확인할 수 없음
    #[error("인증이 필요합니다")]
    Unauthorized,
    /// 신원은 확인되었으나 권한이 없음
    #[error("이 작업을 수행할 권한이 없습니다")]
    Forbidden,
}

impl AuthError {
    /// 응답 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Unauthorized => "UNAUTHORIZED",
            AuthError::Forbidden => "FORBIDDEN",
        }
    }

    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (self.status(), body).into_response()
    }
}

/// 인증된 사용자 extractor.
///
/// # 사용 예
///
/// ```ignore
/// async fn me(AuthUser(claims): AuthUser) -> Json<ProfileResponse> {
///     // claims.sub, claims.role 사용
/// }
/// ```
pub struct AuthUser(pub AccessClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                tracing::debug!("authorization header missing or not valid utf-8");
                AuthError::Unauthorized
            })?;

        // 스킴은 대소문자를 구분하지 않는다 ("Bearer", "bearer", "BEARER" 모두 허용)
        let (scheme, token) = header.split_once(' ').ok_or_else(|| {
            tracing::debug!("authorization header has no scheme separator");
            AuthError::Unauthorized
        })?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            tracing::debug!(scheme = %scheme, "unsupported authorization scheme");
            return Err(AuthError::Unauthorized);
        }

        let issuer = parts.extensions.get::<TokenIssuer>().ok_or_else(|| {
            tracing::error!("token issuer not attached to request extensions");
            AuthError::Unauthorized
        })?;

        let claims = issuer
            .verify_access(token.trim())
            .map_err(|_| AuthError::Unauthorized)?;

        Ok(AuthUser(claims))
    }
}

/// 관리자 전용 extractor.
///
/// 신원 추출 뒤 관리자 가드를 통과해야 합니다. 역할이 부족한 경우
/// 401이 아닌 403을 반환하여, 인증 실패와 인가 실패를 구분합니다.
pub struct AdminUser(pub AccessClaims);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        RoleGuard::admin_only().check(Some(&claims))?;
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Extension, Router};
    use identity_core::{AuthConfig, UserRole};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            access_secret: SecretString::from("test-access-secret-key-minimum-32-chars!".to_string()),
            refresh_secret: SecretString::from("test-refresh-secret-key-minimum-32-chars".to_string()),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
        })
    }

    async fn whoami(AuthUser(claims): AuthUser) -> Json<serde_json::Value> {
        Json(json!({ "subject": claims.sub, "role": claims.role }))
    }

    async fn admin_area(AdminUser(claims): AdminUser) -> Json<serde_json::Value> {
        Json(json!({ "subject": claims.sub }))
    }

    fn test_router(issuer: TokenIssuer) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route("/admin", get(admin_area))
            .layer(Extension(issuer))
    }

    async fn send(router: Router, auth_header: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = auth_header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let response = router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let (status, body) = send(test_router(test_issuer()), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_wrong_scheme_is_unauthorized() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-1", UserRole::Student).unwrap();
        let (status, _) = send(
            test_router(issuer),
            Some(&format!("Basic {}", token)),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_scheme_is_case_insensitive() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-1", UserRole::Student).unwrap();

        for scheme in ["Bearer", "bearer", "BEARER", "BeArEr"] {
            let (status, body) = send(
                test_router(issuer.clone()),
                Some(&format!("{} {}", scheme, token)),
            )
            .await;
            assert_eq!(status, StatusCode::OK, "scheme {} should be accepted", scheme);
            assert_eq!(body["subject"], "user-1");
        }
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let (status, _) = send(
            test_router(test_issuer()),
            Some("Bearer not-a-real-token"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejection_body_is_uniform_across_causes() {
        let issuer = test_issuer();
        let expired = TokenIssuer::new(&AuthConfig {
            access_secret: SecretString::from("test-access-secret-key-minimum-32-chars!".to_string()),
            refresh_secret: SecretString::from("test-refresh-secret-key-minimum-32-chars".to_string()),
            access_ttl_minutes: -5,
            refresh_ttl_days: 14,
        })
        .issue_access("user-1", UserRole::Student)
        .unwrap();

        let (_, missing_body) = send(test_router(issuer.clone()), None).await;
        let (_, malformed_body) = send(test_router(issuer.clone()), Some("Bearer garbage")).await;
        let (_, expired_body) = send(
            test_router(issuer),
            Some(&format!("Bearer {}", expired)),
        )
        .await;

        // 원인이 무엇이든 응답 본문이 동일해야 한다
        assert_eq!(missing_body, malformed_body);
        assert_eq!(missing_body, expired_body);
    }

    #[tokio::test]
    async fn test_student_token_on_admin_route_is_forbidden() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-1", UserRole::Student).unwrap();

        let response = test_router(issuer)
            .oneshot(
                Request::builder()
                    .uri("/admin")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        // 인증은 됐으므로 401이 아니라 403
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_admin_token_on_admin_route_passes() {
        let issuer = test_issuer();
        let token = issuer.issue_access("admin-1", UserRole::Admin).unwrap();

        let response = test_router(issuer)
            .oneshot(
                Request::builder()
                    .uri("/admin")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_issuer_extension_fails_closed() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-1", UserRole::Student).unwrap();

        // Extension 레이어가 없는 라우터
        let router = Router::new().route("/whoami", get(whoami));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
