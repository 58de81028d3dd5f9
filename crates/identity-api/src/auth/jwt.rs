//! JWT 토큰 발급 및 검증.
//!
//! 토큰은 액세스와 리프레시 두 클래스로 나뉩니다:
//! - **액세스**: 짧은 수명(분 단위), 역할 클레임 포함, API 호출 인증에 사용
//! - **리프레시**: 긴 수명(일 단위), 주체(subject)만 포함, 액세스 토큰 재발급에만 사용
//!
//! 두 클래스는 서로 다른 시크릿으로 서명되고, 클레임에 명시적인
//! `token_type` 마커를 가집니다. 따라서 시크릿이 같더라도 클래스를
//! 바꿔치기한 토큰은 검증을 통과하지 못합니다.
//!
//! 검증 실패는 원인(서명 불일치, 만료, 형식 오류, 클래스 불일치)과
//! 무관하게 단일 에러로 합쳐집니다. 원인은 debug 레벨 로그로만 남습니다.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use identity_core::{AuthConfig, UserRole};

/// 토큰 클래스 마커.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    /// API 호출 인증용
    Access,
    /// 액세스 토큰 재발급용
    Refresh,
}

impl TokenClass {
    /// 클레임에 기록되는 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenClass::Access => "access",
            TokenClass::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 액세스 토큰 클레임.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// 주체 (사용자 ID)
    pub sub: String,
    /// 사용자 역할
    pub role: UserRole,
    /// 토큰 클래스 마커 (항상 `access`)
    pub token_type: TokenClass,
    /// 발급 시각 (unix 초)
    pub iat: i64,
    /// 만료 시각 (unix 초)
    pub exp: i64,
    /// 토큰 고유 ID (로그 상관관계용)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl AccessClaims {
    /// 새 액세스 클레임을 생성합니다.
    pub fn new(subject: impl Into<String>, role: UserRole, expires_in_minutes: i64) -> Self {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(expires_in_minutes);

        Self {
            sub: subject.into(),
            role,
            token_type: TokenClass::Access,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// 리프레시 토큰 클레임.
///
/// 역할 클레임이 없습니다. 재발급 시점의 역할은 항상 저장소에서
/// 다시 읽으므로, 역할이 바뀐 사용자가 오래된 리프레시 토큰으로
/// 이전 역할의 액세스 토큰을 얻을 수 없습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// 주체 (사용자 ID)
    pub sub: String,
    /// 토큰 클래스 마커 (항상 `refresh`)
    pub token_type: TokenClass,
    /// 발급 시각 (unix 초)
    pub iat: i64,
    /// 만료 시각 (unix 초)
    pub exp: i64,
    /// 토큰 고유 ID
    pub jti: String,
}

impl RefreshClaims {
    /// 새 리프레시 클레임을 생성합니다.
    pub fn new(subject: impl Into<String>, expires_in_days: i64) -> Self {
        let now = Utc::now();
        let expires_at = now + Duration::days(expires_in_days);

        Self {
            sub: subject.into(),
            token_type: TokenClass::Refresh,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// 로그인 성공 시 반환되는 토큰 쌍.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    /// 액세스 토큰
    pub access_token: String,
    /// 리프레시 토큰
    pub refresh_token: String,
    /// 액세스 토큰 수명 (초)
    pub expires_in: i64,
    /// 토큰 타입 (항상 "Bearer")
    pub token_type: String,
}

/// 토큰 에러.
#[derive(Debug, Error)]
pub enum TokenError {
    /// 토큰 서명(인코딩) 실패
    #[error("토큰 생성 실패: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    /// 검증 실패. 원인은 의도적으로 노출하지 않습니다.
    #[error("유효하지 않은 토큰")]
    Invalid,
}

/// 토큰 발급기 겸 검증기.
///
/// 프로세스 시작 시 [`AuthConfig`]로부터 한 번 생성되며 이후 변경되지
/// 않습니다. 검증은 순수 연산으로, I/O나 공유 가변 상태가 없습니다.
#[derive(Clone)]
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl_minutes: i64,
    refresh_ttl_days: i64,
}

impl TokenIssuer {
    /// 인증 설정에서 발급기를 생성합니다.
    pub fn new(config: &AuthConfig) -> Self {
        let access_secret = config.access_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_secret.expose_secret().as_bytes();

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl_minutes: config.access_ttl_minutes,
            refresh_ttl_days: config.refresh_ttl_days,
        }
    }

    /// 액세스 토큰 수명 (분).
    pub fn access_ttl_minutes(&self) -> i64 {
        self.access_ttl_minutes
    }

    /// 액세스 토큰을 발급합니다.
    pub fn issue_access(&self, subject: &str, role: UserRole) -> Result<String, TokenError> {
        let claims = AccessClaims::new(subject, role, self.access_ttl_minutes);
        encode(&Header::default(), &claims, &self.access_encoding).map_err(TokenError::Encoding)
    }

    /// 리프레시 토큰을 발급합니다.
    pub fn issue_refresh(&self, subject: &str) -> Result<String, TokenError> {
        let claims = RefreshClaims::new(subject, self.refresh_ttl_days);
        encode(&Header::default(), &claims, &self.refresh_encoding).map_err(TokenError::Encoding)
    }

    /// 액세스 + 리프레시 토큰 쌍을 발급합니다.
    pub fn issue_pair(&self, subject: &str, role: UserRole) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject, role)?,
            refresh_token: self.issue_refresh(subject)?,
            expires_in: self.access_ttl_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    /// 액세스 토큰을 검증하고 클레임을 반환합니다.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Self::validation())
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "access token rejected");
                TokenError::Invalid
            })?;

        if data.claims.token_type != TokenClass::Access {
            tracing::debug!("token class marker mismatch on access verification");
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// 리프레시 토큰을 검증하고 클레임을 반환합니다.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Self::validation())
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "refresh token rejected");
                TokenError::Invalid
            })?;

        if data.claims.token_type != TokenClass::Refresh {
            tracing::debug!("token class marker mismatch on refresh verification");
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// 공통 검증 규칙.
    ///
    /// 만료 판정에 시계 여유(leeway)를 두지 않습니다. 수명이 0 이하로
    /// 발급된 토큰은 즉시 만료로 취급됩니다.
    fn validation() -> Validation {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::SecretString;

    const TEST_ACCESS_SECRET: &str = "test-access-secret-key-minimum-32-chars!";
    const TEST_REFRESH_SECRET: &str = "test-refresh-secret-key-minimum-32-chars";

    fn test_config() -> AuthConfig {
        AuthConfig {
            access_secret: SecretString::from(TEST_ACCESS_SECRET.to_string()),
            refresh_secret: SecretString::from(TEST_REFRESH_SECRET.to_string()),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
        }
    }

    fn test_issuer() -> TokenIssuer {
        TokenIssuer::new(&test_config())
    }

    /// 서명부 첫 글자를 뒤집어 변조된 토큰을 만든다.
    fn tamper_signature(token: &str) -> String {
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);
        let sig = parts[2];
        let flipped = if sig.starts_with('A') {
            format!("B{}", &sig[1..])
        } else {
            format!("A{}", &sig[1..])
        };
        format!("{}.{}.{}", parts[0], parts[1], flipped)
    }

    #[test]
    fn test_access_token_round_trip() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-123", UserRole::Mentor).unwrap();

        let claims = issuer.verify_access(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.role, UserRole::Mentor);
        assert_eq!(claims.token_type, TokenClass::Access);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh("user-123").unwrap();

        let claims = issuer.verify_refresh(&token).unwrap();
        assert_eq!(claims.sub, "user-123");
        assert_eq!(claims.token_type, TokenClass::Refresh);
        assert!(!claims.jti.is_empty());
    }

    #[test]
    fn test_refresh_payload_has_no_role_claim() {
        let issuer = test_issuer();
        let token = issuer.issue_refresh("user-123").unwrap();

        // 서명 검증 없이 페이로드만 열어 역할 클레임 부재를 확인한다
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        let data = decode::<serde_json::Value>(
            &token,
            &DecodingKey::from_secret(b"unused"),
            &validation,
        )
        .unwrap();

        assert!(data.claims.get("role").is_none());
        assert_eq!(data.claims["token_type"], "refresh");
    }

    #[test]
    fn test_cross_class_use_is_rejected() {
        let issuer = test_issuer();
        let access = issuer.issue_access("user-123", UserRole::Student).unwrap();
        let refresh = issuer.issue_refresh("user-123").unwrap();

        assert!(matches!(
            issuer.verify_refresh(&access),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(
            issuer.verify_access(&refresh),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_cross_class_rejected_even_with_identical_secrets() {
        // 시크릿이 같아도 token_type 마커가 클래스를 가른다
        let config = AuthConfig {
            access_secret: SecretString::from(TEST_ACCESS_SECRET.to_string()),
            refresh_secret: SecretString::from(TEST_ACCESS_SECRET.to_string()),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
        };
        let issuer = TokenIssuer::new(&config);

        let access = issuer.issue_access("user-123", UserRole::Admin).unwrap();
        assert!(matches!(
            issuer.verify_refresh(&access),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_tampered_signature_is_rejected() {
        let issuer = test_issuer();
        let token = issuer.issue_access("user-123", UserRole::Student).unwrap();

        let tampered = tamper_signature(&token);
        assert!(matches!(
            issuer.verify_access(&tampered),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected_like_tampered() {
        let config = AuthConfig {
            access_ttl_minutes: -5,
            ..test_config()
        };
        let issuer = TokenIssuer::new(&config);
        let expired = issuer.issue_access("user-123", UserRole::Student).unwrap();

        // 만료와 변조는 같은 불투명 에러로 합쳐진다
        assert!(matches!(
            issuer.verify_access(&expired),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let issuer = test_issuer();
        assert!(matches!(
            issuer.verify_access("not.a.jwt"),
            Err(TokenError::Invalid)
        ));
        assert!(matches!(issuer.verify_access(""), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = test_issuer();
        let other = TokenIssuer::new(&AuthConfig {
            access_secret: SecretString::from("a-completely-different-secret-32-chars!!".to_string()),
            ..test_config()
        });

        let token = other.issue_access("user-123", UserRole::Student).unwrap();
        assert!(matches!(
            issuer.verify_access(&token),
            Err(TokenError::Invalid)
        ));
    }

    fn role_strategy() -> impl Strategy<Value = UserRole> {
        prop_oneof![
            Just(UserRole::Admin),
            Just(UserRole::Mentor),
            Just(UserRole::Student),
        ]
    }

    proptest! {
        #[test]
        fn test_round_trip_preserves_subject_and_role(
            subject in "[a-zA-Z0-9-]{1,64}",
            role in role_strategy(),
        ) {
            let issuer = test_issuer();
            let token = issuer.issue_access(&subject, role).unwrap();
            let claims = issuer.verify_access(&token).unwrap();
            prop_assert_eq!(claims.sub, subject);
            prop_assert_eq!(claims.role, role);
        }
    }
}
