//! 인증 서비스의 에러 타입.
//!
//! 이 모듈은 서비스 전반에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

/// 핵심 서비스 에러.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 인증 에러
    #[error("인증 에러: {0}")]
    Auth(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    Validation(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 서비스 작업을 위한 Result 타입.
pub type IdentityResult<T> = Result<T, IdentityError>;

impl IdentityError {
    /// 호출자 입력에서 비롯된 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IdentityError::Auth(_) | IdentityError::Validation(_) | IdentityError::NotFound(_)
        )
    }

    /// 치명적인 에러인지 확인합니다.
    pub fn is_critical(&self) -> bool {
        matches!(self, IdentityError::Config(_) | IdentityError::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_client_classification() {
        let validation_err = IdentityError::Validation("empty email".to_string());
        assert!(validation_err.is_client_error());

        let config_err = IdentityError::Config("missing secret".to_string());
        assert!(!config_err.is_client_error());
    }

    #[test]
    fn test_error_critical() {
        let db_err = IdentityError::Database("connection refused".to_string());
        assert!(db_err.is_critical());

        let not_found_err = IdentityError::NotFound("user".to_string());
        assert!(!not_found_err.is_critical());
    }

    #[test]
    fn test_error_display() {
        let err = IdentityError::Auth("bad token".to_string());
        assert_eq!(err.to_string(), "인증 에러: bad token");
    }
}
