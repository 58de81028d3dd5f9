//! API 에러 응답 타입.
//!
//! 모든 라우트 핸들러가 공유하는 에러 응답 형식을 정의합니다.
//! 핸들러는 `(StatusCode, Json<ApiErrorResponse>)` 튜플로 에러를 반환합니다.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API 에러 응답.
///
/// ```json
/// {
///   "code": "USER_NOT_FOUND",
///   "message": "사용자를 찾을 수 없습니다",
///   "timestamp": 1735689600
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 기계가 판별하는 에러 코드 (예: "EMAIL_TAKEN")
    pub code: String,
    /// 사람이 읽는 에러 메시지
    pub message: String,
    /// 추가 상세 정보 (선택)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// 에러 발생 시각 (unix 초)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 새 에러 응답을 생성합니다.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보가 포함된 에러 응답을 생성합니다.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details),
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 라우트 핸들러 공용 Result 타입.
pub type ApiResult<T> = Result<T, (axum::http::StatusCode, axum::Json<ApiErrorResponse>)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_serialization() {
        let error = ApiErrorResponse::new("EMAIL_TAKEN", "이미 등록된 이메일입니다");
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["code"], "EMAIL_TAKEN");
        assert_eq!(json["message"], "이미 등록된 이메일입니다");
        assert!(json["timestamp"].is_i64());
        // details가 없으면 키 자체가 생략된다
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_error_response_with_details() {
        let error = ApiErrorResponse::with_details(
            "VALIDATION_ERROR",
            "입력값이 올바르지 않습니다",
            serde_json::json!({ "field": "email" }),
        );
        let json = serde_json::to_value(&error).unwrap();

        assert_eq!(json["details"]["field"], "email");
    }

    #[test]
    fn test_error_response_display() {
        let error = ApiErrorResponse::new("USER_NOT_FOUND", "사용자를 찾을 수 없습니다");
        assert_eq!(error.to_string(), "[USER_NOT_FOUND] 사용자를 찾을 수 없습니다");
    }
}
