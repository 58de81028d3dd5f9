//! 사용자 역할 및 계정 도메인 규칙.

use serde::{Deserialize, Serialize};

/// 사용자 역할.
///
/// 계정이 수행할 수 있는 작업의 범위를 정의합니다.
/// 역할 간 상하 관계는 없으며, 각 작업은 허용 역할 집합으로 보호됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// 관리자 - 사용자 관리 작업 수행 가능
    Admin,
    /// 멘토 - 담당 학생 관련 작업 수행 가능
    Mentor,
    /// 학생 - 기본 역할, 본인 계정 관련 작업만 가능
    Student,
}

impl UserRole {
    /// 문자열에서 역할 파싱.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(UserRole::Admin),
            "mentor" => Some(UserRole::Mentor),
            "student" => Some(UserRole::Student),
            _ => None,
        }
    }

    /// 저장소에 기록되는 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Mentor => "mentor",
            UserRole::Student => "student",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 이메일 주소를 저장 형식으로 정규화합니다.
///
/// 앞뒤 공백을 제거하고 소문자로 변환합니다. 저장과 조회 모두 이 형식을
/// 거치므로 `Alice@Example.com`과 `alice@example.com`은 같은 계정입니다.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
