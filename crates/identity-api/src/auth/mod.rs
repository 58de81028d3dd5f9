//! 인증 및 권한 부여.
//!
//! 자격 증명 해싱, 두 종류(액세스/리프레시)의 JWT 발급·검증,
//! 요청 신원 추출, 역할 기반 접근 제어를 제공합니다.
//!
//! # 구성 요소
//!
//! - [`TokenIssuer`]: 클래스별 독립 비밀키로 토큰을 발급/검증
//! - [`AccessClaims`] / [`RefreshClaims`]: 클래스별 JWT 페이로드
//! - [`AuthUser`] / [`AdminUser`]: Axum 핸들러용 신원 추출기
//! - [`RoleGuard`]: 허용 역할 집합 기반 가드
//! - 비밀번호 해싱/검증 함수 (Argon2)
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! // 보호된 라우트에서 AuthUser 추출기 사용
//! async fn protected_handler(
//!     AuthUser(claims): AuthUser,
//! ) -> impl IntoResponse {
//!     format!("Hello, {}!", claims.sub)
//! }
//! ```

mod guard;
mod jwt;
mod middleware;
mod password;

pub use guard::RoleGuard;
pub use jwt::{AccessClaims, RefreshClaims, TokenClass, TokenError, TokenIssuer, TokenPair};
pub use middleware::{AdminUser, AuthError, AuthUser};
pub use password::{
    hash_password, validate_password_strength, verify_password, PasswordError,
};
