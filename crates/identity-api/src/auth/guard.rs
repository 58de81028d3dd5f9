//! 역할 기반 접근 제어.
//!
//! 가드는 허용 역할 집합을 들고 있는 값 객체입니다. 역할별 분기 코드가
//! 아니라 데이터(집합 멤버십)로 권한을 판정하므로, 보호 대상 작업마다
//! 허용 집합만 선언하면 됩니다.

use identity_core::UserRole;

use super::jwt::AccessClaims;
use super::middleware::AuthError;

/// 허용 역할 집합을 보관하는 가드.
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard {
    allowed: &'static [UserRole],
}

impl RoleGuard {
    /// 주어진 허용 집합으로 가드를 생성합니다.
    pub const fn new(allowed: &'static [UserRole]) -> Self {
        Self { allowed }
    }

    /// 관리자 전용 가드.
    pub const fn admin_only() -> Self {
        Self::new(&[UserRole::Admin])
    }

    /// 역할이 허용 집합에 포함되는지 확인합니다.
    pub fn allows(&self, role: UserRole) -> bool {
        self.allowed.contains(&role)
    }

    /// 요청 신원을 검사합니다.
    ///
    /// 신원이 아예 없으면 인증 실패(401), 신원은 있으나 역할이 허용
    /// 집합에 없으면 인가 실패(403)입니다. 두 결과는 구분되는 응답으로
    /// 나갑니다. 신원 추출을 거치지 않은 호출도 여기서 401로 처리됩니다.
    pub fn check(&self, identity: Option<&AccessClaims>) -> Result<(), AuthError> {
        let claims = match identity {
            Some(claims) => claims,
            None => {
                tracing::debug!("role check without identity");
                return Err(AuthError::Unauthorized);
            }
        };

        if self.allows(claims.role) {
            Ok(())
        } else {
            tracing::debug!(
                subject = %claims.sub,
                role = %claims.role,
                "role not permitted for this operation"
            );
            Err(AuthError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with_role(role: UserRole) -> AccessClaims {
        AccessClaims::new("user-123", role, 30)
    }

    #[test]
    fn test_missing_identity_is_authentication_failure() {
        let guard = RoleGuard::admin_only();
        assert!(matches!(guard.check(None), Err(AuthError::Unauthorized)));
    }

    #[test]
    fn test_disallowed_role_is_authorization_failure() {
        let guard = RoleGuard::admin_only();
        let claims = claims_with_role(UserRole::Student);
        assert!(matches!(
            guard.check(Some(&claims)),
            Err(AuthError::Forbidden)
        ));
    }

    #[test]
    fn test_allowed_role_passes() {
        let guard = RoleGuard::admin_only();
        let claims = claims_with_role(UserRole::Admin);
        assert!(guard.check(Some(&claims)).is_ok());
    }

    #[test]
    fn test_multi_role_allow_set() {
        let guard = RoleGuard::new(&[UserRole::Mentor, UserRole::Admin]);

        assert!(guard.allows(UserRole::Mentor));
        assert!(guard.allows(UserRole::Admin));
        assert!(!guard.allows(UserRole::Student));

        let mentor = claims_with_role(UserRole::Mentor);
        assert!(guard.check(Some(&mentor)).is_ok());

        let student = claims_with_role(UserRole::Student);
        assert!(matches!(
            guard.check(Some(&student)),
            Err(AuthError::Forbidden)
        ));
    }
}
