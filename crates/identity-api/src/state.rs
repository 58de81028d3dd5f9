//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 모든 API 핸들러에서 공유되는 상태를 관리합니다.
//! 내부 필드가 전부 Clone 가능하므로 Arc 래핑 없이 요청 간에 공유됩니다.

use crate::auth::TokenIssuer;

/// 애플리케이션 공유 상태.
///
/// 이 구조체는 모든 API 핸들러에서 접근할 수 있는 공유 리소스를 포함합니다.
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 데이터베이스 연결 풀 (PostgreSQL)
    pub db_pool: Option<sqlx::PgPool>,

    /// 토큰 발급기 (액세스/리프레시 비밀키 보유)
    pub tokens: TokenIssuer,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// DB 풀 없이 생성되며, `with_db_pool`로 연결을 붙입니다.
    pub fn new(tokens: TokenIssuer) -> Self {
        Self {
            db_pool: None,
            tokens,
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 데이터베이스 연결 설정.
    pub fn with_db_pool(mut self, pool: sqlx::PgPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// 데이터베이스 연결 설정 여부 확인.
    pub fn has_db_pool(&self) -> bool {
        self.db_pool.is_some()
    }

    /// 서버 업타임(초) 반환.
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 데이터베이스 연결 상태 확인.
    pub async fn is_db_healthy(&self) -> bool {
        if let Some(pool) = &self.db_pool {
            sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()
        } else {
            false
        }
    }
}

/// 테스트용 AppState 생성 헬퍼.
///
/// 실제 DB 연결 없이 테스트할 수 있는 최소한의 상태를 생성합니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    use identity_core::AuthConfig;
    use secrecy::SecretString;

    let tokens = TokenIssuer::new(&AuthConfig {
        access_secret: SecretString::from("test-access-secret-key-minimum-32-chars!".to_string()),
        refresh_secret: SecretString::from("test-refresh-secret-key-minimum-32-chars".to_string()),
        access_ttl_minutes: 30,
        refresh_ttl_days: 14,
    });

    AppState::new(tokens)
}
