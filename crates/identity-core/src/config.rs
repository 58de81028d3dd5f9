//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 설정은 프로세스 시작 시 한 번 로드되며 이후 변경되지 않습니다.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;

use crate::error::{IdentityError, IdentityResult};

/// 애플리케이션 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 서버 설정
    pub server: ServerConfig,
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 인증 설정
    pub auth: AuthConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// 데이터베이스 설정.
///
/// 연결 URL은 `DATABASE_URL` 환경 변수로 전달합니다.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
    /// 유휴 타임아웃 (초)
    pub idle_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connection_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// 인증 설정.
///
/// 액세스 토큰과 리프레시 토큰은 서로 독립된 시크릿으로 서명합니다.
/// 한쪽 시크릿이 유출되어도 다른 토큰 클래스는 위조할 수 없습니다.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// 액세스 토큰 서명 시크릿
    pub access_secret: SecretString,
    /// 리프레시 토큰 서명 시크릿
    pub refresh_secret: SecretString,
    /// 액세스 토큰 수명 (분)
    pub access_ttl_minutes: i64,
    /// 리프레시 토큰 수명 (일)
    pub refresh_ttl_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: SecretString::default(),
            refresh_secret: SecretString::default(),
            access_ttl_minutes: 30,
            refresh_ttl_days: 14,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> IdentityResult<Self> {
        let builder = config::Config::builder()
            // 기본값으로 시작
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("auth.access_secret", "")?
            .set_default("auth.refresh_secret", "")?
            .set_default("auth.access_ttl_minutes", 30)?
            .set_default("auth.refresh_ttl_days", 14)?
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("IDENTITY")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> IdentityResult<Self> {
        Self::load("config/default.toml")
    }
}

impl From<config::ConfigError> for IdentityError {
    fn from(err: config::ConfigError) -> Self {
        IdentityError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_auth_config_defaults() {
        let config = AuthConfig::default();
        assert!(config.access_secret.expose_secret().is_empty());
        assert_eq!(config.access_ttl_minutes, 30);
        assert_eq!(config.refresh_ttl_days, 14);
    }

    #[test]
    fn test_auth_config_debug_redacts_secrets() {
        let config = AuthConfig {
            access_secret: SecretString::from("top-secret-value".to_string()),
            refresh_secret: SecretString::from("another-secret".to_string()),
            ..AuthConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("top-secret-value"));
        assert!(!printed.contains("another-secret"));
    }

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.idle_timeout_secs, 300);
    }
}
