//! # Identity Core
//!
//! 인증 서비스의 핵심 타입을 제공합니다.
//!
//! 이 크레이트는 서비스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 사용자 역할 및 이메일 정규화 규칙
//! - 설정 관리 (파일 + 환경 변수)
//! - 에러 타입
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
