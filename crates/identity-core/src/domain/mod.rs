//! 사용자 계정 도메인 모델.

mod user;

pub use user::*;
