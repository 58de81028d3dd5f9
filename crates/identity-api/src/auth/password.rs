//! 비밀번호 해싱 및 검증.
//!
//! Argon2id 알고리즘으로 비밀번호를 처리합니다. 해시마다 무작위 솔트가
//! 생성되므로 같은 비밀번호를 두 번 해싱해도 결과는 다릅니다.
//! 해싱과 검증 모두 CPU 연산이 무거우므로 핸들러에서는
//! `tokio::task::spawn_blocking` 안에서 호출합니다.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// 비밀번호 처리 에러.
#[derive(Debug, Error, PartialEq)]
pub enum PasswordError {
    /// 해시 생성 실패
    #[error("비밀번호 해싱 실패")]
    HashingError,
    /// 비밀번호 불일치
    #[error("비밀번호 검증 실패")]
    VerificationFailed,
    /// 저장된 해시가 PHC 형식이 아님
    #[error("유효하지 않은 해시 형식")]
    InvalidHashFormat,
}

/// 비밀번호를 해싱합니다.
///
/// PHC 문자열(`$argon2id$...`)을 반환하며, 솔트가 포함되어 있어
/// 검증 시 별도의 솔트 저장이 필요 없습니다.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| PasswordError::HashingError)
}

/// 비밀번호를 저장된 해시와 대조합니다.
///
/// 손상된 해시 문자열은 `InvalidHashFormat`으로 처리되며 패닉하지 않습니다.
/// 호출자는 두 실패를 구분해 로깅할 수 있지만, 로그인 응답에서는
/// 하나의 일반 실패로 합쳐야 합니다.
pub fn verify_password(password: &str, hash: &str) -> Result<(), PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHashFormat)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| PasswordError::VerificationFailed)
}

/// 가입 시 비밀번호 강도를 검사합니다.
///
/// 최소 8자, 숫자 1개 이상, 영문자 1개 이상.
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("비밀번호는 최소 8자 이상이어야 합니다");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("비밀번호에 숫자가 최소 1개 포함되어야 합니다");
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err("비밀번호에 영문자가 최소 1개 포함되어야 합니다");
    }
    Ok(())
}
