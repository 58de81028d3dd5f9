//! 사용자 계정 저장소.
//!
//! 계정 생성, 조회, 역할 변경, 로그인 기록을 위한 데이터베이스 작업을 처리합니다.

use chrono::{DateTime, Utc};
use identity_core::UserRole;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// 사용자 레코드.
///
/// users 테이블의 데이터베이스 표현입니다.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    /// 응답 직렬화에 해시가 섞이지 않도록 제외
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub failed_login_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// 저장된 역할 문자열을 파싱.
    ///
    /// DB에 알 수 없는 값이 들어 있으면 None을 반환합니다.
    pub fn parsed_role(&self) -> Option<UserRole> {
        UserRole::parse(&self.role)
    }
}

/// 새 사용자 생성 입력.
///
/// email은 호출자가 정규화(트림, 소문자)한 값이어야 합니다.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub role: UserRole,
}

/// 사용자 저장소.
pub struct UserRepository;

impl UserRepository {
    /// 새 사용자 생성.
    ///
    /// 트랜잭션을 사용하여 원자성을 보장합니다.
    /// email 유니크 제약 위반은 sqlx::Error::Database로 전파됩니다.
    pub async fn create(pool: &PgPool, input: NewUser) -> Result<UserRecord, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, password_hash, display_name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&input.email)
        .bind(&input.password_hash)
        .bind(&input.display_name)
        .bind(input.role.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(record)
    }

    /// 이메일로 조회.
    ///
    /// 정규화된 이메일로 조회해야 대소문자 변형이 같은 계정으로 매칭됩니다.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT *
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    /// ID로 조회.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT *
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// 사용자 목록 조회.
    ///
    /// search가 주어지면 이메일/표시 이름 부분 일치로 필터링하고,
    /// 가입 시각 내림차순으로 정렬합니다.
    pub async fn list(
        pool: &PgPool,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT *
            FROM users
            WHERE ($1::text IS NULL
                   OR email ILIKE '%' || $1 || '%'
                   OR display_name ILIKE '%' || $1 || '%')
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// 필터 조건에 맞는 전체 사용자 수 조회.
    pub async fn count(pool: &PgPool, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::text IS NULL
                   OR email ILIKE '%' || $1 || '%'
                   OR display_name ILIKE '%' || $1 || '%')
            "#,
        )
        .bind(search)
        .fetch_one(pool)
        .await?;

        Ok(result.0)
    }

    /// 역할 변경.
    ///
    /// 대상이 없으면 None을 반환합니다.
    pub async fn update_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(pool)
        .await
    }

    /// 활성/비활성 전환.
    ///
    /// 대상이 없으면 None을 반환합니다.
    pub async fn set_active(
        pool: &PgPool,
        id: Uuid,
        active: bool,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            UPDATE users
            SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(active)
        .fetch_optional(pool)
        .await
    }

    /// 사용자 삭제.
    ///
    /// 삭제된 행이 있으면 true를 반환합니다.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 로그인 성공 기록.
    ///
    /// 실패 카운터를 리셋하고 마지막 로그인 시각을 갱신합니다.
    pub async fn record_login_success(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = 0, last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// 로그인 실패 기록.
    ///
    /// 실패 카운터만 증가시킵니다. 카운터에 따른 잠금은 하지 않습니다.
    pub async fn record_login_failure(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE users
            SET failed_login_count = failed_login_count + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }
}
