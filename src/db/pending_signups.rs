use sqlx::PgPool;

use crate::models::PendingSignup;

pub async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PendingSignup>, sqlx::Error> {
    sqlx::query_as::<_, PendingSignup>("SELECT * FROM pending_signups WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// Plain INSERT: the primary key on email rejects a second pending signup.
pub async fn insert(pool: &PgPool, pending: &PendingSignup) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO pending_signups (email, code, username, password_hash, created_at, expires_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&pending.email)
    .bind(&pending.code)
    .bind(&pending.username)
    .bind(&pending.password_hash)
    .bind(pending.created_at)
    .bind(pending.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Conditional on the code so a stale caller cannot remove a newer signup.
pub async fn delete(pool: &PgPool, email: &str, code: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pending_signups WHERE email = $1 AND code = $2")
        .bind(email)
        .bind(code)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
