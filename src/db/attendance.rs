use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AttendanceRecord;

pub async fn insert(pool: &PgPool, record: &AttendanceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO attendance_records (id, user_id, clock_in, clock_out)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(record.id)
    .bind(record.user_id)
    .bind(record.clock_in)
    .bind(record.clock_out)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_open(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records
         WHERE user_id = $1 AND clock_out IS NULL
         ORDER BY clock_in DESC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Conditional update: a record that was closed concurrently is left as is.
pub async fn close(
    pool: &PgPool,
    id: Uuid,
    clock_out: DateTime<Utc>,
) -> Result<Option<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "UPDATE attendance_records SET clock_out = $2
         WHERE id = $1 AND clock_out IS NULL
         RETURNING *",
    )
    .bind(id)
    .bind(clock_out)
    .fetch_optional(pool)
    .await
}

pub async fn list_all(pool: &PgPool) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records ORDER BY clock_in DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<AttendanceRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttendanceRecord>(
        "SELECT * FROM attendance_records WHERE user_id = $1 ORDER BY clock_in DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
