use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db_types::{NewWithdrawal, Withdrawal};

/// Records the withdrawal and returns its id.
pub async fn insert_withdrawal(withdrawal: &NewWithdrawal, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar(
        r#"
            INSERT INTO withdrawals (username, order_number, sum, processed_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id;
        "#,
    )
    .bind(&withdrawal.username)
    .bind(withdrawal.order_number.as_str())
    .bind(withdrawal.sum)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_withdrawals_for_user(
    login: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    let withdrawals = sqlx::query_as("SELECT * FROM withdrawals WHERE username = $1 ORDER BY processed_at, id")
        .bind(login)
        .fetch_all(conn)
        .await?;
    Ok(withdrawals)
}
