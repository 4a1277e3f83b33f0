use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Points, UserBalance};

/// Creates the user with a zero balance. Returns `false` if the login already exists.
pub async fn idempotent_insert(
    login: &str,
    password_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT INTO users (login, password_hash) VALUES ($1, $2) ON CONFLICT (login) DO NOTHING")
        .bind(login)
        .bind(password_hash)
        .execute(conn)
        .await?;
    let inserted = result.rows_affected() == 1;
    if inserted {
        debug!("🧑️ New user account created for {login}");
    }
    Ok(inserted)
}

pub async fn fetch_balance(login: &str, conn: &mut SqliteConnection) -> Result<Option<UserBalance>, sqlx::Error> {
    let balance = sqlx::query_as("SELECT balance AS current, total_withdrawn AS withdrawn FROM users WHERE login = $1")
        .bind(login)
        .fetch_optional(conn)
        .await?;
    Ok(balance)
}

pub async fn fetch_password_hash(login: &str, conn: &mut SqliteConnection) -> Result<Option<String>, sqlx::Error> {
    let hash =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE login = $1").bind(login).fetch_optional(conn).await?;
    Ok(hash)
}

/// Adds `amount` to the user's balance. Returns the number of rows affected, which is zero if the new balance would
/// exceed [`Points::MAX`].
pub async fn credit_balance(login: &str, amount: Points, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET balance = balance + $1 WHERE login = $2 AND balance <= $3 - $1")
        .bind(amount)
        .bind(login)
        .bind(Points::MAX)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

/// Moves `amount` from the user's balance to their withdrawn total. The row is only updated if the balance covers the
/// full amount, so zero affected rows means either an unknown login or insufficient funds.
pub async fn debit_balance(login: &str, amount: Points, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE users SET balance = balance - $1, total_withdrawn = total_withdrawn + $1
            WHERE login = $2 AND balance >= $1;
        "#,
    )
    .bind(amount)
    .bind(login)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
