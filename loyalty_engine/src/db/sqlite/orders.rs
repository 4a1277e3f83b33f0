use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::db_types::{NewOrder, Order, OrderId, OrderStatusType, Points};

/// Inserts the order in the `NEW` state. Returns `false` if an order with this number already exists, in which case
/// nothing is changed.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO orders (id, username, status, accrual, created_at)
            VALUES ($1, $2, 'NEW', 0, $3)
            ON CONFLICT (id) DO NOTHING;
        "#,
    )
    .bind(order.id.as_str())
    .bind(&order.username)
    .bind(order.created_at)
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    if inserted {
        debug!("📝️ Order {} for {} has been saved", order.id, order.username);
    } else {
        trace!("📝️ Order {} already exists", order.id);
    }
    Ok(inserted)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_orders_for_user(login: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE username = $1 ORDER BY created_at DESC, id DESC")
        .bind(login)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// The number of orders that are not yet `PROCESSED` or `INVALID`.
pub async fn count_eligible(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status NOT IN ('PROCESSED', 'INVALID')")
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// A page of orders that are not yet `PROCESSED` or `INVALID`, in creation order. Ties on `created_at` are broken by
/// order number so that consecutive pages never overlap.
pub async fn fetch_eligible(limit: i64, offset: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status NOT IN ('PROCESSED', 'INVALID')
            ORDER BY created_at, id
            LIMIT $1 OFFSET $2;
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Moves a non-terminal order to `status`. Returns the number of rows affected, which is zero if the order does not
/// exist, belongs to someone else, or is already terminal.
pub async fn update_status(
    order_id: &OrderId,
    username: &str,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = $1
            WHERE id = $2 AND username = $3 AND status NOT IN ('PROCESSED', 'INVALID');
        "#,
    )
    .bind(status)
    .bind(order_id.as_str())
    .bind(username)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Marks a non-terminal order as `PROCESSED` with the given accrual. Returns the number of rows affected.
pub async fn mark_processed(
    order_id: &OrderId,
    username: &str,
    accrual: Points,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET status = 'PROCESSED', accrual = $1
            WHERE id = $2 AND username = $3 AND status NOT IN ('PROCESSED', 'INVALID');
        "#,
    )
    .bind(accrual)
    .bind(order_id.as_str())
    .bind(username)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Points the order at the withdrawal that was booked against it. Returns the number of rows affected.
pub async fn link_withdrawal(
    order_id: &OrderId,
    withdrawal_id: i64,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET withdrawal_id = $1 WHERE id = $2")
        .bind(withdrawal_id)
        .bind(order_id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
