use std::time::Duration;

use chrono::{TimeZone, Utc};
use loyalty_engine::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, Points, ResolvedOrder},
    retry::RetryPolicy,
    test_utils::prepare_env::fresh_database,
    AccountManagement,
    SettlementError,
    SettlementStore,
    SqliteDatabase,
};

async fn setup() -> SqliteDatabase {
    let db = fresh_database().await;
    assert!(db.insert_user("alice", "hash-a").await.unwrap());
    assert!(db.insert_user("bob", "hash-b").await.unwrap());
    db
}

/// Inserts orders for `user`, each one second younger than the last, so that they come back in the given order.
async fn insert_orders(db: &SqliteDatabase, user: &str, ids: &[&str]) {
    let base = Utc.with_ymd_and_hms(2024, 6, 10, 8, 0, 0).unwrap();
    for (i, id) in ids.iter().enumerate() {
        let created_at = base + chrono::Duration::seconds(i as i64);
        let order = NewOrder::new(OrderId::from(*id), user).with_created_at(created_at);
        assert!(db.insert_order(order).await.unwrap(), "order {id} should be new");
    }
}

async fn order(db: &SqliteDatabase, id: &str) -> Order {
    db.fetch_order(&OrderId::from(id)).await.unwrap().expect("order should exist")
}

fn decision(order: &Order, status: OrderStatusType, points: i64) -> ResolvedOrder {
    ResolvedOrder::new(order, status, Points::from_points(points))
}

#[tokio::test]
async fn processed_order_credits_the_owner() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713"]).await;
    let page = db.fetch_eligible(10, 0).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.orders[0].status, OrderStatusType::New);

    db.apply(&decision(&page.orders[0], OrderStatusType::Processed, 500)).await.unwrap();

    let settled = order(&db, "79927398713").await;
    assert_eq!(settled.status, OrderStatusType::Processed);
    assert_eq!(settled.accrual, Points::from_points(500));
    let balance = db.fetch_balance("alice").await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::default());
    assert_eq!(db.fetch_balance("bob").await.unwrap().current, Points::default());
    assert!(db.fetch_eligible(10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn untouched_orders_stay_eligible() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713"]).await;
    let first = db.fetch_eligible(10, 0).await.unwrap();
    // Nothing is applied, as happens when the accrual service has not heard of the order yet
    let second = db.fetch_eligible(10, 0).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.orders[0].id.as_str(), "79927398713");
}

#[tokio::test]
async fn intermediate_status_only_changes_the_status() {
    let db = setup().await;
    insert_orders(&db, "alice", &["12345678903"]).await;
    let new_order = order(&db, "12345678903").await;
    // Any accrual on a non-processed decision is ignored
    db.apply(&decision(&new_order, OrderStatusType::Processing, 100)).await.unwrap();
    let processing = order(&db, "12345678903").await;
    assert_eq!(processing.status, OrderStatusType::Processing);
    assert_eq!(processing.accrual, Points::default());
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::default());
    assert_eq!(db.fetch_eligible(10, 0).await.unwrap().total, 1);
}

#[tokio::test]
async fn terminal_orders_never_change_again() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713", "2377225624"]).await;
    let processed = order(&db, "79927398713").await;
    db.apply(&decision(&processed, OrderStatusType::Processed, 500)).await.unwrap();

    for status in [OrderStatusType::Processing, OrderStatusType::New, OrderStatusType::Invalid] {
        let err = db.apply(&decision(&processed, status, 0)).await.unwrap_err();
        assert!(matches!(err, SettlementError::RowCountMismatch { affected: 0, .. }), "{err}");
    }
    // A second credit for the same order is refused
    let err = db.apply(&decision(&processed, OrderStatusType::Processed, 500)).await.unwrap_err();
    assert!(matches!(err, SettlementError::RowCountMismatch { .. }));
    assert_eq!(order(&db, "79927398713").await.status, OrderStatusType::Processed);
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::from_points(500));

    let invalid = order(&db, "2377225624").await;
    db.apply(&decision(&invalid, OrderStatusType::Invalid, 0)).await.unwrap();
    let err = db.apply(&decision(&invalid, OrderStatusType::Processed, 300)).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.is_fatal());
    assert_eq!(order(&db, "2377225624").await.status, OrderStatusType::Invalid);
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::from_points(500));
}

#[tokio::test]
async fn decisions_for_someone_elses_order_are_refused() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713"]).await;
    let mut forged = order(&db, "79927398713").await;
    forged.username = "bob".to_string();
    let err = db.apply(&decision(&forged, OrderStatusType::Processed, 500)).await.unwrap_err();
    assert!(matches!(err, SettlementError::RowCountMismatch { .. }));
    assert_eq!(order(&db, "79927398713").await.status, OrderStatusType::New);
    assert_eq!(db.fetch_balance("bob").await.unwrap().current, Points::default());
}

#[tokio::test]
async fn credit_for_a_missing_account_rolls_back() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713"]).await;
    let alice_order = order(&db, "79927398713").await;
    // Remove alice's account behind the store's back, so that the order update succeeds but the credit cannot
    let mut conn = db.pool().acquire().await.unwrap();
    sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await.unwrap();
    sqlx::query("DELETE FROM users WHERE login = 'alice'").execute(&mut *conn).await.unwrap();
    sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await.unwrap();
    drop(conn);

    let err = db.apply(&decision(&alice_order, OrderStatusType::Processed, 500)).await.unwrap_err();
    assert!(matches!(err, SettlementError::RowCountMismatch { operation: "credit_balance", affected: 0 }), "{err}");
    // The order update was rolled back with the failed credit
    let after = order(&db, "79927398713").await;
    assert_eq!(after.status, OrderStatusType::New);
    assert_eq!(after.accrual, Points::default());
}

#[tokio::test]
async fn credits_that_would_overflow_the_balance_roll_back() {
    let db = setup().await;
    insert_orders(&db, "alice", &["79927398713", "12345678903"]).await;
    let first = order(&db, "79927398713").await;
    db.apply(&ResolvedOrder::new(&first, OrderStatusType::Processed, Points::MAX)).await.unwrap();
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::MAX);

    let second = order(&db, "12345678903").await;
    let err = db.apply(&decision(&second, OrderStatusType::Processed, 1)).await.unwrap_err();
    assert!(matches!(err, SettlementError::RowCountMismatch { operation: "credit_balance", affected: 0 }), "{err}");
    assert!(!err.is_fatal());
    let after = order(&db, "12345678903").await;
    assert_eq!(after.status, OrderStatusType::New);
    assert_eq!(after.accrual, Points::default());
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::MAX);
}

#[tokio::test]
async fn paging_walks_the_backlog_and_restarts_at_the_end() {
    let db = setup().await;
    let ids = ["1001", "1002", "1003", "1004", "1005"];
    insert_orders(&db, "alice", &ids).await;

    let page = db.fetch_eligible(2, 0).await.unwrap();
    assert_eq!(page_ids(&page.orders), vec!["1001", "1002"]);
    assert_eq!(page.total, 5);
    let page = db.fetch_eligible(2, 2).await.unwrap();
    assert_eq!(page_ids(&page.orders), vec!["1003", "1004"]);
    let page = db.fetch_eligible(2, 4).await.unwrap();
    assert_eq!(page_ids(&page.orders), vec!["1005"]);
    assert_eq!(page.offset, 4);
    // An offset past the end starts again from the oldest order
    let page = db.fetch_eligible(2, 5).await.unwrap();
    assert_eq!(page.offset, 0);
    assert_eq!(page_ids(&page.orders), vec!["1001", "1002"]);

    // Settled orders drop out of the scan
    let first = page.orders[0].clone();
    db.apply(&decision(&first, OrderStatusType::Invalid, 0)).await.unwrap();
    let page = db.fetch_eligible(10, 0).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page_ids(&page.orders), vec!["1002", "1003", "1004", "1005"]);
}

fn page_ids(orders: &[Order]) -> Vec<&str> {
    orders.iter().map(|o| o.id.as_str()).collect()
}

#[tokio::test]
async fn concurrent_settlements_credit_every_order_once() {
    let db = setup().await;
    let ids = (0..20).map(|i| format!("{}", 5000 + i)).collect::<Vec<_>>();
    let refs = ids.iter().map(String::as_str).collect::<Vec<_>>();
    insert_orders(&db, "alice", &refs).await;
    let page = db.fetch_eligible(100, 0).await.unwrap();
    assert_eq!(page.len(), 20);

    let mut tasks = Vec::new();
    for o in page.orders {
        let db = db.clone();
        tasks.push(tokio::spawn(async move {
            db.apply(&ResolvedOrder::new(&o, OrderStatusType::Processed, Points::from(1_050))).await
        }));
    }
    for result in futures_util::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::from(21_000));
    assert_eq!(db.fetch_eligible(10, 0).await.unwrap().total, 0);
}

#[tokio::test]
async fn inserts_are_idempotent() {
    let db = setup().await;
    assert!(!db.insert_user("alice", "another-hash").await.unwrap());
    assert_eq!(db.fetch_password_hash("alice").await.unwrap().as_deref(), Some("hash-a"));
    assert_eq!(db.fetch_password_hash("nobody").await.unwrap(), None);

    insert_orders(&db, "alice", &["79927398713", "2377225624"]).await;
    let again = NewOrder::new(OrderId::from("79927398713"), "bob");
    assert!(!db.insert_order(again).await.unwrap());
    assert_eq!(order(&db, "79927398713").await.username, "alice");

    let orders = db.fetch_orders_for_user("alice").await.unwrap();
    // Newest first
    assert_eq!(page_ids(&orders), vec!["2377225624", "79927398713"]);
    assert!(db.fetch_orders_for_user("bob").await.unwrap().is_empty());
    assert!(matches!(db.fetch_balance("nobody").await, Err(SettlementError::AccountNotFound(_))));
}

#[tokio::test]
async fn a_closed_pool_is_fatal_and_not_retried() {
    let db = setup().await.with_retry_policy(RetryPolicy::fixed(3, Duration::from_secs(60)));
    insert_orders(&db, "alice", &["79927398713"]).await;
    let o = order(&db, "79927398713").await;
    db.close().await;
    let started = std::time::Instant::now();
    let err = db.apply(&decision(&o, OrderStatusType::Processed, 500)).await.unwrap_err();
    assert!(matches!(err, SettlementError::PoolClosed), "{err}");
    assert!(err.is_fatal());
    // No retry delay was taken
    assert!(started.elapsed() < Duration::from_secs(30));
}
