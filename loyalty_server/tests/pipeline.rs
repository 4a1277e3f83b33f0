use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use accrual_tools::{AccrualApi, AccrualConfig};
use loyalty_engine::{
    db_types::{NewOrder, OrderId, OrderStatusType, Points},
    events::{EventHandlers, EventHooks, OrderSettledEvent},
    test_utils::prepare_env::fresh_database,
    AccountManagement,
    SettlementApi,
    SettlementError,
    SettlementStore,
    SqliteDatabase,
};
use loyalty_server::{
    errors::ReconcileError,
    reconciler::{Reconciler, ReconcilerConfig},
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path},
    Mock,
    MockServer,
    ResponseTemplate,
};

const PROCESSED_ORDER: &str = "79927398713";
const UNREGISTERED_ORDER: &str = "2377225624";

fn config() -> ReconcilerConfig {
    ReconcilerConfig { workers: 2, page_size: 10, poll_interval: Duration::from_millis(50) }
}

async fn accrual_service() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/orders/{PROCESSED_ORDER}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "order": PROCESSED_ORDER,
            "status": "PROCESSED",
            "accrual": 500
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/orders/{UNREGISTERED_ORDER}")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    server
}

async fn store_with_orders() -> SqliteDatabase {
    let db = fresh_database().await;
    db.insert_user("alice", "hash").await.unwrap();
    for id in [PROCESSED_ORDER, UNREGISTERED_ORDER] {
        db.insert_order(NewOrder::new(OrderId::from(id), "alice")).await.unwrap();
    }
    db
}

async fn status_of(db: &SqliteDatabase, id: &str) -> OrderStatusType {
    db.fetch_order(&OrderId::from(id)).await.unwrap().unwrap().status
}

#[tokio::test]
async fn orders_are_settled_against_the_accrual_service() {
    let server = accrual_service().await;
    let db = store_with_orders().await;

    let settled = Arc::new(AtomicUsize::new(0));
    let credited = Arc::new(AtomicI64::new(0));
    let mut hooks = EventHooks::default();
    let (s2, c2) = (settled.clone(), credited.clone());
    hooks.on_order_settled(move |ev: OrderSettledEvent| {
        let (settled, credited) = (s2.clone(), c2.clone());
        Box::pin(async move {
            settled.fetch_add(1, Ordering::SeqCst);
            credited.fetch_add(ev.credited().value(), Ordering::SeqCst);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(8, hooks);
    let api = SettlementApi::new(db.clone(), handlers.producers());
    let hook_tasks = handlers.start_handlers();

    let accrual = AccrualApi::new(AccrualConfig::new(&server.uri())).unwrap();
    let cancel = CancellationToken::new();
    let pipeline = Reconciler::new(api, accrual, config()).start(cancel.clone());

    let mut waited = Duration::ZERO;
    while status_of(&db, PROCESSED_ORDER).await != OrderStatusType::Processed {
        assert!(waited < Duration::from_secs(10), "The order was not settled in time");
        tokio::time::sleep(Duration::from_millis(50)).await;
        waited += Duration::from_millis(50);
    }
    // Give the pipeline a few more passes over the unregistered order
    tokio::time::sleep(Duration::from_millis(300)).await;
    cancel.cancel();
    pipeline.wait().await.unwrap();
    for task in hook_tasks {
        task.await.unwrap();
    }

    let order = db.fetch_order(&OrderId::from(PROCESSED_ORDER)).await.unwrap().unwrap();
    assert_eq!(order.accrual, Points::from_points(500));
    let balance = db.fetch_balance("alice").await.unwrap();
    assert_eq!(balance.current, Points::from_points(500));
    assert_eq!(balance.withdrawn, Points::default());

    assert_eq!(status_of(&db, UNREGISTERED_ORDER).await, OrderStatusType::New);
    let page = db.fetch_eligible(10, 0).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.orders[0].id.as_str(), UNREGISTERED_ORDER);

    assert_eq!(settled.load(Ordering::SeqCst), 1);
    assert_eq!(credited.load(Ordering::SeqCst), Points::from_points(500).value());
    let requests = server.received_requests().await.unwrap();
    let unregistered_lookups = requests.iter().filter(|r| r.url.path().ends_with(UNREGISTERED_ORDER)).count();
    assert!(unregistered_lookups >= 2, "only {unregistered_lookups} lookups");
}

#[tokio::test]
async fn an_unreachable_accrual_service_changes_nothing() {
    let db = store_with_orders().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let api = SettlementApi::new(db.clone(), Default::default());
    let accrual = AccrualApi::new(AccrualConfig::new(&address).with_request_timeout(Duration::from_secs(1))).unwrap();
    let cancel = CancellationToken::new();
    let pipeline = Reconciler::new(api, accrual, config()).start(cancel.clone());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!pipeline.is_shutting_down());
    cancel.cancel();
    pipeline.wait().await.unwrap();

    assert_eq!(db.fetch_eligible(10, 0).await.unwrap().total, 2);
    assert_eq!(db.fetch_balance("alice").await.unwrap().current, Points::default());
}

#[tokio::test]
async fn a_closed_store_stops_the_pipeline() {
    let server = accrual_service().await;
    let db = store_with_orders().await;
    db.close().await;

    let api = SettlementApi::new(db.clone(), Default::default());
    let accrual = AccrualApi::new(AccrualConfig::new(&server.uri())).unwrap();
    let cancel = CancellationToken::new();
    let pipeline = Reconciler::new(api, accrual, config());
    let result = tokio::time::timeout(Duration::from_secs(10), pipeline.run(cancel.clone()))
        .await
        .expect("The pipeline should stop on its own");
    let err = result.unwrap_err();
    assert!(matches!(err, ReconcileError::Store(SettlementError::PoolClosed)), "{err}");
    assert!(err.is_fatal());
    assert!(cancel.is_cancelled());
    assert!(server.received_requests().await.unwrap().is_empty());
}
