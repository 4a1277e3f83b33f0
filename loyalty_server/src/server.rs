use std::{future::Future, pin::Pin};

use accrual_tools::AccrualApi;
use log::*;
use loyalty_engine::{
    events::{EventHandlers, EventHooks, OrderSettledEvent},
    SettlementApi,
    SettlementStore,
    SqliteDatabase,
};
use tokio::{signal, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{config::ServerConfig, errors::ServerError, reconciler::Reconciler};

const EVENT_BUFFER_SIZE: usize = 64;

/// Runs the reconciliation pipeline until Ctrl-C is pressed or the pipeline fails.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?
        .with_retry_policy(config.db_retry);
    info!("🚀️ Connected to the settlement store at {}", db.url());
    if config.run_migrations {
        db.run_migrations().await?;
    }
    let accrual = AccrualApi::new(config.accrual.clone())?;
    info!("🚀️ Using accrual service at {}", config.accrual.base_url);

    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, create_event_hooks());
    let producers = handlers.producers();
    let hook_tasks = handlers.start_handlers();

    let cancel = CancellationToken::new();
    let api = SettlementApi::new(db.clone(), producers);
    let pipeline = Reconciler::new(api, accrual, config.reconciler_config()).start(cancel.clone());
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

    cancel.cancelled().await;
    info!("🚀️ Waiting up to {:?} for in-flight orders to finish", config.shutdown_timeout);
    let result = match timeout(config.shutdown_timeout, pipeline.wait()).await {
        Ok(result) => result.map_err(ServerError::from),
        Err(_) => Err(ServerError::ShutdownTimeout(config.shutdown_timeout)),
    };
    // The hook tasks end once the pipeline has dropped its event producers
    for task in hook_tasks {
        if let Err(e) = task.await {
            warn!("🚀️ An event hook task failed. {e}");
        }
    }
    db.close().await;
    result
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    if let Err(e) = signal::ctrl_c().await {
        error!("🚀️ Could not listen for the shutdown signal. {e}");
        return;
    }
    info!("🚀️ Shutdown requested");
    cancel.cancel();
}

pub fn create_event_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_order_settled(|ev: OrderSettledEvent| {
        Box::pin(async move {
            let order = &ev.order;
            if ev.is_final() {
                info!(
                    "📦️ Order {} for {} is final: {} -> {}. {} credited",
                    order.id,
                    order.username,
                    ev.previous_status,
                    order.status,
                    ev.credited()
                );
            } else {
                debug!("📦️ Order {} for {} is now {}", order.id, order.username, order.status);
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}
