use actix::prelude::*;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod domain;
mod event_sourcing;
mod metrics;
mod notifications;
mod utils;

use config::AppConfig;
use domain::order::{ActorId, AssignmentCoordinator, NewOrder, OrderQueries, OrderStore};
use notifications::{
    BroadcastSink, DeadLetterActor, EventSubscriber, Flush, GetDeadLetterStats, GetDeadLetters,
    GetSinkHealth, LogSink, NoopHook, NotificationDispatcher, NotificationHook, RedisSink,
};

#[actix::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // RUST_LOG wins over the configured filter
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter))
        )
        .init();

    tracing::info!("🚀 Starting loader dispatch order service");

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    // Metrics HTTP server on its own thread and runtime
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || match tokio::runtime::Runtime::new() {
        Ok(rt) => rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        }),
        Err(e) => tracing::error!("Failed to start metrics runtime: {}", e),
    });

    // === 2. Notification pipeline ===
    let dead_letters = DeadLetterActor::new(config.dead_letter_capacity).start();

    let broadcast = Arc::new(BroadcastSink::new(config.broadcast_capacity));
    let mut subscriber = EventSubscriber::new(broadcast.subscribe(), config.subscriber_finished_window);

    let mut dispatcher = NotificationDispatcher::new(config.retry_config(), config.circuit_breaker_config())
        .with_metrics(metrics.clone())
        .with_dead_letters(dead_letters.clone())
        .with_sink(Arc::new(LogSink))
        .with_sink(broadcast);

    if let Some(url) = &config.redis_url {
        match RedisSink::new(url, &config.redis_channel) {
            Ok(sink) => dispatcher = dispatcher.with_sink(Arc::new(sink)),
            Err(e) => tracing::warn!(error = %e, "Redis sink disabled"),
        }
    }

    let dispatcher = dispatcher.start();

    // Stands in for a live socket client
    let live_client = actix::spawn(async move {
        while let Some(event) = subscriber.next().await {
            tracing::debug!(
                order_id = %event.order_id,
                to_status = %event.to_status,
                "📱 Live client notified"
            );
        }
    });

    // === 3. Order store and coordinator ===
    let hook: Arc<dyn NotificationHook> = if config.notifications_enabled {
        Arc::new(dispatcher.clone())
    } else {
        tracing::warn!("Lifecycle notifications disabled");
        Arc::new(NoopHook)
    };
    let store = Arc::new(OrderStore::new(config.schedule_grace()).with_hook(hook));
    let coordinator = AssignmentCoordinator::new(store.clone()).with_metrics(metrics.clone());
    let queries = OrderQueries::new(store.clone());

    // === 4. Demonstrate the order lifecycle ===
    tracing::info!("📝 Demonstrating order lifecycle");

    let dispatcher_id = ActorId::new();
    let loader_1 = ActorId::new();
    let loader_2 = ActorId::new();

    let o1 = coordinator
        .create(
            dispatcher_id,
            NewOrder {
                address: "Main St 1".to_string(),
                date_time: Utc::now() + Duration::hours(2),
                cargo_description: "Two-room apartment move".to_string(),
                price_per_hour: 500.0,
            },
        )
        .await?;

    coordinator.claim(o1.id, loader_1).await?;

    if let Err(e) = coordinator.claim(o1.id, loader_2).await {
        tracing::info!(error = %e, "Second loader lost the claim, as expected");
    }

    coordinator.complete(o1.id, loader_1).await?;

    let o2 = coordinator
        .create(
            dispatcher_id,
            NewOrder {
                address: "Harbor Rd 7".to_string(),
                date_time: Utc::now() + Duration::hours(5),
                cargo_description: "Pallets of tiles".to_string(),
                price_per_hour: 350.0,
            },
        )
        .await?;

    coordinator.cancel(o2.id, dispatcher_id).await?;

    if let Err(e) = coordinator.claim(o2.id, loader_2).await {
        tracing::info!(error = %e, "Cancelled order cannot be claimed");
    }

    // === 5. Read projections ===
    let available = queries.available().await;
    let loader_orders = queries.mine(loader_1).await;
    let loader_history = queries.history(loader_1).await;
    let dispatcher_orders = queries.created_by_me(dispatcher_id).await;
    let dispatcher_history = queries.history(dispatcher_id).await;
    tracing::info!(
        available = available.len(),
        loader_orders = loader_orders.len(),
        loader_history = loader_history.len(),
        dispatcher_orders = dispatcher_orders.len(),
        dispatcher_history = dispatcher_history.len(),
        "📋 Query views"
    );

    let replayed = store.replay(o1.id).await?;
    let events_logged = store.event_log().len().await;
    let orders_stored = store.len().await;
    tracing::info!(
        order_id = %replayed.id,
        status = %replayed.status,
        version = replayed.version,
        events_logged = events_logged,
        orders_stored = orders_stored,
        "🔁 Order rebuilt from event log"
    );

    // === 6. Drain notifications ===
    dispatcher.send(Flush).await?;
    for health in dispatcher.send(GetSinkHealth).await? {
        tracing::info!(
            sink = %health.sink,
            state = health.state.as_str(),
            consecutive_failures = health.consecutive_failures,
            "🔌 Sink health"
        );
    }

    let stats = dead_letters.send(GetDeadLetterStats).await?;
    tracing::info!(
        total = stats.total,
        evicted = stats.evicted,
        by_sink = ?stats.by_sink,
        "💀 Dead letters"
    );
    for letter in dead_letters.send(GetDeadLetters { limit: 10 }).await? {
        tracing::warn!(
            id = %letter.id,
            sink = %letter.sink,
            order_id = %letter.event.order_id,
            attempts = letter.attempts,
            error = %letter.error_message,
            failed_at = %letter.failed_at,
            "Undelivered notification"
        );
    }

    live_client.abort();

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
