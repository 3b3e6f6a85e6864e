use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use instudio_events::config::AppConfig;
use instudio_events::domain::reservation::ReservationApplication;
use instudio_events::event_sourcing::store::{self, InstrumentedEventStore};
use instudio_events::metrics::EventStoreMetrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    // RUST_LOG overrides the configured filter
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level)),
        )
        .init();

    tracing::info!("🚀 Starting InStudio reservations demo");
    tracing::info!(
        module = ?config.persistence.module,
        sqlite_dbname = %config.persistence.sqlite_dbname,
        "Persistence configured"
    );

    // === 1. Event store, wrapped with Prometheus metrics ===
    let metrics = Arc::new(EventStoreMetrics::new()?);
    let backend = store::connect(&config.persistence).await?;
    let event_store = Arc::new(InstrumentedEventStore::new(backend, metrics.clone()));
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    let app = ReservationApplication::with_store(event_store, &config);

    // === 2. Reservation lifecycle ===
    let reservation_id = app
        .create_reservation("Eduardo Ramón", "salon_123", "Corte de cabello")
        .await?;

    let view = app.get_reservation(reservation_id).await?;
    tracing::info!(
        client = %view.client_name,
        service = %view.service,
        status = %view.status,
        "Reservation loaded"
    );

    app.complete_reservation(reservation_id).await?;
    app.cancel_reservation_with_reason(reservation_id, Some("Client moved abroad".to_string()))
        .await?;

    let view = app.get_reservation(reservation_id).await?;
    tracing::info!(status = %view.status, "Reservation after complete and cancel");

    // === 3. Notification log, paged from the start ===
    let mut start = 1;
    loop {
        let page = app.notification_log().page(start, 2).await?;
        for notification in &page.items {
            println!("{}", serde_json::to_string(notification)?);
        }
        if !page.has_more {
            break;
        }
        start = page.next_start;
    }

    // === 4. Metrics snapshot ===
    let rendered = metrics.render()?;
    tracing::info!(lines = rendered.lines().count(), "📊 Metrics rendered");

    tracing::info!("🎉 Demo complete!");

    Ok(())
}
