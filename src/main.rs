use tokio::net::TcpListener;
use tracing::{error, info};
use tripsheet::config::AppConfig;
use tripsheet::db::init_pool;
use tripsheet::error::AppError;
use tripsheet::routes::create_router;
use tripsheet::services::{
    counters::CounterStore, invoices::InvoiceAllocator, trips::TripRepository,
};
use tripsheet::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let config = AppConfig::from_env()?;
    let db = init_pool(&config.database_url).await?;

    if let Err(err) = sqlx::migrate!("./migrations").run(&db).await {
        error!("migration failed: {err:?}");
        return Err(AppError::Other(err.into()));
    }

    let counters = CounterStore::new(db.clone());
    let invoices = InvoiceAllocator::new(counters, config.invoice_prefix.clone());
    let trips = TripRepository::new(db.clone());

    let state = AppState::new(config.clone(), db, trips, invoices);
    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tripsheet=debug".into());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
