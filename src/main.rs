use rusty_library_borrowing::{
    adapters::mock::{
        book_service::BookService as MockBookService,
        library_card_service::LibraryCardService as MockLibraryCardService,
    },
    adapters::postgres::{PostgresBorrowingReadModel, PostgresEventStore, PostgresStatisticsSource},
    adapters::rest::CatalogClient,
    api::{handlers::AppState, router::create_router},
    application::borrowing::ServiceDependencies,
    config::AppConfig,
    ports::{BookService, LibraryCardService},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // A missing .env file is fine, the environment may already be set
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Catalog of cards and books: REST when configured, in-memory otherwise
    let (card_service, book_service): (Arc<dyn LibraryCardService>, Arc<dyn BookService>) =
        match &config.catalog.url {
            Some(url) => {
                tracing::info!(%url, "Using REST catalog");
                let client = Arc::new(CatalogClient::new(
                    url.clone(),
                    config.catalog.token.clone(),
                )?);
                let cards: Arc<dyn LibraryCardService> = client.clone();
                let books: Arc<dyn BookService> = client;
                (cards, books)
            }
            None => {
                tracing::warn!("No catalog URL configured, using in-memory catalog");
                let cards: Arc<dyn LibraryCardService> = Arc::new(MockLibraryCardService::new());
                let books: Arc<dyn BookService> = Arc::new(MockBookService::new());
                (cards, books)
            }
        };

    // Create service dependencies
    let service_deps = ServiceDependencies {
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        borrowing_read_model: Arc::new(PostgresBorrowingReadModel::new(pool.clone())),
        card_service,
        book_service,
        statistics_source: Arc::new(PostgresStatisticsSource::new(pool)),
    };

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
