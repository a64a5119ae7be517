use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use wedding_board::openapi::ApiDoc;
use wedding_board::repo::Repo;
use wedding_board::{config, seed, AppConfig, AppState, SecurityHeaders};

#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use wedding_board::repo::inmem::InMemRepo;
    info!("Using in-memory repository backend (snapshot dir '{}')", cfg.data_dir.display());
    let repo = InMemRepo::open(cfg.data_dir.clone()).context("failed to open snapshot store")?;
    Ok(Arc::new(repo))
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use sqlx::postgres::PgPoolOptions;
    use wedding_board::repo::pg::PgRepo;

    let db_url = cfg.database_url.as_deref().context("DATABASE_URL must be set for postgres-store")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("failed to connect to Postgres")?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.context("failed to run migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(repo))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration")?;
    info!("Bootstrapping wedding board server");
    info!("Frontend URL: {}", cfg.frontend_url.as_deref().unwrap_or("(none)"));

    let repo = build_repo(&cfg).await?;
    seed::seed(repo.as_ref(), cfg.seed_demo_users).await.context("failed to seed default data")?;

    let state = web::Data::new(AppState::new(repo));
    let openapi = ApiDoc::openapi();
    let security = SecurityHeaders::default().with_hsts(cfg.enable_hsts);
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let mut cors = Cors::default()
            // local dev frontends
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);
        if let Some(front) = frontend_url.as_deref() {
            cors = cors.allowed_origin(front);
        }

        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.middleware())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}
