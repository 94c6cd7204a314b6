// src/main.rs
use load_it_now::api;
use load_it_now::catalog::ContainerCatalog;
use load_it_now::config::AppConfig;
use log::{error, info, warn};

#[tokio::main]
async fn main() {
    let dotenv_result = dotenvy::dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = dotenv_result {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            warn!("⚠️ Could not load .env: {}", err);
        }
    }

    let app_config = AppConfig::from_env();
    let catalog = ContainerCatalog::load_or_builtin(app_config.catalog.path());

    info!(
        "🚀 Loading service starting with {} container(s)...",
        catalog.len()
    );
    if let Err(err) = api::start_api_server(
        app_config.api.clone(),
        app_config.optimizer.clone(),
        catalog,
    )
    .await
    {
        error!("❌ API server terminated with an error: {err}");
        std::process::exit(1);
    }
}
