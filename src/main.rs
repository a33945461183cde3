use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use chatrelay::cli::{
    commands::{Cli, Commands},
    open_database, run_cli,
};
use chatrelay::config::AppConfig;
use chatrelay::db::ConversationStore;
use chatrelay::llm::{CompletionGateway, ProviderFactory};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        if let Err(e) = run_cli(cli.command, cli.config).await {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    info!("Starting chatrelay server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store: Arc<dyn ConversationStore> = match open_database(&config) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let llm: Arc<dyn CompletionGateway> = match ProviderFactory::create_default(&config) {
        Some(p) => p,
        None => {
            error!(
                "Failed to initialize completion backend for provider [{}]",
                config.llm.provider
            );
            std::process::exit(1);
        }
    };
    info!("Completion backend: {}", llm.name());

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(llm.clone()))
            .route("/health", web::get().to(health))
            .configure(chatrelay::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
