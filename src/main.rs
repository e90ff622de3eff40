use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use loopgate::api::middleware::BasicAuth;
use loopgate::api::stream::StreamLimits;
use loopgate::cli::{
    commands::{Cli, Commands},
    run_cli,
};
use loopgate::config::AppConfig;
use loopgate::runner::ollama::OllamaRunner;
use loopgate::runner::speech::{SpeechSynth, SpeechToText};
use loopgate::runner::ProcessExecutor;
use loopgate::transcript::TranscriptStore;
use loopgate::wallet::WalletVault;
use std::sync::Arc;
use tracing::{error, info};

async fn index() -> impl Responder {
    let html = include_str!("../static/index.html");
    HttpResponse::Ok().content_type("text/html").body(html)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        run_cli(cli.command, cli.config).await;
        return Ok(());
    }

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = match TranscriptStore::open(&config.transcript.dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open transcript store: {}", e);
            std::process::exit(1);
        }
    };

    let executor: Arc<dyn ProcessExecutor> = Arc::new(OllamaRunner::new(&config.model));
    let speech = Arc::new(SpeechSynth::new(&config.speech));
    let stt = Arc::new(SpeechToText::new(&config.speech));
    let vault = Arc::new(WalletVault::new(&config.wallet));
    let limits = StreamLimits::from_config(&config.model);

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Local AI Server listening on {}:{}", host, port);
    info!("Model: {}", config.model.name);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(executor.clone()))
            .app_data(web::Data::new(speech.clone()))
            .app_data(web::Data::new(stt.clone()))
            .app_data(web::Data::new(vault.clone()))
            .app_data(web::Data::new(limits.clone()))
            .wrap(BasicAuth)
            .route("/", web::get().to(index))
            .configure(loopgate::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
