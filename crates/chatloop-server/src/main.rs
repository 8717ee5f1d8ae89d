// chatloop server
// Loads configuration and the model catalog, then serves the chat API

mod logging;

use std::sync::Arc;

use chatloop_lib::services::chat::{ChatService, PromptLibrary};
use chatloop_lib::services::provider::{create_provider, ModelCatalog};
use chatloop_lib::services::server::{build_router, serve, ServerState};
use chatloop_lib::services::tools::ToolRegistry;
use chatloop_lib::utils::config::{config_path, load_config};

fn print_help() {
    println!("chatloop {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: chatloop [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -h, --help       Print this help");
    println!("  -v, --version    Print the version");
    println!();
    println!("Environment:");
    println!("  CHATLOOP_CONFIG      Configuration file (default: config.yml)");
    println!("  CHATLOOP_LOG_LEVEL   trace, debug, info, warn, error or off");
    println!("  OPENROUTER_TOKEN     Overrides tokens.openrouter");
    println!("  EXA_TOKEN            Overrides tokens.exa");
    println!("  GITHUB_TOKEN         Overrides tokens.github");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[server] Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    log::info!("[server] Shutdown requested");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("chatloop {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                eprintln!("Use --help for usage information");
                std::process::exit(1);
            }
        }
    }

    // .env is optional
    let _ = dotenvy::dotenv();

    let config = Arc::new(load_config(&config_path())?);

    let level = logging::init_logging(config.debug)?;
    log::info!("[server] chatloop {} (log level {})", env!("CARGO_PKG_VERSION"), level);

    let provider = create_provider(&config)?;

    log::info!("[server] Loading models...");
    let catalog = Arc::new(ModelCatalog::load(&*provider).await?);

    let prompts = match config.prompts_directory() {
        Some(directory) => PromptLibrary::load(&directory)?,
        None => PromptLibrary::builtin()?,
    };

    let tools = ToolRegistry::from_config(&config)?;

    let chat = ChatService::new(
        config.clone(),
        catalog,
        Arc::new(prompts),
        Arc::new(tools),
        provider,
    );

    let router = build_router(Arc::new(ServerState::new(Arc::new(chat))));

    serve(&config.server.address, router, shutdown_signal()).await?;

    Ok(())
}
