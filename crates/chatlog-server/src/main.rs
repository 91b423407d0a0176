//! Chatlog: local capture service for the chat transcript extension.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use chatlog_capture::Transcript;
use chatlog_core::{CaptureConfig, DataPaths};
use chatlog_export::{ExportError, ExportKind};
use chatlog_store::JsonFileStore;

mod routes;
mod state;

use state::AppState;

fn resolve_data_dir() -> PathBuf {
    std::env::var("CHATLOG_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()));
            if let Some(dir) = exe_dir {
                let parent_data = dir.join("../data");
                if parent_data.exists() {
                    return parent_data;
                }
            }
            PathBuf::from("data")
        })
}

fn open_store() -> anyhow::Result<JsonFileStore> {
    let paths = DataPaths::new(resolve_data_dir())?;
    JsonFileStore::open(&paths.storage_file)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))
}

fn print_help() {
    println!("Chatlog: capture ChatGPT conversations to Markdown");
    println!();
    println!("Usage: chatlog [command]");
    println!();
    println!("Commands:");
    println!("  (none)                     Start the capture service");
    println!("  export <questions|full> [out-dir]");
    println!("                             Write today's Markdown export");
    println!("  clear                      Remove all captured messages");
    println!("  help                       Show this help message");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "export" => {
                let Some(kind) = args.get(2) else {
                    eprintln!("Usage: chatlog export <questions|full> [out-dir]");
                    std::process::exit(1);
                };
                let kind: ExportKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
                let out_dir = args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

                let store = open_store()?;
                let today = chrono::Local::now().date_naive();
                match chatlog_export::write_export(&store, kind, &out_dir, today) {
                    Ok(path) => println!("{}", path.display()),
                    Err(ExportError::NoData) => {
                        eprintln!("No data to export.");
                        std::process::exit(1);
                    }
                    Err(e) => return Err(e.into()),
                }
                return Ok(());
            }
            "clear" => {
                let store = open_store()?;
                Transcript::clear(&store)?;
                println!("All captured messages removed.");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'chatlog help' for usage.", args[1]);
                std::process::exit(1);
            }
        }
    }

    // Normal server startup
    let data_dir = resolve_data_dir();
    info!("Data directory: {}", data_dir.display());

    let paths = DataPaths::new(&data_dir)?;
    let config = CaptureConfig::from_env(&paths)?;
    let port = config.port;

    let state = Arc::new(AppState::new(config, paths)?);
    info!("Capture session {} started", state.session.id());

    let app = routes::build_router(state.clone());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Chatlog server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
