use clap::Parser;
use log::{info, LevelFilter};
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;

use speech_relay::server;
use speech_relay::transcription::backends::google::DEFAULT_ENDPOINT;
use speech_relay::transcription::{TranscriptionConfig, TranscriptionManager};

#[derive(Parser, Debug)]
#[command(name = "speech-relay")]
#[command(version)]
#[command(about = "Streams uploaded audio to a speech recognizer and relays transcripts", long_about = None)]
struct Cli {
    #[arg(long, env = "HOST", default_value_t = String::from("0.0.0.0"))]
    host: String,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[arg(long, env = "SPEECH_ENDPOINT", default_value_t = String::from(DEFAULT_ENDPOINT))]
    speech_endpoint: String,

    /// off, error, warn, info, debug or trace
    #[arg(short, long, env = "LOG_LEVEL", default_value_t = LevelFilter::Info)]
    level: LevelFilter,
}

fn init_logger(level: LevelFilter) {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, level)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.level);

    let manager = Arc::new(TranscriptionManager::new(TranscriptionConfig::google(
        &cli.speech_endpoint,
    ))?);

    let listener = TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    info!("Starting speech relay on {}", listener.local_addr()?);

    server::serve(listener, manager, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C, shutting down");
    })
    .await?;

    info!("Speech relay is gracefully down");
    Ok(())
}
