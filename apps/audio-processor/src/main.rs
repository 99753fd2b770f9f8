use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use multitune_audio_processor::app;
use multitune_audio_processor::cli::{Cli, Command};
use multitune_audio_processor::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multitune_audio_processor=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    match cli.command() {
        Command::Serve => {
            tracing::info!("Starting Multitune audio processor");
            app::serve(config).await?;
        }
        Command::ProcessQuiz {
            quiz_audio_id,
            jwt_token,
        } => {
            let url = app::process_quiz(config, quiz_audio_id, jwt_token).await?;
            tracing::info!(quiz_audio_id, %url, "Quiz audio ready");
        }
    }

    Ok(())
}
