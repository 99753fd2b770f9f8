use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(name = "multitune-audio-processor")]
#[command(about = "Stem separation job processor for Multitune", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the processor: job channel listener, recovery loop and health endpoint.
    Serve,

    /// Prepare a single quiz audio and exit.
    ProcessQuiz {
        /// Quiz audio id in the core API.
        #[arg(long)]
        quiz_audio_id: i64,

        /// Bearer token for the core API.
        #[arg(long, env = "CORE_API_TOKEN", hide_env_values = true)]
        jwt_token: String,
    },
}

impl Cli {
    /// Subcommand to run; `serve` when none is given
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
