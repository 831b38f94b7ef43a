use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "mynah")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Dispatches an automated participant into a meeting room and records it",
    long_about = "Mynah joins a third-party web meeting as an automated participant, records \
                  the virtual display with synchronized audio, and leaves when told to via a \
                  chat command, an exposed stop hook, or a safety timeout."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a meeting room and record it until stopped
    Record {
        /// Name of the meeting room to join
        #[arg(value_name = "ROOM")]
        room: String,

        /// Directory recordings are written to
        #[arg(long, default_value = "./recordings")]
        output_dir: PathBuf,

        /// Base URL of the meeting service
        #[arg(long, default_value = "https://meet.jit.si")]
        base_url: String,

        /// Display name shown to other participants
        #[arg(long, default_value = "Mynah Recorder")]
        display_name: String,

        /// Pulse sink whose monitor carries the meeting audio
        #[arg(long, default_value = "MynahSink")]
        audio_sink: String,

        /// Path to the Chrome binary (default: platform discovery)
        #[arg(long)]
        chrome_path: Option<PathBuf>,

        /// Path to the ffmpeg binary (default: $PATH lookup)
        #[arg(long)]
        ffmpeg_path: Option<PathBuf>,
    },

    /// Run the HTTP dispatch endpoint that spawns recorders on demand
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 3001)]
        port: u16,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Record {
            room,
            output_dir,
            base_url,
            display_name,
            audio_sink,
            chrome_path,
            ffmpeg_path,
        } => commands::record::execute(
            room,
            output_dir,
            base_url,
            display_name,
            audio_sink,
            chrome_path,
            ffmpeg_path,
        ),
        Commands::Serve { port } => commands::serve::execute(port),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mynah=debug,mynah_core=debug,mynah_browser=debug,mynah_capture=debug")
    } else {
        EnvFilter::new("mynah=info,mynah_core=info,mynah_browser=info,mynah_capture=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
