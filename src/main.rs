use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webm_capture::commands::{
    fix_duration::{self, FixDurationArgs},
    inspect::{self, InspectArgs},
    mux::{self, MuxArgs},
};

#[derive(Parser)]
#[command(name = "webm-capture", about = "Build and repair WebM screen recordings")]
struct AppArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the recording length into a finished WebM file
    FixDuration(FixDurationArgs),
    /// Print the element tree of a WebM file
    Inspect(InspectArgs),
    /// Build a WebM file from encoded frames listed in a manifest
    Mux(MuxArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match AppArgs::parse().command {
        Command::FixDuration(args) => {
            let report = fix_duration::run(args).await?;
            info!(output = ?report.output, patched = report.patch.is_some(), "Done");
        }
        Command::Inspect(args) => {
            inspect::run(args).await?;
        }
        Command::Mux(args) => {
            let report = mux::run(args).await?;
            info!(output = ?report.output, frames = report.frames, "Done");
        }
    }

    Ok(())
}
