//! qrscan - barcode scan sessions without a phone
//!
//! Binary entry point. Scanning logic lives in the workspace crates.

mod headless;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use qrscan_app::config::{init_config_dir, resolve_settings};

use headless::runner::{run_bridge, run_scan_images, working_dir, BridgeOptions};

/// qrscan - barcode scan sessions without a phone
#[derive(Parser, Debug)]
#[command(name = "qrscan")]
#[command(about = "Headless barcode scan sessions and image decoding", long_about = None)]
struct Args {
    /// Settings file to use instead of .qrscan/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode codes from image files
    ScanImage {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Run one scan view as an NDJSON host bridge on stdin/stdout
    Bridge {
        /// Image played back as the camera preview
        #[arg(long, value_name = "IMAGE")]
        feed: PathBuf,

        /// Preview frames per second
        #[arg(long, default_value_t = 10)]
        fps: u32,

        /// Host view id, also selects the permission request code
        #[arg(long, default_value_t = 0)]
        view_id: i32,
    },

    /// Write a default .qrscan/config.toml in the current directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    qrscan_core::logging::init()?;

    let cwd = working_dir();
    let settings = resolve_settings(args.config.as_deref(), &cwd);

    match args.command {
        Command::ScanImage { paths } => {
            let failures = run_scan_images(&settings, &paths).await?;
            if failures > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Bridge { feed, fps, view_id } => {
            run_bridge(
                &settings,
                BridgeOptions {
                    feed,
                    fps,
                    view_id,
                },
            )
            .await?;
            Ok(())
        }
        Command::Init => {
            let path = init_config_dir(&cwd)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
    }
}
