use std::{env, path::PathBuf, process, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stem_studio::{
    separate, server::{run_server, AppState}, set_download_progress_callback, stem_files,
    AppConfig, EngineCache, ModelKind, Result,
};

#[derive(Parser)]
#[command(name = "stem-studio")]
#[command(about = "Audio stem separation with a web UI and CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate a single audio file into stems
    Split {
        #[arg(short, long, default_value = "test_song.mp3")]
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "2stems")]
        model: ModelKind,

        /// Root for the uploads/, output/ and static/ directories
        #[arg(short, long, default_value = ".")]
        base_dir: PathBuf,

        #[arg(long)]
        manifest_url: Option<String>,

        #[arg(short, long)]
        quiet: bool,
    },

    /// Run the upload web UI
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        listen: String,

        /// Root for the uploads/, output/ and static/ directories
        #[arg(short, long, default_value = ".")]
        base_dir: PathBuf,

        #[arg(long)]
        manifest_url: Option<String>,
    },

    /// List available model configurations
    Models,
}

fn main() {
    // A stale dylib override from another tool shadows the system
    // ONNX runtime.
    if env::var_os("ORT_DYLIB_PATH").is_some() {
        env::remove_var("ORT_DYLIB_PATH");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stem_studio=info,ort=error")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Split {
            input,
            model,
            base_dir,
            manifest_url,
            quiet,
        } => handle_split(input, model, base_dir, manifest_url, quiet),
        Commands::Serve {
            listen,
            base_dir,
            manifest_url,
        } => handle_serve(listen, base_dir, manifest_url),
        Commands::Models => handle_models(),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn handle_split(
    input: PathBuf,
    model: ModelKind,
    base_dir: PathBuf,
    manifest_url: Option<String>,
    quiet: bool,
) -> Result<()> {
    if !quiet {
        set_download_progress_callback(print_download_progress);

        eprintln!("🎛  stem-studio");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Input:  {}", input.display());
        eprintln!("Model:  {model}");
        eprintln!("Output: {}", base_dir.join("output").display());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!();
    }

    let cfg = AppConfig {
        manifest_url_override: manifest_url,
        ..AppConfig::new(base_dir)
    };
    cfg.ensure_dirs()?;

    let engines = EngineCache::with_manifest_override(cfg.manifest_url_override.clone());
    let out_dir = separate(&input, model, &engines, &cfg)?;
    let stems = stem_files(&out_dir)?;

    if quiet {
        for stem in &stems {
            println!("{}", stem.display());
        }
    } else {
        eprintln!();
        eprintln!("✅ Separation finished!");
        eprintln!();
        eprintln!("Stems:");
        for stem in &stems {
            eprintln!("  🎚  {}", stem.display());
        }
    }

    Ok(())
}

fn handle_serve(listen: String, base_dir: PathBuf, manifest_url: Option<String>) -> Result<()> {
    let cfg = AppConfig {
        listen_addr: listen,
        manifest_url_override: manifest_url,
        ..AppConfig::new(base_dir)
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_server(Arc::new(AppState::new(cfg))))
}

fn handle_models() -> Result<()> {
    eprintln!("📋 Available models");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for kind in ModelKind::ALL {
        let marker = if kind == ModelKind::TwoStems {
            " (default)"
        } else {
            ""
        };
        eprintln!("  • {kind}{marker}: {}", kind.stems().join(", "));
    }

    eprintln!();
    eprintln!("Use --model <name> to pick one");
    Ok(())
}

fn print_download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let percent = (downloaded as f64 / total as f64 * 100.0).round() as u64;
        eprint!(
            "\r📥 Downloading model: {:>3}% ({:.2} MB / {:.2} MB)",
            percent,
            downloaded as f64 / 1_000_000.0,
            total as f64 / 1_000_000.0
        );
        if downloaded >= total {
            eprintln!();
        }
    } else {
        eprint!(
            "\r📥 Downloading model: {:.2} MB",
            downloaded as f64 / 1_000_000.0
        );
    }
}
