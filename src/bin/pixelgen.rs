//! CLI for PixelGen - generate, upscale and manage image history.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pixelgen::{
    AspectRatio, Config, GeneratedImageRecord, GenerationController, HistoryStore,
    ImageRequestClient, PixelGenError, TerminalKeyPicker,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pixelgen")]
#[command(about = "Generate and upscale images from text prompts, with a local history")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// History file (defaults to PIXELGEN_HISTORY or the user data dir)
    #[arg(long, global = true)]
    history: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Regenerate an existing image at 4K
    Upscale(UpscaleArgs),

    /// List images in the history, newest first
    List,

    /// Delete an image from the history
    Delete {
        /// Id of the image to delete
        id: String,
    },

    /// Write an image to disk
    Export {
        /// Id of the image to export
        id: String,

        /// Target directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Delete every image from the history
    Clear,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Aspect ratio
    #[arg(short, long, value_enum, default_value = "1:1")]
    aspect_ratio: AspectRatioArg,
}

#[derive(Args)]
struct UpscaleArgs {
    /// Id of the image to upscale
    id: String,

    /// Ask for an API key on the terminal if none is configured
    #[arg(long)]
    pick_key: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Wide,
    #[value(name = "3:4")]
    Tall,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Wide => AspectRatio::Wide,
            AspectRatioArg::Tall => AspectRatio::Tall,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelgen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.history.clone() {
        config.history_path = path;
    }

    let history = HistoryStore::open(&config.history_path);
    if let Some(warning) = history.load_warning() {
        eprintln!("Warning: {warning}");
    }

    let credentials = Arc::new(config.credentials());
    let client = ImageRequestClient::new(Arc::new(config.backend()?), credentials.clone());
    let mut controller = GenerationController::new(client, history);

    match cli.command {
        Commands::Generate(args) => {
            controller.set_prompt(&args.prompt);
            let record = controller
                .generate(&args.prompt, args.aspect_ratio.into())
                .await;
            print_result(&controller, record, cli.json)?;
        }
        Commands::Upscale(args) => {
            if args.pick_key {
                controller =
                    controller.with_selector(Arc::new(TerminalKeyPicker::new(credentials)));
            }
            match controller.upscale(&args.id).await {
                Err(PixelGenError::CredentialSelectionCancelled) => {
                    eprintln!("Upscale cancelled.");
                }
                result => print_result(&controller, result, cli.json)?,
            }
        }
        Commands::List => list_records(&controller.records(), cli.json)?,
        Commands::Delete { id } => {
            if controller.delete(&id)? {
                println!("Deleted {id}");
            } else {
                println!("No image with id {id}");
            }
        }
        Commands::Export { id, dir } => {
            let record = controller
                .find(&id)
                .ok_or(PixelGenError::RecordNotFound(id))?;
            let path = record.export_to(&dir)?;
            println!("Exported {}", path.display());
        }
        Commands::Clear => {
            controller.clear_history()?;
            println!("History cleared");
        }
    }

    Ok(())
}

fn print_result(
    controller: &GenerationController,
    result: pixelgen::Result<GeneratedImageRecord>,
    json_output: bool,
) -> anyhow::Result<()> {
    let record = match result {
        Ok(record) => record,
        Err(e) => {
            let message = controller.error_message().unwrap_or_else(|| e.to_string());
            anyhow::bail!(message);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summary(&record))?);
    } else {
        println!(
            "Generated image {} ({}, {}) for prompt: {}",
            record.id, record.aspect_ratio, record.resolution_tier, record.prompt
        );
        println!("History: {} images", controller.records().len());
    }
    Ok(())
}

fn list_records(records: &[GeneratedImageRecord], json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let rows: Vec<_> = records.iter().map(summary).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No images generated yet");
        return Ok(());
    }

    println!("Recent creations ({} items):\n", records.len());
    for record in records {
        println!(
            "  {}  {:>4}  {}  {}",
            record.id,
            record.aspect_ratio.as_str(),
            record.resolution_tier,
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
        println!("    {}", record.prompt);
    }
    Ok(())
}

/// Record metadata without the (large) image payload.
fn summary(record: &GeneratedImageRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "prompt": record.prompt,
        "aspect_ratio": record.aspect_ratio.as_str(),
        "resolution": record.resolution_tier.as_str(),
        "created_at": record.created_at.to_rfc3339(),
        "file_name": record.download_file_name(),
    })
}
