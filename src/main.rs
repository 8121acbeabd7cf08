use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ocr-decoder",
    version,
    about = "Read alphanumeric text from images over HTTP"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve POST /decode/
    Serve {
        /// Listen address (overrides [server] addr)
        #[arg(short = 'a', long = "addr")]
        addr: Option<String>,
    },
    /// Decode a single image file and print the cleaned text
    Decode {
        /// Image file (png, jpeg, gif, webp, bmp, tiff)
        file: PathBuf,
    },
    /// Show languages installed for the OCR engine and exit
    Languages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_decoder::logging::init(cli.verbose)?;
    let mut settings = ocr_decoder::settings::load_settings(cli.read_settings.as_deref())?;

    match cli.command {
        Commands::Serve { addr } => {
            if let Some(addr) = addr {
                settings.server_addr = addr;
            }
            ocr_decoder::server::run_server(settings).await
        }
        Commands::Decode { file } => {
            let text = tokio::task::spawn_blocking(move || {
                ocr_decoder::decode_file(&file, &settings)
            })
            .await??;
            println!("{}", text);
            Ok(())
        }
        Commands::Languages => {
            let languages = ocr_decoder::ocr::list_tesseract_languages(&settings.tesseract_path)?;
            for language in languages {
                println!("{}", language);
            }
            Ok(())
        }
    }
}
