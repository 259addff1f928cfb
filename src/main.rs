use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use barcode_sheet::{compose_with_config, ComposeRequest, LayoutConfig};

/// Compose an A4 sheet from a barcode PDF, a text file and a label.
#[derive(Parser, Debug)]
#[command(name = "barcode_sheet")]
#[command(about = "Compose an A4 sheet from a barcode PDF, a text file and a label.", long_about = None)]
struct Args {
    /// PDF whose first page is the barcode graphic
    #[arg(short, long)]
    source: PathBuf,

    /// UTF-8 text file printed at the top of the sheet
    #[arg(short, long)]
    text: PathBuf,

    /// Label printed under the graphic, also used as the output file name
    #[arg(short, long)]
    label: String,

    /// Where `{label}.pdf` is written (defaults to the source PDF's directory)
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Print a JSON report instead of the output path
    #[arg(long)]
    json: bool,
}

fn run(args: Args) -> Result<()> {
    let request = ComposeRequest {
        source_pdf: args.source,
        text_file: args.text,
        label: args.label,
        out_dir: args.out_dir,
    };

    let report = compose_with_config(&request, &LayoutConfig::default())
        .with_context(|| format!("Failed to compose sheet for label {:?}", request.label))?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        println!("{}", report.output_path.display());
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
