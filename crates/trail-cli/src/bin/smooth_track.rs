//! Repair glitched altitudes in a stored or fetched track.
//!
//! Reads a track service response (single or bulk) or a bare sample array
//! and prints the smoothed positions as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use trail_cli::{fetch_track, parse_document, smooth_tracks};

/// Run the altitude smoother over a track
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON file with a track, bulk tracks or a sample array ("-" for stdin)
    #[arg(long, conflicts_with_all = ["url", "icao"])]
    input: Option<PathBuf>,

    /// Track service URL
    #[arg(long, requires = "icao")]
    url: Option<String>,

    /// Aircraft ICAO hex to fetch
    #[arg(long, requires = "url")]
    icao: Option<String>,

    /// Hours of history to fetch
    #[arg(long, default_value_t = 24)]
    hours: i64,

    /// Print a repair report per track to stderr
    #[arg(long)]
    report: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let args = Args::parse();

    let text = match (&args.input, &args.url, &args.icao) {
        (Some(path), _, _) if path.as_os_str() == "-" => {
            std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
        }
        (Some(path), _, _) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, Some(url), Some(icao)) => {
            eprintln!("Fetching {}h of history for {} from {}...", args.hours, icao, url);
            fetch_track(url, icao, args.hours)?
        }
        _ => bail!("Provide --input <file> or --url <track service> --icao <hex>"),
    };

    let outputs = smooth_tracks(parse_document(&text)?);

    if args.report {
        for output in &outputs {
            let name = output.hex.as_deref().unwrap_or("track");
            let r = &output.report;
            eprintln!(
                "{}: {} positions ({} dropped), invalid={} trailing={} leading={} interpolated={} median={} outliers={}+{}{}{}",
                name,
                output.positions.len(),
                output.dropped,
                r.invalid_count,
                r.trailing_repaired,
                r.leading_repaired,
                r.interpolated,
                r.median_fallbacks,
                r.outliers_replaced,
                r.second_pass_replaced,
                if r.high_altitude { " [high]" } else { "" },
                if r.degenerate { " [no valid reference]" } else { "" },
            );
        }
    }

    let json = if outputs.len() == 1 && outputs[0].hex.is_none() {
        // Bare array in, bare array out
        if args.pretty {
            serde_json::to_string_pretty(&outputs[0].positions)?
        } else {
            serde_json::to_string(&outputs[0].positions)?
        }
    } else if args.pretty {
        serde_json::to_string_pretty(&outputs)?
    } else {
        serde_json::to_string(&outputs)?
    };
    println!("{}", json);

    Ok(())
}
