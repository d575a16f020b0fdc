//! # chatarchive CLI
//!
//! Command-line interface for the chatarchive library.

use std::process;
use std::time::Instant;

use clap::Parser as ClapParser;
use tracing_subscriber::{EnvFilter, fmt};

use chatarchive::cli::Args;
use chatarchive::export::Exporter;
use chatarchive::source::JsonDumpSource;
use chatarchive::{ExportError, ExportResult};

#[tokio::main]
async fn main() {
    let args = <Args as ClapParser>::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(result) if result.success => {}
        Ok(result) => {
            eprintln!("❌ Export failed: {}", result.error.unwrap_or_default());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            process::exit(1);
        }
    }
}

/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(if verbose { "debug" } else { "info" }),
    };

    fmt::Subscriber::builder()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}

async fn run(args: Args) -> Result<ExportResult, ExportError> {
    let started = Instant::now();
    let dump = args.dump.clone();

    println!("📦 chatarchive v{}", env!("CARGO_PKG_VERSION"));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("💬 Chat:    {}", args.chat);
    println!("📂 Dump:    {}", dump.display());
    println!("💾 Output:  {}", args.output.display());
    println!();

    let config = args.into_config()?;
    let source = JsonDumpSource::open(&dump).await?;
    let result = Exporter::new(source).export(&config).await;

    if result.success {
        println!("✅ Done in {:.2}s", started.elapsed().as_secs_f64());
        println!("   Topics:   {}", result.total_topics);
        println!("   Messages: {}", result.total_messages);
        println!("   Media:    {}", result.media_count);
        println!("   Saved to: {}", result.output_path.display());
    }
    Ok(result)
}
