mod crawl;
mod extract;
mod fetch;
mod output;
mod price;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use crate::crawl::RunOptions;
use crate::extract::{MissingCard, Selectors};
use crate::fetch::HttpFetcher;
use crate::output::RecordSink;

#[derive(Parser)]
#[command(name = "book_scraper", about = "Books to Scrape catalog scraper")]
struct Cli {
    /// How many catalogue pages to scrape
    #[arg(long, default_value_t = 3)]
    pages: usize,

    /// Keep only items priced at or below this value; omit to disable
    #[arg(long)]
    max_price: Option<f64>,

    /// Output CSV filename
    #[arg(long, default_value = "books.csv")]
    out: PathBuf,

    /// Seconds to wait between page requests
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Starting catalogue URL
    #[arg(long, default_value = "https://books.toscrape.com/catalogue/page-1.html")]
    start_url: String,

    /// Output field delimiter; use ',' for US-style CSV
    #[arg(long, default_value_t = ';')]
    sep: char,

    /// Abort the run when a card is missing an expected element instead of skipping it
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let delimiter = u8::try_from(cli.sep)
        .map_err(|_| anyhow::anyhow!("--sep must be a single ASCII character"))?;

    let fetcher = HttpFetcher::new()?;
    let mut sink = RecordSink::create(&cli.out, delimiter)?;
    let options = RunOptions {
        start_url: cli.start_url,
        pages: cli.pages,
        max_price: cli.max_price,
        delay: Duration::from_secs_f64(cli.delay.max(0.0)),
        on_missing: if cli.strict { MissingCard::Fail } else { MissingCard::Skip },
    };

    let total = crawl::run(&fetcher, &mut sink, &Selectors::books_to_scrape(), &options).await?;

    println!("Saved {} rows to {}", total, cli.out.display());

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
