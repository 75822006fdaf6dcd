use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::extract::{self, MissingCard, Selectors};
use crate::fetch::Fetch;
use crate::output::RecordSink;

pub struct RunOptions {
    pub start_url: String,
    /// Page budget; the walk stops early when the next-link runs out.
    pub pages: usize,
    pub max_price: Option<f64>,
    pub delay: Duration,
    pub on_missing: MissingCard,
}

/// Walk the next-link chain from `start_url`, streaming each page's records
/// into `sink` as they are produced. Returns the total record count.
///
/// Any fetch failure aborts the run immediately; pages already appended to
/// the sink stay written.
pub async fn run<F: Fetch, W: Write>(
    fetcher: &F,
    sink: &mut RecordSink<W>,
    selectors: &Selectors,
    opts: &RunOptions,
) -> Result<usize> {
    let mut total = 0usize;
    let mut cursor = opts.start_url.clone();

    for page_num in 1..=opts.pages {
        let markup = fetcher
            .fetch_page(&cursor)
            .await
            .with_context(|| format!("failed to fetch page {} ({})", page_num, cursor))?;
        let (records, next_url) =
            extract::extract_page(&markup, &cursor, selectors, opts.max_price, opts.on_missing)
                .with_context(|| format!("failed to extract page {} ({})", page_num, cursor))?;

        sink.append_page(&records)?;
        total += records.len();
        info!("fetched {}", cursor);
        println!("Page {}: {} rows", page_num, records.len());

        match next_url {
            // The walk continues; pause before the next request.
            Some(next) if page_num < opts.pages => {
                tokio::time::sleep(opts.delay).await;
                cursor = next;
            }
            // Budget reached: skip the trailing wait.
            Some(_) => break,
            // No next-link: the catalog is exhausted.
            None => break,
        }
    }

    Ok(total)
}

// ── Tests ──
