pub mod archive;
pub mod discover;
pub mod fetch;
pub mod pagination;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::clock;
use crate::error::ExtractError;
use crate::parser::listing::{parse_listing, Listing};
use crate::parser::{self, ArticleOutcome};
use crate::sink::{OutputRouter, Sink};
use fetch::PageFetcher;
use pagination::{CrawlPolicy, ListingPage, PaginationController, Request};

pub struct CrawlOptions {
    pub base_url: String,
    pub boards: Vec<String>,
    pub policy: CrawlPolicy,
    pub concurrency: usize,
    /// Save each article's raw HTML here as it is fetched.
    pub archive: Option<PathBuf>,
    /// Set from outside to stop enqueuing; in-flight pages still finish.
    pub stop: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub listings: usize,
    pub posts: usize,
    pub comments: usize,
    pub dropped: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// What one fetch task hands back to the driver.
enum Fetched {
    Listing {
        board: String,
        page: ListingPage,
        listing: Listing,
    },
    Article {
        url: String,
        outcome: ArticleOutcome,
    },
    Failed {
        url: String,
        error: anyhow::Error,
    },
}

struct TaskContext {
    fetcher: Arc<dyn PageFetcher>,
    semaphore: Semaphore,
    base_url: String,
    archive: Option<PathBuf>,
}

/// Drive one crawl to completion.
///
/// Fetching and extraction run in spawned tasks, bounded by a semaphore.
/// The pagination frontier and the router stay on this task, so every
/// board's destination has a single writer.
pub async fn run<S: Sink>(
    fetcher: Arc<dyn PageFetcher>,
    router: &mut OutputRouter<S>,
    opts: &CrawlOptions,
) -> Result<CrawlStats> {
    let ctx = Arc::new(TaskContext {
        fetcher,
        semaphore: Semaphore::new(opts.concurrency.max(1)),
        base_url: opts.base_url.clone(),
        archive: opts.archive.clone(),
    });
    let mut controller = PaginationController::new(opts.policy, &opts.base_url);
    let mut tasks = JoinSet::new();
    let mut stats = CrawlStats::default();
    let mut halted = false;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);

    for req in controller.start(&opts.boards) {
        tasks.spawn(fetch_request(Arc::clone(&ctx), req));
    }

    while let Some(joined) = tasks.join_next().await {
        if !halted && opts.stop.load(Ordering::Relaxed) {
            info!("stop requested, draining {} in-flight requests", tasks.len());
            controller.halt();
            halted = true;
        }

        let fetched = match joined {
            Ok(f) => f,
            Err(e) => {
                warn!("fetch task failed: {}", e);
                stats.failed += 1;
                continue;
            }
        };

        match fetched {
            Fetched::Listing { board, page, listing } => {
                stats.listings += 1;
                for req in controller.on_listing(&board, page, &listing) {
                    tasks.spawn(fetch_request(Arc::clone(&ctx), req));
                }
            }
            Fetched::Article { url, outcome } => match outcome {
                Ok(post) => {
                    router.route(&post)?;
                    stats.posts += 1;
                    stats.comments += post.comments.len();
                }
                Err(ExtractError::NotFound) => {
                    warn!("404: {}", url);
                    stats.not_found += 1;
                }
                Err(e) => {
                    warn!("{} (url: {})", e, url);
                    stats.dropped += 1;
                }
            },
            Fetched::Failed { url, error } => {
                warn!("giving up on {}: {:#}", url, error);
                stats.failed += 1;
            }
        }

        pb.set_message(format!(
            "{} listings, {} posts, {} in flight, {} issued",
            stats.listings,
            stats.posts,
            tasks.len(),
            controller.issued()
        ));
    }

    pb.finish_and_clear();
    info!(
        "crawl done: {} listings, {} posts ({} comments), {} dropped, {} not found, {} failed",
        stats.listings, stats.posts, stats.comments, stats.dropped, stats.not_found, stats.failed
    );
    Ok(stats)
}

async fn fetch_request(ctx: Arc<TaskContext>, req: Request) -> Fetched {
    let _permit = match ctx.semaphore.acquire().await {
        Ok(p) => p,
        Err(e) => {
            return Fetched::Failed {
                url: req.url().to_string(),
                error: e.into(),
            }
        }
    };

    let url = req.url().to_string();
    debug!("fetching {} ({})", url, req.board());
    let page = match ctx.fetcher.fetch(&url).await {
        Ok(p) => p,
        Err(error) => return Fetched::Failed { url, error },
    };

    match req {
        Request::Listing { board, page: which, .. } => {
            if page.status != 200 {
                return Fetched::Failed {
                    url,
                    error: anyhow!("listing returned status {}", page.status),
                };
            }
            let listing = parse_listing(&page.body, &ctx.base_url);
            Fetched::Listing {
                board,
                page: which,
                listing,
            }
        }
        Request::Article { .. } => {
            if page.status == 404 {
                return Fetched::Article {
                    url,
                    outcome: Err(ExtractError::NotFound),
                };
            }
            if page.status != 200 {
                return Fetched::Failed {
                    url,
                    error: anyhow!("article returned status {}", page.status),
                };
            }

            let outcome = parser::extract_article(&url, &page.body, clock::site_now());
            if let (Some(dir), Ok(post)) = (&ctx.archive, &outcome) {
                if let Err(e) = archive::archive_article(dir, post, &page.body).await {
                    warn!("archiving {} failed: {:#}", url, e);
                }
            }
            Fetched::Article { url, outcome }
        }
    }
}
