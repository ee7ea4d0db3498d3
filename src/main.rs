mod clock;
mod crawl;
mod db;
mod error;
mod model;
mod parser;
mod settings;
mod sink;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crawl::fetch::HttpFetcher;
use crawl::pagination::CrawlPolicy;
use settings::Settings;
use sink::jsonl::JsonlSink;
use sink::sqlite::SqliteSink;
use sink::{OutputRouter, Sink};

/// Boards that are listed but cannot be crawled.
const UNCRAWLABLE_BOARDS: &[&str] = &["ALLPOST"];

#[derive(Parser)]
#[command(name = "ptt_harvester", about = "PTT board crawler and article extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the board hierarchy and store every board in SQLite
    Boards {
        /// Class id to start from
        #[arg(long, default_value = "1")]
        root: String,
    },
    /// Crawl boards (default: posts since today)
    Crawl {
        /// Comma-separated board names, or "all" for every discovered board
        #[arg(short, long)]
        boards: String,
        /// Only posts on or after this date (YYYYMMDD)
        #[arg(long, value_parser = parse_since, conflicts_with_all = ["year", "full_backfill"])]
        since: Option<NaiveDate>,
        /// Only posts from this year
        #[arg(long, conflicts_with = "full_backfill")]
        year: Option<i32>,
        /// Every listing page the board has
        #[arg(long)]
        full_backfill: bool,
        #[arg(long, value_enum, default_value_t = SinkKind::Sqlite)]
        sink: SinkKind,
        /// Also save raw article HTML under this directory
        #[arg(long)]
        archive: Option<PathBuf>,
    },
    /// Extract saved article HTML (a file or a directory tree)
    Parse {
        path: PathBuf,
        #[arg(long, value_enum, default_value_t = SinkKind::Sqlite)]
        sink: SinkKind,
    },
    /// Show storage statistics
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkKind {
    Sqlite,
    Jsonl,
}

fn parse_since(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Boards { root } => {
            let fetcher = HttpFetcher::new(&settings)?;
            let boards =
                crawl::discover::discover_boards(&fetcher, &settings.base_url, &root).await?;
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let saved = db::save_boards(&conn, &boards)?;
            println!("Saved {} boards to {}", saved, settings.db_path.display());
            Ok(())
        }
        Commands::Crawl {
            boards,
            since,
            year,
            full_backfill,
            sink,
            archive,
        } => {
            let boards = resolve_boards(&boards, &settings)?;
            let policy = match (since, year, full_backfill) {
                (Some(date), _, _) => CrawlPolicy::Since(date),
                (_, Some(y), _) => CrawlPolicy::Year(y),
                (_, _, true) => CrawlPolicy::FullBackfill,
                _ => CrawlPolicy::Since(clock::site_now().date()),
            };
            info!("crawling {} boards with {:?}", boards.len(), policy);

            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = Arc::clone(&stop);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("interrupted, letting in-flight requests finish");
                        stop.store(true, Ordering::Relaxed);
                    }
                });
            }

            let opts = crawl::CrawlOptions {
                base_url: settings.base_url.clone(),
                boards,
                policy,
                concurrency: settings.concurrency,
                archive,
                stop,
            };
            let fetcher = Arc::new(HttpFetcher::new(&settings)?);
            let mut router = OutputRouter::new(make_sink(sink, &settings));
            let stats = crawl::run(fetcher, &mut router, &opts).await?;
            let routed = router.finish()?;
            println!(
                "Done: {} posts, {} comments across {} boards ({} dropped, {} not found, {} failed).",
                routed.posts, routed.comments, routed.boards, stats.dropped, stats.not_found, stats.failed
            );
            Ok(())
        }
        Commands::Parse { path, sink } => {
            let files = collect_html_files(&path)?;
            if files.is_empty() {
                println!("No .html files under {}", path.display());
                return Ok(());
            }
            println!("Parsing {} files...", files.len());
            let mut router = OutputRouter::new(make_sink(sink, &settings));
            let counts = parse_files(&files, &mut router)?;
            router.finish()?;
            counts.print();
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Boards:    {}", s.boards);
            println!("Crawled:   {}", s.crawled_boards);
            println!("Posts:     {}", s.posts);
            println!("Comments:  {}", s.comments);
            println!("Last run:  {}", s.last_crawled.as_deref().unwrap_or("-"));

            let top = db::fetch_board_counts(&conn, 10)?;
            if !top.is_empty() {
                println!("\n--- Busiest boards ---");
                for (board, n) in top {
                    println!("  {:<20} {:>8}", board, n);
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn make_sink(kind: SinkKind, settings: &Settings) -> Box<dyn Sink> {
    match kind {
        SinkKind::Sqlite => Box::new(SqliteSink::new(&settings.db_path)),
        SinkKind::Jsonl => Box::new(JsonlSink::new(&settings.jsonl_dir)),
    }
}

/// `all` reads every discovered board from the store.
fn resolve_boards(selector: &str, settings: &Settings) -> Result<Vec<String>> {
    let mut boards: Vec<String> = if selector.trim() == "all" {
        let conn = db::connect(&settings.db_path)?;
        db::init_schema(&conn)?;
        db::fetch_board_names(&conn)?
    } else {
        selector
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string)
            .collect()
    };

    boards.retain(|b| {
        let crawlable = !UNCRAWLABLE_BOARDS.contains(&b.as_str());
        if !crawlable {
            warn!("{} cannot be crawled, skipping", b);
        }
        crawlable
    });
    if boards.is_empty() {
        bail!("no boards to crawl (run 'boards' first to use 'all')");
    }
    Ok(boards)
}

fn collect_html_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(files);
    }
    let mut dirs = vec![path.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let p = entry?.path();
            if p.is_dir() {
                dirs.push(p);
            } else if p.extension().is_some_and(|e| e == "html") {
                files.push(p);
            }
        }
    }
    files.sort();
    Ok(files)
}

struct ParseCounts {
    posts: usize,
    comments: usize,
    merged_replies: usize,
    dropped: usize,
    unreadable: usize,
}

impl ParseCounts {
    fn print(&self) {
        println!(
            "Saved {} posts, {} comments ({} would fold into a previous reply by the same author). {} dropped, {} unreadable.",
            self.posts, self.comments, self.merged_replies, self.dropped, self.unreadable,
        );
    }
}

fn parse_files<S: Sink>(files: &[PathBuf], router: &mut OutputRouter<S>) -> Result<ParseCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let crawled = clock::site_now();
    let mut counts = ParseCounts {
        posts: 0,
        comments: 0,
        merged_replies: 0,
        dropped: 0,
        unreadable: 0,
    };

    for chunk in files.chunks(500) {
        let results: Vec<_> = chunk
            .par_iter()
            .map(|p| -> std::io::Result<parser::ArticleOutcome> {
                let html = std::fs::read_to_string(p)?;
                Ok(parser::extract_article(&p.to_string_lossy(), &html, crawled))
            })
            .collect();

        for (path, result) in chunk.iter().zip(results) {
            match result {
                Ok(Ok(post)) => {
                    counts.posts += 1;
                    counts.comments += post.comments.len();
                    counts.merged_replies +=
                        post.comments.len() - parser::push::merge_consecutive(&post.comments).len();
                    router.route(&post)?;
                }
                Ok(Err(e)) => {
                    warn!("{} (file: {})", e, path.display());
                    counts.dropped += 1;
                }
                Err(e) => {
                    warn!("reading {}: {}", path.display(), e);
                    counts.unreadable += 1;
                }
            }
        }
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
