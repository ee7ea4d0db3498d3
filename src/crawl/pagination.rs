use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use tracing::{debug, trace};

use crate::parser::listing::{absolute_url, Listing, ListingEntry};

/// Which slice of a board's history to crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPolicy {
    /// Every listing page, `index1` through the newest.
    FullBackfill,
    /// Posts dated on or after the cutoff, walking back from the newest page.
    Since(NaiveDate),
    /// Posts from one calendar year, scanning forward from `index1`.
    Year(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingPage {
    /// `index.html`, which also carries the pinned posts.
    Newest,
    Index(u32),
}

impl ListingPage {
    pub fn url(&self, base_url: &str, board: &str) -> String {
        match self {
            ListingPage::Newest => absolute_url(base_url, &format!("/bbs/{}/index.html", board)),
            ListingPage::Index(n) => {
                absolute_url(base_url, &format!("/bbs/{}/index{}.html", board, n))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Listing {
        board: String,
        page: ListingPage,
        url: String,
    },
    Article {
        board: String,
        url: String,
    },
}

impl Request {
    pub fn url(&self) -> &str {
        match self {
            Request::Listing { url, .. } | Request::Article { url, .. } => url,
        }
    }

    pub fn board(&self) -> &str {
        match self {
            Request::Listing { board, .. } | Request::Article { board, .. } => board,
        }
    }
}

/// Decides which pages to request next, given the listing pages seen so far.
///
/// Pure: no I/O, one frontier per board. Every URL is issued at most once
/// per controller, and once halted nothing further is issued.
pub struct PaginationController {
    policy: CrawlPolicy,
    base_url: String,
    issued: HashSet<String>,
    /// Highest listing index per board, learned from the newest page.
    last_index: HashMap<String, u32>,
    halted: bool,
}

impl PaginationController {
    pub fn new(policy: CrawlPolicy, base_url: impl Into<String>) -> Self {
        PaginationController {
            policy,
            base_url: base_url.into(),
            issued: HashSet::new(),
            last_index: HashMap::new(),
            halted: false,
        }
    }

    /// Every policy begins at the newest listing page.
    pub fn start(&mut self, boards: &[String]) -> Vec<Request> {
        let mut out = Vec::new();
        for board in boards {
            self.push_listing(&mut out, board, ListingPage::Newest);
        }
        out
    }

    pub fn on_listing(&mut self, board: &str, page: ListingPage, listing: &Listing) -> Vec<Request> {
        let mut out = Vec::new();
        if self.halted {
            return out;
        }

        // index.html is the same page as index{prev + 1}.html
        let last = listing.prev_page.map_or(1, |p| p + 1);
        if page == ListingPage::Newest {
            debug!("{} has {} listing pages", board, last);
            self.last_index.insert(board.to_string(), last);
        }

        match (self.policy, page) {
            (CrawlPolicy::FullBackfill, ListingPage::Newest) => {
                for n in 1..=last {
                    self.push_listing(&mut out, board, ListingPage::Index(n));
                }
            }
            (CrawlPolicy::FullBackfill, ListingPage::Index(_)) => {
                for entry in &listing.entries {
                    self.push_article(&mut out, board, entry);
                }
            }
            (CrawlPolicy::Since(cutoff), _) => {
                let mut reached_cutoff = false;
                for entry in listing.entries.iter().rev() {
                    if entry.posted.date() < cutoff {
                        reached_cutoff = true;
                        break;
                    }
                    self.push_article(&mut out, board, entry);
                }
                if reached_cutoff {
                    debug!("{}: reached {} on {:?}, not going further back", board, cutoff, page);
                } else if let Some(prev) = listing.prev_page {
                    self.push_listing(&mut out, board, ListingPage::Index(prev));
                }
            }
            (CrawlPolicy::Year(_), ListingPage::Newest) => {
                self.push_listing(&mut out, board, ListingPage::Index(1));
            }
            (CrawlPolicy::Year(target), ListingPage::Index(n)) => {
                for entry in &listing.entries {
                    let year = entry.posted.year();
                    if year > target {
                        break;
                    }
                    if year == target {
                        self.push_article(&mut out, board, entry);
                    }
                }

                // the page's last post decides whether the next page can still hold the target year
                let advance = listing
                    .entries
                    .last()
                    .map_or(true, |sentinel| sentinel.posted.year() <= target);
                let bound = self.last_index.get(board).copied().unwrap_or(n);
                if advance && n < bound {
                    self.push_listing(&mut out, board, ListingPage::Index(n + 1));
                }
            }
        }
        out
    }

    /// Stop issuing anything new; already issued requests are unaffected.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    fn push_listing(&mut self, out: &mut Vec<Request>, board: &str, page: ListingPage) {
        let url = page.url(&self.base_url, board);
        if self.issue(&url) {
            out.push(Request::Listing {
                board: board.to_string(),
                page,
                url,
            });
        }
    }

    fn push_article(&mut self, out: &mut Vec<Request>, board: &str, entry: &ListingEntry) {
        if self.issue(&entry.url) {
            trace!("{}: queue {:?} ({})", board, entry.title, entry.posted);
            out.push(Request::Article {
                board: board.to_string(),
                url: entry.url.clone(),
            });
        }
    }

    fn issue(&mut self, url: &str) -> bool {
        !self.halted && self.issued.insert(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.ptt.cc";

    fn entry(id: u32, y: i32, m: u32, d: u32) -> ListingEntry {
        ListingEntry {
            url: format!("{}/bbs/Test/M.{}.A.000.html", BASE, 1_500_000_000 + id),
            title: format!("post {}", id),
            posted: NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    fn listing(entries: Vec<ListingEntry>, prev_page: Option<u32>) -> Listing {
        Listing { entries, prev_page }
    }

    fn boards() -> Vec<String> {
        vec!["Test".to_string()]
    }

    fn listing_pages(reqs: &[Request]) -> Vec<ListingPage> {
        reqs.iter()
            .filter_map(|r| match r {
                Request::Listing { page, .. } => Some(*page),
                Request::Article { .. } => None,
            })
            .collect()
    }

    fn article_urls(reqs: &[Request]) -> Vec<&str> {
        reqs.iter()
            .filter(|r| matches!(r, Request::Article { .. }))
            .map(|r| r.url())
            .collect()
    }

    #[test]
    fn start_requests_newest_page() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        let reqs = c.start(&boards());
        assert_eq!(
            reqs,
            vec![Request::Listing {
                board: "Test".into(),
                page: ListingPage::Newest,
                url: "https://www.ptt.cc/bbs/Test/index.html".into(),
            }]
        );
    }

    #[test]
    fn full_backfill_enumerates_every_page() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        c.start(&boards());
        let reqs = c.on_listing("Test", ListingPage::Newest, &listing(vec![entry(9, 2020, 1, 1)], Some(4)));
        assert_eq!(listing_pages(&reqs), (1..=5).map(ListingPage::Index).collect::<Vec<_>>());
        assert_eq!(reqs[4].url(), "https://www.ptt.cc/bbs/Test/index5.html");
        assert!(article_urls(&reqs).is_empty());

        let page = listing(vec![entry(1, 2010, 1, 1), entry(2, 2010, 1, 2)], None);
        let reqs = c.on_listing("Test", ListingPage::Index(1), &page);
        assert_eq!(article_urls(&reqs).len(), 2);
        assert!(listing_pages(&reqs).is_empty());
    }

    #[test]
    fn single_page_board_backfills_index1() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        let reqs = c.on_listing("Test", ListingPage::Newest, &listing(vec![], None));
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(1)]);
    }

    #[test]
    fn since_walks_newest_first_and_stops_at_cutoff() {
        let cutoff = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let mut c = PaginationController::new(CrawlPolicy::Since(cutoff), BASE);
        let page = listing(
            vec![
                entry(1, 2019, 12, 30),
                entry(2, 2020, 1, 1),
                entry(3, 2020, 1, 2),
                entry(4, 2020, 1, 3),
            ],
            Some(9),
        );
        let reqs = c.on_listing("Test", ListingPage::Newest, &page);
        assert_eq!(
            article_urls(&reqs),
            vec![page.entries[3].url.as_str(), page.entries[2].url.as_str()]
        );
        assert!(listing_pages(&reqs).is_empty(), "older page must not be requested");
    }

    #[test]
    fn since_follows_prev_page_while_all_posts_are_recent() {
        let cutoff = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut c = PaginationController::new(CrawlPolicy::Since(cutoff), BASE);
        let page = listing(vec![entry(1, 2020, 1, 1), entry(2, 2020, 1, 5)], Some(9));
        let reqs = c.on_listing("Test", ListingPage::Newest, &page);
        assert_eq!(article_urls(&reqs).len(), 2);
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(9)]);

        let page = listing(vec![entry(3, 2020, 1, 1)], Some(8));
        let reqs = c.on_listing("Test", ListingPage::Index(9), &page);
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(8)]);
    }

    #[test]
    fn year_scans_forward_from_first_page() {
        let mut c = PaginationController::new(CrawlPolicy::Year(2019), BASE);
        let reqs = c.on_listing("Test", ListingPage::Newest, &listing(vec![entry(99, 2021, 1, 1)], Some(2)));
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(1)]);
        assert!(article_urls(&reqs).is_empty());

        // sentinel < target: skip everything, advance
        let p1 = listing(vec![entry(1, 2017, 5, 1), entry(2, 2018, 12, 31)], None);
        let reqs = c.on_listing("Test", ListingPage::Index(1), &p1);
        assert!(article_urls(&reqs).is_empty());
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(2)]);

        // sentinel > target: take the target-year posts, stop
        let p2 = listing(
            vec![entry(3, 2018, 12, 31), entry(4, 2019, 1, 1), entry(5, 2020, 1, 1)],
            Some(1),
        );
        let reqs = c.on_listing("Test", ListingPage::Index(2), &p2);
        assert_eq!(article_urls(&reqs), vec![p2.entries[1].url.as_str()]);
        assert!(listing_pages(&reqs).is_empty());
    }

    #[test]
    fn year_sentinel_in_target_probes_next_but_never_past_last() {
        let mut c = PaginationController::new(CrawlPolicy::Year(2019), BASE);
        c.on_listing("Test", ListingPage::Newest, &listing(vec![], Some(1)));

        let p1 = listing(vec![entry(1, 2019, 3, 1), entry(2, 2019, 4, 1)], None);
        let reqs = c.on_listing("Test", ListingPage::Index(1), &p1);
        assert_eq!(article_urls(&reqs).len(), 2);
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(2)]);

        let p2 = listing(vec![entry(3, 2019, 5, 1)], Some(1));
        let reqs = c.on_listing("Test", ListingPage::Index(2), &p2);
        assert_eq!(article_urls(&reqs).len(), 1);
        assert!(listing_pages(&reqs).is_empty(), "index2 is the last page");
    }

    #[test]
    fn year_empty_page_advances() {
        let mut c = PaginationController::new(CrawlPolicy::Year(2019), BASE);
        c.on_listing("Test", ListingPage::Newest, &listing(vec![], Some(3)));
        let reqs = c.on_listing("Test", ListingPage::Index(1), &listing(vec![], None));
        assert_eq!(listing_pages(&reqs), vec![ListingPage::Index(2)]);
    }

    #[test]
    fn never_issues_a_url_twice() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        assert_eq!(c.start(&boards()).len(), 1);
        assert!(c.start(&boards()).is_empty());

        let newest = listing(vec![], Some(2));
        assert_eq!(c.on_listing("Test", ListingPage::Newest, &newest).len(), 3);
        assert!(c.on_listing("Test", ListingPage::Newest, &newest).is_empty());

        let page = listing(vec![entry(1, 2020, 1, 1), entry(1, 2020, 1, 1)], None);
        assert_eq!(c.on_listing("Test", ListingPage::Index(1), &page).len(), 1);
        assert_eq!(c.issued(), 5);
    }

    #[test]
    fn boards_have_separate_frontiers() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        let reqs = c.start(&["A".to_string(), "B".to_string()]);
        assert_eq!(reqs.iter().map(|r| r.board()).collect::<Vec<_>>(), vec!["A", "B"]);
        let a = c.on_listing("A", ListingPage::Newest, &listing(vec![], Some(1)));
        let b = c.on_listing("B", ListingPage::Newest, &listing(vec![], Some(2)));
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 3);
    }

    #[test]
    fn halt_stops_enqueuing() {
        let mut c = PaginationController::new(CrawlPolicy::FullBackfill, BASE);
        c.start(&boards());
        c.halt();
        assert!(c.on_listing("Test", ListingPage::Newest, &listing(vec![], Some(5))).is_empty());
        assert_eq!(c.issued(), 1);
    }
}
