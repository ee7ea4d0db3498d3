pub mod article;
pub mod classes;
pub mod content;
pub mod listing;
pub mod push;
pub mod year;

use chrono::NaiveDateTime;
use scraper::Html;
use tracing::{trace, warn};

use crate::error::ExtractError;
use crate::model::{Comment, Post, PushCount};
use crate::sink::keys::comment_key;
use push::PushOutcome;
use year::YearResolver;

pub type ArticleOutcome = Result<Post, ExtractError>;

/// Article page → Post: meta → body → pushes → year back-fill → record.
///
/// Post-level failures come back as `Err`; push-level failures are logged
/// against `url` and the push is left out.
pub fn extract_article(url: &str, html: &str, crawled: NaiveDateTime) -> ArticleOutcome {
    let doc = Html::parse_document(html);
    let meta = article::meta_fields(&doc);

    let author = meta
        .author
        .as_deref()
        .and_then(article::normalize_author)
        .ok_or(ExtractError::MissingAuthor)?;
    let published = meta
        .published
        .as_deref()
        .and_then(article::parse_published)
        .ok_or_else(|| ExtractError::MissingPublishTime(meta.published.clone()))?;
    let id = article::article_id_from_url(url)
        .ok_or_else(|| ExtractError::Malformed(format!("no article id in {:?}", url)))?;
    let board = article::board_name(&doc, url)
        .ok_or_else(|| ExtractError::Malformed("no board name".into()))?;
    let body = article::isolate_body(&doc)
        .ok_or_else(|| ExtractError::Malformed("no #main-content".into()))?;

    let ip = content::last_ipv4(&body);
    let normalized = content::normalize(&body);
    let comments = resolve_comments(url, &id, push::read_pushes(&doc), published, crawled);
    let count = PushCount::tally(&comments);

    Ok(Post {
        id,
        board,
        author,
        title: meta.title.unwrap_or_default(),
        content: normalized.content,
        quote: normalized.quote,
        ip,
        published,
        crawled,
        comments,
        count,
    })
}

/// Must see pushes in page order; the year resolver depends on it.
fn resolve_comments(
    url: &str,
    post_id: &str,
    pushes: Vec<PushOutcome>,
    published: NaiveDateTime,
    crawled: NaiveDateTime,
) -> Vec<Comment> {
    let mut resolver = YearResolver::new(published, crawled);
    let mut comments = Vec::with_capacity(pushes.len());

    for outcome in pushes {
        let push = match outcome {
            Ok(p) => p,
            Err(ExtractError::RenderDuplicatePush) => {
                trace!("skipping duplicate push on {}", url);
                continue;
            }
            Err(e) => {
                warn!("{} (url: {})", e, url);
                continue;
            }
        };

        let Some(resolved) = resolver.resolve(push.stamp) else {
            warn!(
                "{} (url: {})",
                ExtractError::UnparseableCommentTime {
                    author: push.author.clone(),
                    raw: format!("{:02}/{:02}", push.stamp.month, push.stamp.day),
                },
                url
            );
            continue;
        };

        comments.push(Comment {
            id: comment_key(post_id, &push.author, resolved),
            kind: push.kind,
            author: push.author,
            content: push.content,
            ip: push.ip,
            published: resolved,
            crawled,
            post_id: post_id.to_string(),
        });
    }

    comments
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PushType;
    use chrono::{Datelike, NaiveDate};

    const URL: &str = "https://www.ptt.cc/bbs/Gossiping/M.1577805007.A.1F3.html";

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn crawled() -> NaiveDateTime {
        at(2020, 3, 1, 12, 0, 0)
    }

    #[test]
    fn article_fixture() {
        let post = extract_article(URL, &fixture("article"), crawled()).unwrap();
        assert_eq!(post.id, "M.1577805007.A.1F3");
        assert_eq!(post.board, "Gossiping");
        assert_eq!(post.author, "alice");
        assert_eq!(post.title, "[問卦] 有沒有跨年的八卦?");
        assert_eq!(post.published, at(2019, 12, 31, 23, 10, 5));
        assert_eq!(post.crawled, crawled());
        assert_eq!(post.ip.as_deref(), Some("36.230.10.22"));
        assert_eq!(post.content, "跨年要去哪裡？\n有沒有推薦的地方");
        assert_eq!(
            post.quote.as_deref(),
            Some("※ 引述《bob (鮑伯)》之銘言：\n: 今年最後一天\n: 大家在幹嘛")
        );
    }

    #[test]
    fn comments_year_rollover() {
        let post = extract_article(URL, &fixture("article"), crawled()).unwrap();
        let got: Vec<(&str, NaiveDateTime)> = post
            .comments
            .iter()
            .map(|c| (c.author.as_str(), c.published))
            .collect();
        assert_eq!(
            got,
            vec![
                ("carol", at(2019, 12, 31, 23, 12, 0)),
                ("dave", at(2019, 12, 31, 23, 58, 0)),
                ("dave", at(2019, 12, 31, 23, 59, 0)),
                ("erin", at(2020, 1, 1, 0, 1, 0)),
                ("grace", at(2020, 2, 14, 20, 0, 0)),
            ]
        );
        assert!(post.comments.iter().all(|c| c.post_id == post.id));
        assert!(post.comments.iter().all(|c| c.crawled == crawled()));
    }

    #[test]
    fn comment_years_stay_within_crawl_year() {
        let post = extract_article(URL, &fixture("article"), at(2019, 12, 31, 23, 59, 59)).unwrap();
        assert!(post.comments.iter().all(|c| c.published.year() == 2019));
    }

    #[test]
    fn count_is_tally_of_kept_comments() {
        let post = extract_article(URL, &fixture("article"), crawled()).unwrap();
        assert_eq!(post.count, PushCount { agree: 3, neutral: 1, disagree: 1 });
        assert_eq!(post.count, PushCount::tally(&post.comments));
        assert_eq!(post.comments[1].kind, PushType::Disagree);
    }

    #[test]
    fn derived_comment_ids() {
        let post = extract_article(URL, &fixture("article"), crawled()).unwrap();
        assert_eq!(post.comments[0].id, "f120e5af15f00bdb");
        assert_eq!(post.comments[3].id, "46c8157cd952b650");
    }

    #[test]
    fn extraction_is_idempotent() {
        let html = fixture("article");
        let a = extract_article(URL, &html, crawled()).unwrap();
        let b = extract_article(URL, &html, crawled()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    // the crawl and parse drivers log the warning and count the drop
    #[test]
    fn missing_author_yields_nothing() {
        let r = extract_article(URL, &fixture("article_no_author"), crawled());
        assert_eq!(r, Err(ExtractError::MissingAuthor));
    }

    #[test]
    fn missing_time_yields_nothing() {
        let html = fixture("article").replace("Tue Dec 31 23:10:05 2019", "someday");
        let r = extract_article(URL, &html, crawled());
        assert_eq!(r, Err(ExtractError::MissingPublishTime(Some("someday".into()))));
    }

    #[test]
    fn wire_shape() {
        let post = extract_article(URL, &fixture("article"), crawled()).unwrap();
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["published"], "2019-12-31T23:10:05");
        assert_eq!(json["crawled"], "2020-03-01T12:00:00");
        assert_eq!(json["count"]["agree"], 3);
        assert_eq!(json["comments"][0]["type"], "agree");
        assert_eq!(json["comments"][0]["ip"], "111.71.127.174");
        assert!(json["comments"][4].get("ip").is_none());
    }
}
