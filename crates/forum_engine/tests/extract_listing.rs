mod common;

use common::fixture;
use forum_engine::{ExtractSettings, ForumExtractor, ParseError};
use pretty_assertions::assert_eq;

#[test]
fn listing_fixture_yields_three_threads() {
    let page = ForumExtractor::default()
        .extract_listing(&fixture("listing.html"))
        .expect("listing parses");

    let ids: Vec<&str> = page.threads.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["1001", "1002", "1003"]);
    assert_eq!(page.skipped_rows, 1);
}

#[test]
fn thread_row_fields() {
    let page = ForumExtractor::default()
        .extract_listing(&fixture("listing.html"))
        .expect("listing parses");
    let first = &page.threads[0];

    assert_eq!(first.title, "测试帖子标题一");
    assert_eq!(first.author_name, "作者甲");
    assert_eq!(first.author_uid, "501");
    assert_eq!(first.post_date, "2024-1-15");
    assert_eq!(first.reply_count, 42);
    assert_eq!(first.view_count, 1024);
    assert_eq!(first.last_poster_name, "回复者乙");
    assert_eq!(first.last_post_time, "2024-1-16 08:30");
    assert_eq!(first.thread_page_count, 3);
}

#[test]
fn missing_author_link_uses_sentinels() {
    let page = ForumExtractor::default()
        .extract_listing(&fixture("listing.html"))
        .expect("listing parses");
    let anonymous = &page.threads[2];

    assert_eq!(anonymous.author_name, "Unknown");
    assert_eq!(anonymous.author_uid, "0");
    assert_eq!(anonymous.thread_page_count, 1);
}

#[test]
fn pagination_reads_the_last_label() {
    let page = ForumExtractor::default()
        .extract_listing(&fixture("listing.html"))
        .expect("listing parses");

    assert_eq!(page.current_page, 1);
    assert_eq!(page.last_page, 5);
    assert_eq!(
        page.next_page_locator.as_deref(),
        Some("forumdisplay.php?fid=2&page=2")
    );
    assert!(page.has_next());
}

#[test]
fn last_page_has_no_next_locator() {
    let html = r#"<html><body>
        <div class="pages"><a href="forumdisplay.php?fid=2&amp;page=4">4</a><strong>5</strong></div>
        <table><tbody id="normalthread_9"><tr><th><span id="thread_9"><a href="viewthread.php?tid=9">末页帖子</a></span></th></tr></tbody></table>
        </body></html>"#;

    let page = ForumExtractor::default().extract_listing(html).expect("listing parses");

    assert_eq!(page.current_page, 5);
    assert_eq!(page.last_page, 5);
    assert_eq!(page.next_page_locator, None);
    assert_eq!(page.threads[0].title, "末页帖子");
}

#[test]
fn short_listing_keeps_its_next_locator() {
    let html = r#"<html><body>
        <div class="pages"><strong>1</strong><a href="forumdisplay.php?fid=7&amp;page=2">2</a><a class="next" href="forumdisplay.php?fid=7&amp;page=2">下一页</a></div>
        <table><tbody id="normalthread_9"><tr><th><span id="thread_9"><a href="viewthread.php?tid=9">短版块帖子</a></span></th></tr></tbody></table>
        </body></html>"#;

    let page = ForumExtractor::default().extract_listing(html).expect("listing parses");

    assert_eq!(page.last_page, 2);
    assert_eq!(
        page.next_page_locator.as_deref(),
        Some("forumdisplay.php?fid=7&page=2")
    );
    assert!(page.has_next());
}

#[test]
fn login_page_is_a_structural_failure() {
    let html = "<html><body><form id=\"loginform\"><input name=\"username\"/></form></body></html>";

    let err = ForumExtractor::default().extract_listing(html).unwrap_err();

    assert!(matches!(err, ParseError::Structural { .. }), "got {err:?}");
    assert!(err.excerpt().unwrap_or_default().contains("loginform"));
}

#[test]
fn empty_listing_is_allowed_when_configured() {
    let settings = ExtractSettings {
        min_listing_rows: 0,
        ..ExtractSettings::default()
    };
    let extractor = ForumExtractor::new(Default::default(), settings);

    let page = extractor.extract_listing("").expect("empty listing accepted");

    assert!(page.threads.is_empty());
    assert_eq!(page.current_page, 1);
    assert_eq!(page.last_page, 1);
}
