use std::sync::OnceLock;

use forum_core::{ListingPage, ThreadSummary};
use forum_logging::forum_debug;
use scraper::{ElementRef, Html, Selector};

use super::rules::{
    anchor, element_text, id_suffix, page_param, pages_block, query_param, selector, Pagination,
};
use super::{ExtractSettings, ParseError};

const UNKNOWN_AUTHOR: &str = "Unknown";

struct ListingSelectors {
    rows: Selector,
    thread_span: Selector,
    author_cell: Selector,
    author_link: Selector,
    em: Selector,
    nums_cell: Selector,
    strong: Selector,
    last_post_cell: Selector,
    last_poster: Selector,
    last_post_time: Selector,
    thread_pages: Selector,
}

fn selectors() -> &'static ListingSelectors {
    static SELECTORS: OnceLock<ListingSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| ListingSelectors {
        rows: selector("tbody[id^=normalthread_]"),
        thread_span: selector("span[id^=thread_]"),
        author_cell: selector("td.author"),
        author_link: selector(r#"cite a[href^="space.php?uid="]"#),
        em: selector("em"),
        nums_cell: selector("td.nums"),
        strong: selector("strong"),
        last_post_cell: selector("td.lastpost"),
        last_poster: selector("cite a"),
        last_post_time: selector(r#"em a[href*="goto=lastpost"]"#),
        thread_pages: selector(r#"span.threadpages a[href*="page="]"#),
    })
}

pub(super) fn extract_listing(html: &str, settings: &ExtractSettings) -> Result<ListingPage, ParseError> {
    let document = Html::parse_document(html);
    let sel = selectors();

    let (pages, next) = Pagination::read(document.select(pages_block()).next());
    let current_page = pages.current;
    let last_page = pages.listing_last();

    let mut threads = Vec::new();
    let mut skipped_rows = 0;
    for row in document.select(&sel.rows) {
        match thread_row(row, sel) {
            Some(summary) => threads.push(summary),
            None => {
                skipped_rows += 1;
                forum_debug!(
                    "skipping listing row {} without thread id",
                    row.value().id().unwrap_or("?")
                );
            }
        }
    }

    if threads.len() < settings.min_listing_rows {
        return Err(ParseError::structural(
            format!(
                "found {} thread rows, expected at least {}",
                threads.len(),
                settings.min_listing_rows
            ),
            html,
            settings.excerpt_len,
        ));
    }

    Ok(ListingPage {
        threads,
        current_page,
        next_page_locator: next.filter(|_| current_page < last_page),
        last_page,
        skipped_rows,
    })
}

fn thread_row(row: ElementRef<'_>, sel: &ListingSelectors) -> Option<ThreadSummary> {
    let span = row.select(&sel.thread_span).next()?;
    let id = id_suffix(span.value().id()?, "thread_")?.to_string();

    let title = span.select(anchor()).next().map(element_text).unwrap_or_default();

    let author_cell = row.select(&sel.author_cell).next();
    let author_link = author_cell.and_then(|cell| cell.select(&sel.author_link).next());
    let author_name = author_link
        .map(element_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let author_uid = author_link
        .and_then(|link| link.value().attr("href"))
        .and_then(|href| query_param(href, "uid"))
        .filter(|uid| !uid.is_empty())
        .unwrap_or("0")
        .to_string();
    let post_date = first_text(author_cell, &sel.em);

    let nums = row.select(&sel.nums_cell).next();
    let reply_count = first_text(nums, &sel.strong).parse().unwrap_or(0);
    let view_count = first_text(nums, &sel.em).parse().unwrap_or(0);

    let last_post = row.select(&sel.last_post_cell).next();
    let last_poster_name = first_text(last_post, &sel.last_poster);
    let last_post_time = first_text(last_post, &sel.last_post_time);

    let thread_page_count = row
        .select(&sel.thread_pages)
        .filter_map(|link| link.value().attr("href"))
        .filter_map(page_param)
        .max()
        .unwrap_or(1)
        .max(1);

    Some(ThreadSummary {
        id,
        title,
        author_name,
        author_uid,
        post_date,
        reply_count,
        view_count,
        last_poster_name,
        last_post_time,
        thread_page_count,
    })
}

fn first_text(scope: Option<ElementRef<'_>>, selector: &Selector) -> String {
    scope
        .and_then(|scope| scope.select(selector).next())
        .map(element_text)
        .unwrap_or_default()
}
