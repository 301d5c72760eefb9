use std::sync::OnceLock;

use forum_core::{ExtractMode, PostRecord, SiteConfig, ThreadPage};
use forum_logging::forum_debug;
use scraper::{ElementRef, Html, Selector};

use super::rich::RichContentWriter;
use super::rules::{
    element_text, find_post_root, id_suffix, pages_block, post_author, post_time, query_param,
    selector, strip_img_tags, Pagination,
};
use super::trim::trim_thread_html;
use super::{ExtractSettings, ParseError};

struct ThreadSelectors {
    post_form: Selector,
    messages: Selector,
}

fn selectors() -> &'static ThreadSelectors {
    static SELECTORS: OnceLock<ThreadSelectors> = OnceLock::new();
    SELECTORS.get_or_init(|| ThreadSelectors {
        post_form: selector("form#postform"),
        messages: selector("td.t_msgfont[id^=postmessage_]"),
    })
}

pub(super) fn extract_thread(
    html: &str,
    mode: ExtractMode,
    site: &SiteConfig,
    settings: &ExtractSettings,
) -> Result<ThreadPage, ParseError> {
    let trimmed = trim_thread_html(html, settings.trim_threshold);
    let document = Html::parse_document(&trimmed);
    let sel = selectors();

    let (pages, _) = Pagination::read(document.select(pages_block()).next());
    let current_page = pages.current;
    let last_page = pages.thread_last();

    let thread_id = document
        .select(&sel.post_form)
        .next()
        .and_then(|form| form.value().attr("action"))
        .and_then(|action| query_param(action, "tid"))
        .map(str::trim)
        .filter(|tid| !tid.is_empty())
        .unwrap_or("0")
        .to_string();

    let mut messages = document.select(&sel.messages).peekable();
    if messages.peek().is_none() {
        return Err(ParseError::structural(
            "no post bodies found",
            html,
            settings.excerpt_len,
        ));
    }

    let limit = match mode {
        ExtractMode::Quick { limit } => limit,
        ExtractMode::Full => usize::MAX,
    };
    let writer = RichContentWriter::new(site);

    let mut posts = Vec::new();
    let mut skipped_posts = 0;
    for message in messages.take(limit) {
        match post_record(message, &thread_id, current_page, mode, &writer) {
            Some(post) => posts.push(post),
            None => {
                skipped_posts += 1;
                forum_debug!(
                    "skipping post body {} without post id",
                    message.value().id().unwrap_or("?")
                );
            }
        }
    }

    Ok(ThreadPage {
        thread_id,
        posts,
        current_page,
        last_page,
        mode,
        skipped_posts,
    })
}

fn post_record(
    message: ElementRef<'_>,
    thread_id: &str,
    page_number: u32,
    mode: ExtractMode,
    writer: &RichContentWriter<'_>,
) -> Option<PostRecord> {
    let post_id = id_suffix(message.value().id()?, "postmessage_")?.to_string();
    let root = find_post_root(message);

    let rich_content = match mode {
        ExtractMode::Quick { .. } => strip_img_tags(message.inner_html().trim()),
        ExtractMode::Full => writer.write(message),
    };

    Some(PostRecord {
        thread_id: thread_id.to_string(),
        post_id,
        page_number,
        rich_content,
        plain_text: element_text(message),
        author_name: post_author(root),
        post_time: post_time(root),
    })
}
