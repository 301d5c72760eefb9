//! Field rules: one small function per piece of data pulled out of a page.

use std::sync::OnceLock;

use forum_core::SiteConfig;
use regex::Regex;
use scraper::{ElementRef, Selector};

/// Lazy-load attributes, in order of preference over `src`.
pub const LAZY_IMAGE_ATTRS: [&str; 5] = [
    "zoomfile",
    "file",
    "data-src",
    "data-original",
    "data-ks-lazyload",
];

pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|_| panic!("invalid selector {css}"))
}

macro_rules! cached_selector {
    ($name:ident, $css:expr) => {
        pub(crate) fn $name() -> &'static Selector {
            static SELECTOR: OnceLock<Selector> = OnceLock::new();
            SELECTOR.get_or_init(|| selector($css))
        }
    };
}

cached_selector!(pages_block, "div.pages");
cached_selector!(pages_current, "strong");
cached_selector!(pages_last, "a.last");
cached_selector!(pages_next, "a.next");
cached_selector!(pages_links, r#"a[href*="page="]"#);
cached_selector!(anchor, "a");
cached_selector!(post_info_time, "div.postinfo em");
cached_selector!(any_em, "em");
cached_selector!(post_author_link, r#"td.postauthor a[href*="space.php?uid="]"#);

/// Value of `key` in the query string of `href`. A key without `=` yields "".
pub fn query_param<'a>(href: &'a str, key: &str) -> Option<&'a str> {
    let (_, query) = href.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| match pair.split_once('=') {
            Some((name, value)) if name == key => Some(value),
            None if pair == key => Some(""),
            _ => None,
        })
}

/// The last run of ASCII digits in `text`, e.g. `"... 12"` -> 12.
pub fn last_int(text: &str) -> Option<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse().ok())
        .last()
}

/// Leading ASCII digits of `text`, possibly empty.
pub fn leading_digits(text: &str) -> &str {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(idx, _)| idx);
    &text[..end]
}

/// Numeric id after `prefix` in an element id such as `thread_12345` or `postmessage_678`.
pub fn id_suffix<'a>(id: &'a str, prefix: &str) -> Option<&'a str> {
    let digits = leading_digits(id.strip_prefix(prefix)?);
    (!digits.is_empty()).then_some(digits)
}

pub fn page_param(href: &str) -> Option<u32> {
    query_param(href, "page").and_then(|value| value.trim().parse().ok())
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<String>())
}

/// Current page, label last page and the highest linked page of a `div.pages` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub label_last: Option<u32>,
    pub max_linked: Option<u32>,
}

impl Pagination {
    pub fn read(block: Option<ElementRef<'_>>) -> (Self, Option<String>) {
        let Some(block) = block else {
            return (
                Self {
                    current: 1,
                    label_last: None,
                    max_linked: None,
                },
                None,
            );
        };
        let current = block
            .select(pages_current())
            .next()
            .and_then(|strong| element_text(strong).parse().ok())
            .unwrap_or(1);
        let label_last = block
            .select(pages_last())
            .next()
            .and_then(|link| last_int(&element_text(link)));
        let max_linked = block
            .select(pages_links())
            .filter_map(|link| link.value().attr("href"))
            .filter_map(page_param)
            .max();
        let next = block
            .select(pages_next())
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string);
        (
            Self {
                current,
                label_last,
                max_linked,
            },
            next,
        )
    }

    /// Listing rule: the label; short forums have no label, so the highest
    /// linked page, then the current page.
    pub fn listing_last(&self) -> u32 {
        self.label_last
            .or(self.max_linked)
            .unwrap_or(self.current)
            .max(self.current)
    }

    /// Thread rule: the maximum of current, label and every linked page.
    pub fn thread_last(&self) -> u32 {
        self.current
            .max(self.label_last.unwrap_or(0))
            .max(self.max_linked.unwrap_or(0))
    }
}

/// Nearest ancestor that wraps a whole post, or the parent as a fallback.
pub fn find_post_root(message: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let mut current = Some(message);
    while let Some(element) = current {
        if let Some(id) = element.value().id() {
            if id.starts_with("pid") || (id.starts_with("post") && !id.starts_with("postmessage_"))
            {
                return Some(element);
            }
        }
        current = element.parent().and_then(ElementRef::wrap);
    }
    message.parent().and_then(ElementRef::wrap)
}

pub fn post_author(root: Option<ElementRef<'_>>) -> String {
    root.and_then(|root| root.select(post_author_link()).next())
        .map(element_text)
        .unwrap_or_default()
}

pub fn post_time(root: Option<ElementRef<'_>>) -> String {
    let Some(root) = root else {
        return String::new();
    };
    root.select(post_info_time())
        .map(element_text)
        .find(|text| !text.is_empty())
        .or_else(|| root.select(any_em()).next().map(element_text))
        .unwrap_or_default()
}

pub fn is_placeholder_image(src: &str) -> bool {
    src.to_ascii_lowercase().contains("none.gif")
}

pub fn is_decorative_icon(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.contains("attachimg.gif") || lower.contains("/attachicons/") || lower.contains("attachicons\\")
}

/// Source an `<img>` should end up with, or `None` when the image should be dropped.
pub fn image_source(lazy: Option<&str>, src: Option<&str>) -> Option<String> {
    let src = src.map(str::trim).unwrap_or_default();
    let lazy = lazy.map(str::trim).filter(|value| !value.is_empty());
    let candidate = lazy.unwrap_or(src);
    if candidate.is_empty() || (lazy.is_none() && is_placeholder_image(src)) {
        return None;
    }
    if is_decorative_icon(candidate) {
        return None;
    }
    Some(candidate.to_string())
}

/// First non-blank lazy-load attribute of an `<img>`.
pub fn lazy_source<'a>(img: &'a scraper::node::Element) -> Option<&'a str> {
    LAZY_IMAGE_ATTRS
        .iter()
        .filter_map(|attr| img.attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Absolute form of an image URL found in a post.
pub fn absolutize_image(raw: &str, site: &SiteConfig) -> String {
    let url = raw.trim();
    let lower = url.to_ascii_lowercase();
    if url.is_empty()
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("data:")
        || lower.starts_with("content://")
    {
        return url.to_string();
    }
    if url.starts_with("//") {
        return format!("https:{url}");
    }
    site.resolve(url)
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|| url.to_string())
}

fn img_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)<img[^>]*/?>").expect("valid img tag pattern"))
}

pub fn strip_img_tags(html: &str) -> String {
    img_tag_pattern().replace_all(html, "").into_owned()
}
