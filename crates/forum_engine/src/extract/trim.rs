//! Cuts a thread page down to the parts extraction reads before parsing it.

const FORM_OPEN: &str = "<form";
const FORM_CLOSE: &str = "</form>";
const DIV_CLOSE: &str = "</div>";
const TABLE_OPEN: &str = "<table";
const TABLE_CLOSE: &str = "</table>";

/// Byte offsets into the original text; needles are ASCII so the lowered
/// copy shares every offset with it.
struct Haystack<'a> {
    text: &'a str,
    lower: String,
}

impl<'a> Haystack<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            lower: text.to_ascii_lowercase(),
        }
    }

    fn find_from(&self, needle: &str, from: usize) -> Option<usize> {
        self.lower
            .get(from..)?
            .find(needle)
            .map(|idx| idx + from)
    }

    fn find(&self, needle: &str) -> Option<usize> {
        self.find_from(needle, 0)
    }

    fn rfind(&self, needle: &str) -> Option<usize> {
        self.lower.rfind(needle)
    }

    fn rfind_before(&self, needle: &str, end: usize) -> Option<usize> {
        self.lower.get(..end)?.rfind(needle)
    }

    /// Text from `start` through the first `close` after it.
    fn span(&self, start: usize, close: &str) -> Option<&'a str> {
        let end = self.find_from(close, start)? + close.len();
        self.text.get(start..end)
    }

    /// End offset just past the `</table>` that follows the last post body.
    fn posts_end(&self) -> Option<usize> {
        let last_message = self.rfind("postmessage_")?;
        Some(
            self.find_from(TABLE_CLOSE, last_message)
                .map_or(self.text.len(), |idx| idx + TABLE_CLOSE.len()),
        )
    }
}

/// Trims `html` when it is at least `threshold` bytes long.
///
/// Keeps the pagination block, the reply form (`#postform`, else the first
/// form) and the post list, wrapped in a minimal document. Returns the input unchanged when no post anchor exists.
pub fn trim_thread_html(html: &str, threshold: usize) -> String {
    if html.len() < threshold {
        return html.to_string();
    }
    let hay = Haystack::new(html);

    let form = hay
        .find("id=\"postform\"")
        .and_then(|attr| hay.rfind_before(FORM_OPEN, attr))
        .or_else(|| hay.find(FORM_OPEN))
        .and_then(|start| hay.span(start, FORM_CLOSE))
        .unwrap_or_default();

    let pages_start = hay.find("<div class=\"pages\"").or_else(|| {
        hay.find("class=\"pages\"")
            .and_then(|attr| hay.rfind_before("<", attr))
    });
    let pages = pages_start
        .and_then(|start| hay.span(start, DIV_CLOSE))
        .unwrap_or_default();

    let posts_start = hay
        .find("id=\"postlist\"")
        .and_then(|attr| hay.rfind_before("<", attr))
        .or_else(|| {
            hay.find("t_msgfont")
                .and_then(|first| hay.rfind_before(TABLE_OPEN, first))
        });

    let Some((start, end)) = posts_start.zip(hay.posts_end()) else {
        return html.to_string();
    };
    let Some(posts) = html.get(start..end.max(start)) else {
        return html.to_string();
    };

    let mut out = String::with_capacity(pages.len() + form.len() + posts.len() + 32);
    out.push_str("<html><body>");
    out.push_str(pages);
    out.push_str(form);
    out.push_str(posts);
    out.push_str("</body></html>");
    forum_logging::forum_trace!("trimmed thread page from {} to {} bytes", html.len(), out.len());
    out
}
