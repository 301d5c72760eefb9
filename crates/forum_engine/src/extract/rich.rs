use ego_tree::NodeRef;
use forum_core::SiteConfig;
use scraper::node::Node;
use scraper::ElementRef;

use super::rules::{absolutize_image, image_source, lazy_source, LAZY_IMAGE_ATTRS};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Rebuilds the inner HTML of a post body for display.
///
/// Scripts and styles are dropped, lazy-loaded images get their real source
/// as an absolute `src`, placeholders and attachment icons disappear.
pub(crate) struct RichContentWriter<'s> {
    site: &'s SiteConfig,
}

impl<'s> RichContentWriter<'s> {
    pub(crate) fn new(site: &'s SiteConfig) -> Self {
        Self { site }
    }

    pub(crate) fn write(&self, body: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in body.children() {
            self.visit_node(child, &mut out);
        }
        out.trim().to_string()
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, out: &mut String) {
        match node.value() {
            Node::Text(text) => push_escaped_text(out, text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, out);
                }
            }
            // Comments, doctypes and processing instructions are not content.
            _ => {}
        }
    }

    fn visit_element(&self, element: ElementRef<'_>, out: &mut String) {
        let name = element.value().name().to_ascii_lowercase();
        match name.as_str() {
            "script" | "style" => {}
            "img" => self.write_image(element, out),
            _ => {
                write_open_tag(out, &name, element.value().attrs());
                if VOID_ELEMENTS.contains(&name.as_str()) {
                    return;
                }
                for child in element.children() {
                    self.visit_node(child, out);
                }
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
        }
    }

    fn write_image(&self, element: ElementRef<'_>, out: &mut String) {
        let img = element.value();
        let Some(source) = image_source(lazy_source(img), img.attr("src")) else {
            return;
        };
        let src = absolutize_image(&source, self.site);
        let kept = img.attrs().filter(|(attr, _)| {
            !attr.eq_ignore_ascii_case("src")
                && !attr.eq_ignore_ascii_case("onload")
                && !LAZY_IMAGE_ATTRS.iter().any(|lazy| attr.eq_ignore_ascii_case(lazy))
        });
        write_open_tag(out, "img", std::iter::once(("src", src.as_str())).chain(kept));
    }
}

fn write_open_tag<'a>(out: &mut String, name: &str, attrs: impl Iterator<Item = (&'a str, &'a str)>) {
    out.push('<');
    out.push_str(name);
    for (attr, value) in attrs {
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        push_escaped_attr(out, value);
        out.push('"');
    }
    out.push('>');
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn render(fragment: &str) -> String {
        let html = Html::parse_document(&format!(
            "<table><tr><td class=\"t_msgfont\" id=\"postmessage_1\">{fragment}</td></tr></table>"
        ));
        let selector = Selector::parse("td.t_msgfont").unwrap();
        let body = html.select(&selector).next().unwrap();
        RichContentWriter::new(&SiteConfig::default()).write(body)
    }

    #[test]
    fn drops_script_and_style() {
        assert_eq!(
            render("a<script>alert(1)</script><style>p{}</style><b>b</b>"),
            "a<b>b</b>"
        );
    }

    #[test]
    fn lazy_image_becomes_absolute_src() {
        let out = render(
            r#"<img src="images/common/none.gif" file="attachments/x.jpg" onload="thumb(this)" alt="x">"#,
        );
        assert_eq!(
            out,
            r#"<img src="https://www.4d4y.com/forum/attachments/x.jpg" alt="x">"#
        );
    }

    #[test]
    fn placeholders_and_icons_are_removed() {
        assert_eq!(render(r#"x<img src="images/common/none.gif">y"#), "xy");
        assert_eq!(render(r#"x<img src="images/attachicons/image_s.gif">y"#), "xy");
    }

    #[test]
    fn text_is_escaped_and_void_tags_unclosed() {
        assert_eq!(render("1 &lt; 2<br>ok"), "1 &lt; 2<br>ok");
    }
}
