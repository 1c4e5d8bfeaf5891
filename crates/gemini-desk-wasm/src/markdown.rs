use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use gemini_desk_session::{safe_url, MarkdownRenderer};

/// Markdown renderer backed by pulldown-cmark
pub struct PulldownMarkdown;

impl MarkdownRenderer for PulldownMarkdown {
    fn render(&self, markdown: &str) -> String {
        render_markdown(markdown)
    }
}

/// Render markdown to HTML. Raw HTML in the source is shown as text and
/// links with a script-capable scheme point nowhere.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);

    let parser = Parser::new_ext(markdown, options).map(neutralize);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    add_code_highlighting_classes(&html_output)
}

fn neutralize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: checked_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: checked_url(dest_url),
            title,
            id,
        }),
        other => other,
    }
}

fn checked_url(url: CowStr<'_>) -> CowStr<'_> {
    if safe_url(&url).is_some() {
        url
    } else {
        log::warn!("Dropping unsafe link target in markdown");
        CowStr::Borrowed("#")
    }
}

/// Mark fenced blocks for highlight.js
fn add_code_highlighting_classes(html: &str) -> String {
    html.replace("<pre><code class=\"", "<pre><code class=\"hljs ")
        .replace("<pre><code>", "<pre><code class=\"hljs\">")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown() {
        let md = "# Hello\n\nThis is **bold** text.";
        let html = render_markdown(md);
        assert!(html.contains("<h1>"));
        assert!(html.contains("<strong>"));
    }

    #[test]
    fn test_render_code_block() {
        let html = render_markdown("```rust\nfn main() {}\n```");
        assert!(html.contains(r#"<pre><code class="hljs language-rust">"#));

        let html = render_markdown("```\nplain\n```");
        assert!(html.contains(r#"<pre><code class="hljs">"#));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render_markdown("hi <script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_script_links_are_neutralized() {
        let html = render_markdown("[click](javascript:alert(1)) and [doc](/app/customer/C-1)");
        assert!(html.contains(r##"<a href="#">click</a>"##));
        assert!(html.contains(r#"<a href="/app/customer/C-1">doc</a>"#));
    }
}
