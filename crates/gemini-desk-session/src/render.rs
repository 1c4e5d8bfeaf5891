use gemini_desk_types::{Clarification, FileReference, Message, Role};

/// Converts markdown into HTML
pub trait MarkdownRenderer {
    fn render(&self, markdown: &str) -> String;
}

/// Strips anything unsafe from HTML produced by the markdown renderer
pub trait HtmlSanitizer {
    fn sanitize(&self, html: &str) -> String;
}

/// Escape HTML to prevent XSS
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Escaped text with line breaks kept
pub fn plain_text_html(s: &str) -> String {
    escape_html(s).replace('\n', "<br>")
}

/// Allow only URLs that cannot run script: http(s), mailto, fragment,
/// site-relative, and inline images
pub fn safe_url(url: &str) -> Option<&str> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    let allowed = lower.starts_with("https://")
        || lower.starts_with("http://")
        || lower.starts_with("mailto:")
        || lower.starts_with("data:image/")
        || lower.starts_with('#')
        || (lower.starts_with('/') && !lower.starts_with("//"))
        || !lower.contains(':');
    if allowed {
        Some(trimmed)
    } else {
        None
    }
}

/// Builds the HTML for every kind of transcript bubble
pub struct MessageRenderer {
    markdown: Box<dyn MarkdownRenderer>,
    sanitizer: Box<dyn HtmlSanitizer>,
}

impl MessageRenderer {
    pub fn new(markdown: Box<dyn MarkdownRenderer>, sanitizer: Box<dyn HtmlSanitizer>) -> Self {
        Self { markdown, sanitizer }
    }

    /// Markdown converted and sanitized
    pub fn rich(&self, text: &str) -> String {
        self.sanitizer.sanitize(&self.markdown.render(text))
    }

    pub fn message_html(&self, message: &Message) -> String {
        match message.role {
            Role::User => plain_text_html(&message.text),
            Role::Assistant => {
                let mut html = self.rich(&message.text);
                if let Some(url) = &message.image_url {
                    html.push_str(&image_html(url));
                }
                html
            }
            Role::Thought => format!(
                r#"<details class="thoughts"><summary>Thoughts</summary>{}</details>"#,
                self.rich(&message.text)
            ),
        }
    }

    pub fn user_html(&self, text: &str, attachment: Option<&FileReference>) -> String {
        let mut html = plain_text_html(text);
        if let Some(file) = attachment {
            html.push_str(&format!(
                r#"<div class="attachment-chip">📎 {}</div>"#,
                escape_html(&file.name)
            ));
        }
        html
    }

    pub fn error_html(&self, reason: &str) -> String {
        format!("Error: {}", escape_html(reason))
    }

    pub fn clarification_html(&self, clarification: &Clarification) -> String {
        let mut html = String::new();
        if !clarification.intro.trim().is_empty() {
            html.push_str(&self.rich(&clarification.intro));
        }
        html.push_str(r#"<ol class="clarification-options">"#);
        for option in &clarification.options {
            let href = safe_url(&option.url).unwrap_or("#");
            html.push_str(&format!(
                r#"<li><a href="{}" data-label="{}">{}</a></li>"#,
                escape_html(href),
                escape_html(&option.label),
                escape_html(&option.label)
            ));
        }
        html.push_str("</ol>");
        html
    }
}

fn image_html(url: &str) -> String {
    match safe_url(url) {
        Some(url) => format!(
            r#"<img class="chat-image" src="{}" alt="Generated image">"#,
            escape_html(url)
        ),
        None => {
            log::warn!("Dropping image with unsafe URL");
            String::new()
        }
    }
}
