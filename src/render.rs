use pulldown_cmark::{html, Options, Parser};

/// Converts corpus text into the HTML stored with each document.
pub trait Renderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// CommonMark with GitHub-style tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, Options::ENABLE_TABLES);
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        html::push_html(&mut out, parser);
        out
    }
}
