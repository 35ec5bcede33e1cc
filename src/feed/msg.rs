use pulldown_cmark::{Event, Options, Parser, html};
use serde::Serialize;

use super::FeedMessage;

/// Markdown to HTML. Raw HTML in the source is escaped, not passed through.
pub fn render_content(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        event => event,
    });

    let mut content_html = String::new();
    html::push_html(&mut content_html, parser);
    content_html
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedMessage {
    #[serde(flatten)]
    pub message: FeedMessage,
    pub author_name: String,
    pub content_html: String,
}

impl From<&FeedMessage> for RenderedMessage {
    fn from(message: &FeedMessage) -> Self {
        RenderedMessage {
            author_name: message.display_name().to_owned(),
            content_html: render_content(&message.message.content),
            message: message.clone(),
        }
    }
}

/// Frames pushed to a feed socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedFrame {
    History { messages: Vec<RenderedMessage> },
    Message { message: RenderedMessage },
    Error { error: String },
}

impl FeedFrame {
    pub fn history(messages: &[FeedMessage]) -> Self {
        FeedFrame::History {
            messages: messages.iter().map(RenderedMessage::from).collect(),
        }
    }
}
