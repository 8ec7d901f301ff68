use serde::Serialize;
use serde_json::{json, Value};

/// Slack rejects section text longer than this.
pub const SECTION_TEXT_LIMIT: usize = 3_000;

pub const USAGE_TEXT: &str =
    "❌ Please provide scheduling details. Example: `/schedule meeting with John tomorrow at 2pm EST`";
pub const WORKING_TEXT: &str = "🤔 Working on your scheduling request...";
pub const FAILURE_TEXT: &str =
    "❌ Sorry, something went wrong processing your scheduling request. Please try again.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Context { block_id: String, elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// `text` + `blocks` body shared by `chat.postMessage`, `chat.postEphemeral`
    /// and response URLs.
    pub fn to_payload(&self) -> Value {
        json!({ "text": self.fallback_text, "blocks": self.blocks })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

pub fn usage_message() -> MessageTemplate {
    MessageBuilder::new(USAGE_TEXT)
        .section("schedule.usage.v1", |section| {
            section.mrkdwn(USAGE_TEXT);
        })
        .build()
}

pub fn working_message() -> MessageTemplate {
    MessageBuilder::new(WORKING_TEXT)
        .section("schedule.working.v1", |section| {
            section.mrkdwn(WORKING_TEXT);
        })
        .build()
}

pub fn failure_message(request_id: &str) -> MessageTemplate {
    MessageBuilder::new(FAILURE_TEXT)
        .section("schedule.failure.v1", |section| {
            section.mrkdwn(FAILURE_TEXT);
        })
        .context("schedule.failure.meta.v1", |context| {
            context.plain(format!("request_id={request_id}"));
        })
        .build()
}

/// Header, quoted request, then the agent's answer. Long answers are split
/// across several sections.
pub fn schedule_result_message(
    requester: &str,
    request_text: &str,
    agent_text: &str,
) -> MessageTemplate {
    let header = format!("🗓️ **Schedule Request from {requester}:**");
    let quoted = format!("*Request:* \"{request_text}\"");

    let mut builder = MessageBuilder::new(format!("{header}\n\n\"{request_text}\"\n\n{agent_text}"))
        .section("schedule.result.header.v1", |section| {
            section.mrkdwn(header);
        })
        .section("schedule.result.request.v1", |section| {
            section.mrkdwn(quoted);
        });

    for (index, chunk) in split_section_text(agent_text, SECTION_TEXT_LIMIT).into_iter().enumerate() {
        builder = builder.section(format!("schedule.result.body.v1.{index}"), |section| {
            section.mrkdwn(chunk);
        });
    }
    builder.build()
}

/// Splits on line boundaries where possible, hard-splitting single lines that
/// exceed `limit` characters. Never returns an empty list.
pub fn split_section_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_owned()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        schedule_result_message, split_section_text, usage_message, Block, MessageBuilder,
        TextObject, USAGE_TEXT,
    };

    #[test]
    fn builder_composes_sections_and_context() {
        let message = MessageBuilder::new("fallback")
            .section("s1", |section| {
                section.mrkdwn("*hello*");
            })
            .context("c1", |context| {
                context.plain("meta");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(message.blocks[1], Block::Context { .. }));
    }

    #[test]
    fn text_objects_serialize_with_slack_type_names() {
        assert_eq!(
            serde_json::to_value(TextObject::plain("a")).expect("serialize"),
            json!({ "type": "plain_text", "text": "a" })
        );
        assert_eq!(
            serde_json::to_value(TextObject::mrkdwn("b")).expect("serialize"),
            json!({ "type": "mrkdwn", "text": "b" })
        );
    }

    #[test]
    fn usage_message_carries_example_command() {
        let message = usage_message();
        assert_eq!(message.fallback_text, USAGE_TEXT);
        assert!(message.fallback_text.contains("`/schedule meeting with John tomorrow at 2pm EST`"));
    }

    #[test]
    fn result_message_has_header_request_and_answer() {
        let message = schedule_result_message("Jane Doe", "standup tomorrow 10am", "Booked.");

        assert_eq!(
            message.fallback_text,
            "🗓️ **Schedule Request from Jane Doe:**\n\n\"standup tomorrow 10am\"\n\nBooked."
        );
        let payload = message.to_payload();
        assert_eq!(payload["blocks"][0]["type"], "section");
        assert_eq!(payload["blocks"][0]["text"]["text"], "🗓️ **Schedule Request from Jane Doe:**");
        assert_eq!(payload["blocks"][1]["text"]["text"], "*Request:* \"standup tomorrow 10am\"");
        assert_eq!(payload["blocks"][2]["text"]["text"], "Booked.");
    }

    #[test]
    fn long_answers_are_split_on_line_boundaries() {
        let text = format!("{}\n{}\n", "a".repeat(6), "b".repeat(6));
        let chunks = split_section_text(&text, 8);
        assert_eq!(chunks, vec!["aaaaaa\n".to_owned(), "bbbbbb\n".to_owned()]);

        let oversized = split_section_text(&"x".repeat(10), 4);
        assert_eq!(oversized, vec!["xxxx", "xxxx", "xx"]);
    }
}
