//! Rendered replies, the bot's side of every exchange.
//!
//! A Reply is platform-neutral: the runner turns it into an embed or a
//! plain message. Builders mirror the three tones users see.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub tone: Tone,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub footer: Option<String>,
    /// Only the invoking user sees it (slash commands).
    pub ephemeral: bool,
}

impl Reply {
    pub fn new(tone: Tone, title: impl Into<String>) -> Self {
        Self {
            tone,
            title: title.into(),
            description: None,
            fields: Vec::new(),
            footer: None,
            ephemeral: false,
        }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Tone::Success, title).describe(description)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Tone::Error, "Error").describe(message).private()
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Tone::Info, title).describe(description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Tone::Warning, title).describe(description)
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field { name: name.into(), value: value.into(), inline: false });
        self
    }

    pub fn inline_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field { name: name.into(), value: value.into(), inline: true });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn private(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.tone == Tone::Error
    }

    /// Value of the first field called `name`.
    pub fn field_value(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    /// Plain-text rendering for logs and text-only transports.
    pub fn to_plain_text(&self) -> String {
        let mut out = format!("**{}**", self.title);
        if let Some(desc) = &self.description {
            out.push('\n');
            out.push_str(desc);
        }
        for field in &self.fields {
            out.push_str(&format!("\n{}: {}", field.name, field.value));
        }
        if let Some(footer) = &self.footer {
            out.push_str(&format!("\n_{footer}_"));
        }
        out
    }
}

/// `$1234`. Every amount users see goes through here.
pub fn money(amount: i64) -> String {
    format!("${amount}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_includes_fields_in_order() {
        let reply = Reply::success("Deposit Successful", "You've deposited $200 into your bank!")
            .inline_field("Wallet", money(0))
            .inline_field("Bank", money(200));
        assert_eq!(
            reply.to_plain_text(),
            "**Deposit Successful**\nYou've deposited $200 into your bank!\nWallet: $0\nBank: $200"
        );
        assert_eq!(reply.field_value("Bank"), Some("$200"));
    }

    #[test]
    fn errors_are_private() {
        assert!(Reply::error("nope").ephemeral);
    }
}
