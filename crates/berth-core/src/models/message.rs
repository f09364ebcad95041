use std::fmt;
use std::str::FromStr;

/// Tag marking a stream line as produced by the orchestrator rather than by
/// an external tool.
pub const MESSAGE_PREFIX: &str = "BERTH_MSG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Default,
    Success,
    Error,
}

impl MessageLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Default => "default",
            MessageLevel::Success => "success",
            MessageLevel::Error => "error",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(MessageLevel::Default),
            "success" => Ok(MessageLevel::Success),
            "error" => Ok(MessageLevel::Error),
            _ => Err(()),
        }
    }
}

/// A progress line emitted on a streaming operation's output channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl ProgressMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Default,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }

    /// `PREFIX:LEVEL:TEXT`
    pub fn encode(&self) -> String {
        format!("{MESSAGE_PREFIX}:{}:{}", self.level, self.text)
    }

    /// Parse an encoded line. Only the first two colons are separators, so the
    /// text may contain colons. Lines without the prefix (raw tool output)
    /// return `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ':');
        if parts.next()? != MESSAGE_PREFIX {
            return None;
        }
        let level = parts.next()?.parse().ok()?;
        let text = parts.next()?.to_string();
        Some(Self { level, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_uses_prefix_and_level() {
        assert_eq!(
            ProgressMessage::success("Git pull completed").encode(),
            "BERTH_MSG:success:Git pull completed"
        );
        assert_eq!(
            ProgressMessage::info("x").encode(),
            "BERTH_MSG:default:x"
        );
    }

    #[test]
    fn parse_keeps_colons_in_text() {
        let line = ProgressMessage::error("failed: exit status: 1").encode();
        let msg = ProgressMessage::parse(&line).unwrap();
        assert_eq!(msg.level, MessageLevel::Error);
        assert_eq!(msg.text, "failed: exit status: 1");
    }

    #[test]
    fn parse_ignores_tool_output() {
        assert!(ProgressMessage::parse("web-1  | listening on :8080").is_none());
        assert!(ProgressMessage::parse("BERTH_MSG:loud:text").is_none());
        assert!(ProgressMessage::parse("BERTH_MSG:error").is_none());
    }

    #[test]
    fn parse_allows_empty_text() {
        let msg = ProgressMessage::parse("BERTH_MSG:default:").unwrap();
        assert_eq!(msg.text, "");
    }
}
