use serde::{Deserialize, Serialize};

/// Channel a message arrived on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Email,
    Slack,
    Meeting,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Email => write!(f, "email"),
            Source::Slack => write!(f, "slack"),
            Source::Meeting => write!(f, "meeting"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sender {
    #[serde(default = "unknown_sender")]
    pub name: String,

    #[serde(default)]
    pub role: Option<String>,
}

impl Default for Sender {
    fn default() -> Self {
        Self {
            name: unknown_sender(),
            role: None,
        }
    }
}

fn unknown_sender() -> String {
    "Unknown".to_string()
}

/// An inbound email, chat message or meeting transcript
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    #[serde(alias = "message_id")]
    pub id: String,

    #[serde(default)]
    pub source: Source,

    #[serde(default)]
    pub sender: Sender,

    #[serde(alias = "body")]
    pub content: String,

    #[serde(default)]
    pub project: Option<String>,
}

impl Message {
    /// Trim free text and collapse blank optional fields to `None`
    pub fn normalized(mut self) -> Self {
        self.id = self.id.trim().to_string();
        self.content = self.content.trim().to_string();
        self.sender.name = self.sender.name.trim().to_string();
        if self.sender.name.is_empty() {
            self.sender.name = unknown_sender();
        }
        self.sender.role = self
            .sender
            .role
            .take()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        self.project = self
            .project
            .take()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_aliases() {
        let json = r#"{
            "message_id": "MSG-106",
            "source": "slack",
            "sender": {"name": "Random User", "role": "Unknown"},
            "body": "  We need to speed things up  ",
            "project": null
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        let message = message.normalized();
        assert_eq!(message.id, "MSG-106");
        assert_eq!(message.source, Source::Slack);
        assert_eq!(message.content, "We need to speed things up");
        assert!(message.project.is_none());
    }

    #[test]
    fn test_missing_sender_defaults_to_unknown() {
        let message: Message =
            serde_json::from_str(r#"{"id": "M1", "content": "hi", "project": " "}"#).unwrap();
        let message = message.normalized();
        assert_eq!(message.sender.name, "Unknown");
        assert_eq!(message.source, Source::Email);
        assert!(message.project.is_none());
    }
}
