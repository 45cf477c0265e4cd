use core_types::ChatMessage;

/// How many trailing messages accompany each new message.
pub const CONTEXT_WINDOW: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `limit` messages, or all of them when there are fewer.
    pub fn context_window(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation_of(count: usize) -> Conversation {
        Conversation::from_messages(
            (0..count)
                .map(|i| {
                    if i % 2 == 0 {
                        ChatMessage::user(format!("m{i}"))
                    } else {
                        ChatMessage::assistant(format!("m{i}"))
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn window_keeps_the_most_recent_messages() {
        let conversation = conversation_of(25);
        let window = conversation.context_window(CONTEXT_WINDOW);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].content, "m15");
        assert_eq!(window[9].content, "m24");
    }

    #[test]
    fn window_boundaries() {
        assert_eq!(conversation_of(10).context_window(CONTEXT_WINDOW).len(), 10);
        assert_eq!(conversation_of(3).context_window(CONTEXT_WINDOW).len(), 3);
        assert!(conversation_of(0).context_window(CONTEXT_WINDOW).is_empty());
    }
}
