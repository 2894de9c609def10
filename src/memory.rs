use crate::message::{Message, Role};

/// In-process, append-only conversation history.
#[derive(Default, Clone, Debug, PartialEq)]
pub struct ConversationMemory {
    messages: Vec<Message>,
}

impl ConversationMemory {
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages with the given role, oldest first.
    pub fn by_role(&self, role: Role) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |m| m.role == role)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let mut memory = ConversationMemory::with_messages(vec![Message::user("hi")]);
        memory.push(Message::assistant("hello"));
        memory.push(Message::user("bye"));

        assert_eq!(memory.len(), 3);
        assert_eq!(memory.last().unwrap().content, "bye");
        let users: Vec<&str> = memory.by_role(Role::User).map(|m| m.content.as_str()).collect();
        assert_eq!(users, vec!["hi", "bye"]);
    }
}
