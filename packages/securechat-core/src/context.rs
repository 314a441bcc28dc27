//! Who is talking, and where.
//!
//! The host knows which conversation is open and which user is signed in.
//! Key store callers read both through [`ChatContext`] instead of global state.

/// Conversation and user lookup provided by the host
pub trait ChatContext {
    /// Id of the conversation currently open in the host
    fn current_conversation_id(&self) -> String;

    /// Id of the local user
    fn current_user_id(&self) -> String;
}

/// A [`ChatContext`] whose ids are fixed at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticContext {
    conversation_id: String,
    user_id: String,
}

impl StaticContext {
    /// Create a context for one user in one conversation
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl ChatContext for StaticContext {
    fn current_conversation_id(&self) -> String {
        self.conversation_id.clone()
    }

    fn current_user_id(&self) -> String {
        self.user_id.clone()
    }
}
