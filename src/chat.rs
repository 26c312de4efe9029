//! Chat page loading
//!
//! A conversation may be requested before its row is committed, so both the
//! page content and its metadata go through a bounded poll first.

use crate::db::{Conversation, Database, Message};
use crate::poll::{poll_resource, PollPolicy, PollResult, ProbeError, ResourceLookup};
use serde::Serialize;

const NOT_FOUND_TITLE: &str = "Chat Not Found";
const NOT_FOUND_DESCRIPTION: &str = "The requested chat conversation could not be found.";

/// Outcome of loading a chat page
#[derive(Debug)]
pub enum ChatView {
    Ready {
        conversation: Conversation,
        messages: Vec<Message>,
    },
    /// Absent, hidden from this viewer, or unreadable. Never distinguished.
    NotFound,
}

/// Page metadata; always produced, even when the chat is missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMetadata {
    pub title: String,
    pub description: String,
}

impl ChatMetadata {
    fn for_conversation(conversation: &Conversation) -> Self {
        let title = conversation.display_title();
        Self {
            title: format!("Chat - {title}"),
            description: format!("Chat conversation: {title}"),
        }
    }

    fn not_found() -> Self {
        Self {
            title: NOT_FOUND_TITLE.to_string(),
            description: NOT_FOUND_DESCRIPTION.to_string(),
        }
    }
}

/// Load a conversation and its messages for `viewer`.
///
/// Errors only when the poll itself ends in an error, which the default
/// probe policy never does.
pub async fn load_chat(
    db: &Database,
    id: &str,
    viewer: Option<&str>,
    policy: PollPolicy,
) -> Result<ChatView, ProbeError> {
    let conversation = match poll_resource(db, id, policy).await {
        PollResult::Found(conversation) => conversation,
        PollResult::NotFound => return Ok(ChatView::NotFound),
        PollResult::Error(e) => return Err(e),
    };

    if !conversation.is_visible_to(viewer) {
        tracing::debug!(conversation_id = %id, "Private conversation hidden from viewer");
        return Ok(ChatView::NotFound);
    }

    match db.get_messages(id) {
        Ok(messages) => Ok(ChatView::Ready {
            conversation,
            messages,
        }),
        Err(e) => {
            tracing::warn!(conversation_id = %id, error = %e, "Failed to load messages");
            Ok(ChatView::NotFound)
        }
    }
}

pub async fn chat_metadata<L>(lookup: &L, id: &str, policy: PollPolicy) -> ChatMetadata
where
    L: ResourceLookup<Conversation> + ?Sized,
{
    match poll_resource(lookup, id, policy).await {
        PollResult::Found(conversation) => ChatMetadata::for_conversation(&conversation),
        PollResult::NotFound | PollResult::Error(_) => ChatMetadata::not_found(),
    }
}
