use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Story change notifications, delivered to in-process listeners and
/// relayed over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoryEvent {
    /// Gateway handshake completed
    Ready { user_id: String },

    /// A new story was published
    StoryCreated { story_id: Uuid, author_id: String },

    /// A viewer was added to a story's view set
    StoryViewed {
        story_id: Uuid,
        author_id: String,
        viewer_id: String,
    },

    /// The expiry sweep removed stories past the visibility window
    StoriesExpired { count: usize },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },
}

impl StoryEvent {
    /// Whether `user_id` may receive this event. View events reveal who
    /// watched a story, so only its author and the viewer get them.
    pub fn is_visible_to(&self, user_id: &str) -> bool {
        match self {
            StoryEvent::StoryViewed {
                author_id, viewer_id, ..
            } => author_id == user_id || viewer_id == user_id,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_tagged_wire_shape() {
        let event = StoryEvent::StoriesExpired { count: 3 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StoriesExpired");
        assert_eq!(json["data"]["count"], 3);
    }

    #[test]
    fn identify_command_parses() {
        let cmd: GatewayCommand =
            serde_json::from_str(r#"{"type":"Identify","data":{"token":"abc"}}"#).unwrap();
        let GatewayCommand::Identify { token } = cmd;
        assert_eq!(token, "abc");
    }

    #[test]
    fn view_events_reach_only_author_and_viewer() {
        let event = StoryEvent::StoryViewed {
            story_id: Uuid::new_v4(),
            author_id: "alice".into(),
            viewer_id: "bob".into(),
        };
        assert!(event.is_visible_to("alice"));
        assert!(event.is_visible_to("bob"));
        assert!(!event.is_visible_to("carol"));
        assert!(StoryEvent::StoriesExpired { count: 1 }.is_visible_to("carol"));
    }
}
