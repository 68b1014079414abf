//! User notifications: what gets sent, how it is fanned out to live listeners.
//!
//! Services never write notification rows themselves. They build a
//! [`NewNotification`] and hand it to a [`NotificationDispatcher`]; the
//! Postgres-backed dispatcher lives in `services::notification_service`.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::Stream;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::database::models::Notification;
use crate::services::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Message,
    TaskAssigned,
    TaskComment,
    TaskDueSoon,
    WhatsappMessage,
    SalesAssigned,
    SalesComment,
    Mention,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Message => "MESSAGE",
            NotificationType::TaskAssigned => "TASK_ASSIGNED",
            NotificationType::TaskComment => "TASK_COMMENT",
            NotificationType::TaskDueSoon => "TASK_DUE_SOON",
            NotificationType::WhatsappMessage => "WHATSAPP_MESSAGE",
            NotificationType::SalesAssigned => "SALES_ASSIGNED",
            NotificationType::SalesComment => "SALES_COMMENT",
            NotificationType::Mention => "MENTION",
            NotificationType::System => "SYSTEM",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| format!("unknown notification type '{}'", s))
    }
}

/// A notification that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub metadata: Option<Value>,
    pub action_url: Option<String>,
}

impl NewNotification {
    pub fn task_assigned(user_id: Uuid, card_title: &str, card_id: Uuid, board_id: Uuid) -> Self {
        Self {
            user_id,
            notification_type: NotificationType::TaskAssigned,
            title: "New task assigned".to_string(),
            message: format!("You were assigned to the task \"{}\"", card_title),
            metadata: Some(json!({ "cardId": card_id, "boardId": board_id })),
            action_url: Some(format!("/dashboard/kanban/{}", board_id)),
        }
    }

    pub fn task_comment(user_id: Uuid, card_title: &str, card_id: Uuid, commenter: &str, board_id: Uuid) -> Self {
        Self {
            user_id,
            notification_type: NotificationType::TaskComment,
            title: "New comment".to_string(),
            message: format!("{} commented on \"{}\"", commenter, card_title),
            metadata: Some(json!({ "cardId": card_id, "boardId": board_id })),
            action_url: Some(format!("/dashboard/kanban/{}", board_id)),
        }
    }

    pub fn sales_assigned(user_id: Uuid, opportunity_title: &str, opportunity_id: Uuid) -> Self {
        Self {
            user_id,
            notification_type: NotificationType::SalesAssigned,
            title: "New opportunity assigned".to_string(),
            message: format!("You were assigned to the opportunity \"{}\"", opportunity_title),
            metadata: Some(json!({ "opportunityId": opportunity_id })),
            action_url: Some("/dashboard/kanban/sales".to_string()),
        }
    }
}

/// Persists a notification and fans it out to live subscribers.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: NewNotification) -> Result<Notification, ServiceError>;
}

/// Recipients of a change made by `actor`: every listed user except the actor, each once.
pub fn recipients(actor: Uuid, candidates: impl IntoIterator<Item = Option<Uuid>>) -> Vec<Uuid> {
    let mut users: Vec<Uuid> = Vec::new();
    for user in candidates.into_iter().flatten() {
        if user != actor && !users.contains(&user) {
            users.push(user);
        }
    }
    users
}

const HUB_CAPACITY: usize = 256;

/// In-process fan-out of stored notifications. Slow receivers lag and lose
/// the oldest entries; the database row stays authoritative.
#[derive(Clone)]
pub struct NotificationHub {
    sender: broadcast::Sender<Notification>,
}

impl NotificationHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    /// Process-wide hub shared by every dispatcher
    pub fn global() -> &'static NotificationHub {
        static HUB: Lazy<NotificationHub> = Lazy::new(NotificationHub::new);
        &HUB
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Notifications addressed to `user_id`, from now on. Ends when the hub
    /// is dropped; a lagging listener skips what it missed.
    pub fn stream_for(&self, user_id: Uuid) -> impl Stream<Item = Notification> + Send + 'static {
        futures::stream::unfold(self.subscribe(), move |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(notification) if notification.user_id == user_id => return Some((notification, receiver)),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Notification stream of user {} skipped {} entries", user_id, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Returns how many subscribers received it
    pub fn publish(&self, notification: Notification) -> usize {
        self.sender.send(notification).unwrap_or(0)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use futures::StreamExt;

    fn stored(user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            notification_type: NotificationType::System.to_string(),
            title: "Maintenance".to_string(),
            message: "Tonight".to_string(),
            metadata: None,
            action_url: None,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn task_assigned_links_to_the_board() {
        let (user, card, board) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let n = NewNotification::task_assigned(user, "Ship release", card, board);

        assert_eq!(n.notification_type, NotificationType::TaskAssigned);
        assert_eq!(n.action_url, Some(format!("/dashboard/kanban/{}", board)));
        assert_eq!(n.metadata.as_ref().unwrap()["cardId"], json!(card));
        assert!(n.message.contains("Ship release"));
    }

    #[test]
    fn comment_message_names_the_commenter() {
        let n = NewNotification::task_comment(Uuid::new_v4(), "Fix login", Uuid::new_v4(), "Ana Lima", Uuid::new_v4());
        assert_eq!(n.message, "Ana Lima commented on \"Fix login\"");
    }

    #[test]
    fn recipients_skip_actor_and_duplicates() {
        let (actor, creator) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(recipients(actor, [Some(creator), Some(actor), None, Some(creator)]), vec![creator]);
        assert!(recipients(actor, [Some(actor)]).is_empty());
    }

    #[test]
    fn type_names_round_trip_through_strings() {
        assert_eq!("SALES_ASSIGNED".parse::<NotificationType>(), Ok(NotificationType::SalesAssigned));
        assert_eq!(NotificationType::WhatsappMessage.as_str(), "WHATSAPP_MESSAGE");
        assert!("LATER".parse::<NotificationType>().is_err());
    }

    #[tokio::test]
    async fn hub_delivers_to_every_subscriber() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish(stored(Uuid::new_v4())), 0);

        let mut first = hub.subscribe();
        let mut second = hub.subscribe();
        let user = Uuid::new_v4();
        assert_eq!(hub.publish(stored(user)), 2);

        assert_eq!(first.recv().await.unwrap().user_id, user);
        assert_eq!(second.recv().await.unwrap().user_id, user);
    }

    #[tokio::test]
    async fn user_stream_only_yields_that_users_notifications() {
        let hub = NotificationHub::new();
        let (me, someone_else) = (Uuid::new_v4(), Uuid::new_v4());
        let mut mine = Box::pin(hub.stream_for(me));

        hub.publish(stored(someone_else));
        let expected = stored(me);
        hub.publish(expected.clone());

        let received = mine.next().await.unwrap();
        assert_eq!(received.id, expected.id);
    }

    #[tokio::test]
    async fn user_stream_ends_with_the_hub() {
        let hub = NotificationHub::new();
        let mut stream = Box::pin(hub.stream_for(Uuid::new_v4()));
        drop(hub);
        assert!(stream.next().await.is_none());
    }
}
