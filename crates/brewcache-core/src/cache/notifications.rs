use serde::Serialize;
use tokio::sync::RwLock;

pub type NotificationId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct Shown {
    next_id: NotificationId,
    open: Vec<Notification>,
}

/// Notifications currently on screen.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: RwLock<Shown>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn show(&self, title: &str, body: &str) -> Notification {
        let mut shown = self.shown.write().await;
        shown.next_id += 1;
        let notification = Notification {
            id: shown.next_id,
            title: title.to_string(),
            body: body.to_string(),
        };
        shown.open.push(notification.clone());
        notification
    }

    /// Dismiss a notification. Returns `false` if it was not open.
    pub async fn close(&self, id: NotificationId) -> bool {
        let mut shown = self.shown.write().await;
        let before = shown.open.len();
        shown.open.retain(|n| n.id != id);
        shown.open.len() != before
    }

    pub async fn is_open(&self, id: NotificationId) -> bool {
        self.shown.read().await.open.iter().any(|n| n.id == id)
    }

    pub async fn open(&self) -> Vec<Notification> {
        self.shown.read().await.open.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_show_and_close() {
        let center = NotificationCenter::new();
        let first = center.show("Brew complete", "Enjoy your coffee").await;
        let second = center.show("Update ready", "Activate v1.4.0").await;

        assert!(center.is_open(first.id).await);
        assert_eq!(center.open().await.len(), 2);

        assert!(center.close(first.id).await);
        assert!(!center.close(first.id).await);
        assert!(!center.is_open(first.id).await);
        assert!(center.is_open(second.id).await);
    }
}
