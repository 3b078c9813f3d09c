//! Open app instances ("clients") the cache manager can claim or focus.

use reqwest::Url;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

pub type ClientId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: ClientId,
    pub url: String,
    pub focused: bool,
    /// Generation routing this client's requests, if any.
    pub controller: Option<String>,
}

#[derive(Debug, Default)]
struct ClientTable {
    next_id: ClientId,
    clients: Vec<Client>,
}

#[derive(Debug, Default)]
pub struct ClientRegistry {
    table: RwLock<ClientTable>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new focused client at `url`.
    pub async fn open_window(&self, url: &Url, controller: Option<&str>) -> Client {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let client = Client {
            id: table.next_id,
            url: url.to_string(),
            focused: true,
            controller: controller.map(String::from),
        };
        for other in table.clients.iter_mut() {
            other.focused = false;
        }
        table.clients.push(client.clone());
        debug!(client = client.id, url = %client.url, "Client opened");
        client
    }

    pub async fn close(&self, id: ClientId) -> bool {
        let mut table = self.table.write().await;
        let before = table.clients.len();
        table.clients.retain(|c| c.id != id);
        table.clients.len() != before
    }

    pub async fn get(&self, id: ClientId) -> Option<Client> {
        self.table
            .read()
            .await
            .clients
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    /// All clients, optionally including ones no generation controls yet.
    pub async fn match_all(&self, include_uncontrolled: bool) -> Vec<Client> {
        self.table
            .read()
            .await
            .clients
            .iter()
            .filter(|c| include_uncontrolled || c.controller.is_some())
            .cloned()
            .collect()
    }

    /// Bring a client to the foreground.
    pub async fn focus(&self, id: ClientId) -> Option<Client> {
        let mut table = self.table.write().await;
        if !table.clients.iter().any(|c| c.id == id) {
            return None;
        }
        let mut focused = None;
        for client in table.clients.iter_mut() {
            client.focused = client.id == id;
            if client.focused {
                focused = Some(client.clone());
            }
        }
        focused
    }

    /// Make `controller` the routing generation of every open client,
    /// including ones opened before it activated. Returns how many clients
    /// are now controlled by it.
    pub async fn claim(&self, controller: &str) -> usize {
        let mut table = self.table.write().await;
        for client in table.clients.iter_mut() {
            client.controller = Some(controller.to_string());
        }
        table.clients.len()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_window_focuses_newest() {
        let clients = ClientRegistry::new();
        let first = clients.open_window(&url("http://app/"), None).await;
        let second = clients.open_window(&url("http://app/"), None).await;

        assert_ne!(first.id, second.id);
        assert!(!clients.get(first.id).await.unwrap().focused);
        assert!(clients.get(second.id).await.unwrap().focused);
    }

    #[tokio::test]
    async fn test_match_all_filters_uncontrolled() {
        let clients = ClientRegistry::new();
        clients.open_window(&url("http://app/"), None).await;
        clients.open_window(&url("http://app/"), Some("v60-recipe-v1.4.0")).await;

        assert_eq!(clients.match_all(true).await.len(), 2);
        assert_eq!(clients.match_all(false).await.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_controls_every_client() {
        let clients = ClientRegistry::new();
        clients.open_window(&url("http://app/"), None).await;
        clients.open_window(&url("http://app/"), Some("v60-recipe-v1.3.0")).await;

        assert_eq!(clients.claim("v60-recipe-v1.4.0").await, 2);
        for client in clients.match_all(false).await {
            assert_eq!(client.controller.as_deref(), Some("v60-recipe-v1.4.0"));
        }
    }

    #[tokio::test]
    async fn test_focus_unknown_client() {
        let clients = ClientRegistry::new();
        let open = clients.open_window(&url("http://app/"), None).await;
        assert!(clients.focus(999).await.is_none());
        assert!(clients.get(open.id).await.unwrap().focused);
    }

    #[tokio::test]
    async fn test_close() {
        let clients = ClientRegistry::new();
        let open = clients.open_window(&url("http://app/"), None).await;
        assert!(clients.close(open.id).await);
        assert!(!clients.close(open.id).await);
        assert!(clients.is_empty().await);
    }
}
