use chrono::{DateTime, Utc};
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use uuid::Uuid;

/// Channel end carrying outbound text frames to one client's write task.
pub type Outbound = UnboundedSender<String>;

/// A connected controller client.
#[derive(Clone, Debug)]
pub struct Client {
    pub player: u8,
    pub remote_addr: String,
    pub connected_at: DateTime<Utc>,
    sender: Outbound,
}

/// Returned when all player slots are taken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegistryFull {
    pub max_clients: usize,
}

impl fmt::Display for RegistryFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "maximum number of clients ({}) reached",
            self.max_clients
        )
    }
}

impl std::error::Error for RegistryFull {}

/// Registry of connected clients, keyed by their session ids.
///
/// Each client holds one player slot. Slots are handed out lowest-free-first
/// so player 1 is always the next one filled after a disconnect.
#[derive(Clone)]
pub struct ClientRegistry {
    max_clients: usize,
    clients: Arc<Mutex<HashMap<Uuid, Client>>>,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        ClientRegistry {
            max_clients,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit a client, handing it a fresh id and the lowest free player slot.
    pub async fn register(
        &self,
        remote_addr: &str,
        sender: Outbound,
    ) -> Result<(Uuid, u8), RegistryFull> {
        let mut clients = self.clients.lock().await;

        // Lowest slot not in use.
        let player = (1..=self.max_clients as u8)
            .find(|slot| !clients.values().any(|client| client.player == *slot))
            .ok_or(RegistryFull {
                max_clients: self.max_clients,
            })?;

        let client_id = Uuid::new_v4();
        clients.insert(
            client_id,
            Client {
                player,
                remote_addr: remote_addr.to_string(),
                connected_at: Utc::now(),
                sender,
            },
        );

        Ok((client_id, player))
    }

    /// Drop a client and free its player slot.
    pub async fn unregister(&self, client_id: &Uuid) -> Option<Client> {
        self.clients.lock().await.remove(client_id)
    }

    /// Push a text frame to every connected client. Clients whose write task
    /// already hung up are skipped.
    pub async fn broadcast(&self, frame: &str) {
        for client in self.clients.lock().await.values() {
            let _ = client.sender.send(frame.to_string());
        }
    }

    /// Current clients, ordered by player slot.
    pub async fn snapshot(&self) -> Vec<(Uuid, Client)> {
        let mut clients: Vec<(Uuid, Client)> = self
            .clients
            .lock()
            .await
            .iter()
            .map(|(client_id, client)| (*client_id, client.clone()))
            .collect();
        clients.sort_by_key(|(_, client)| client.player);

        clients
    }
}
