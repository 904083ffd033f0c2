use crate::{api::Tag, client::core::ClientRegistry};
use chrono::{DateTime, Utc};
use poem::web::Data;
use poem_openapi::{payload::Json, Object, OpenApi};
use uuid::Uuid;

/// Connected client to return via the API
#[derive(Object)]
pub struct ConnectedClient {
    client_id: Uuid,
    player: u8,
    remote_addr: String,
    connected_at: DateTime<Utc>,
}

/// Struct we will build our REST API / Webserver
pub struct ClientApi;

#[OpenApi]
impl ClientApi {
    /// List the currently connected controller clients
    #[oai(path = "/clients", method = "get", tag = Tag::Client)]
    async fn clients_get(
        &self,
        Data(registry): Data<&ClientRegistry>,
    ) -> Result<Json<Vec<ConnectedClient>>, poem::Error> {
        // Pull the registry state
        let clients = registry
            .snapshot()
            .await
            .into_iter()
            .map(|(client_id, client)| ConnectedClient {
                client_id,
                player: client.player,
                remote_addr: client.remote_addr,
                connected_at: client.connected_at,
            })
            .collect();

        Ok(Json(clients))
    }
}
