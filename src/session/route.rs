use crate::{
    client::ClientRegistry,
    config::Config,
    emulator::EmulatorHandle,
    input::{PadState, PipeSink},
    session::core::{error_frame, handle_frame, Greeting, GREETING},
};
use futures_util::{SinkExt, StreamExt};
use poem::{
    handler,
    web::{
        websocket::{Message, WebSocket, WebSocketStream},
        Data, RemoteAddr,
    },
    IntoResponse,
};
use tokio::sync::mpsc::unbounded_channel;

/// Upgrade a browser connection to the controller socket.
#[handler]
pub async fn pad_socket(
    ws: WebSocket,
    remote_addr: &RemoteAddr,
    Data(registry): Data<&ClientRegistry>,
    Data(emulator): Data<&EmulatorHandle>,
    Data(config): Data<&Config>,
) -> impl IntoResponse {
    let remote_addr = remote_addr.to_string();
    let registry = registry.clone();
    let emulator = emulator.clone();
    let config = config.clone();

    ws.on_upgrade(move |socket| serve_client(socket, remote_addr, registry, emulator, config))
}

/// Run one client connection to completion.
async fn serve_client(
    socket: WebSocketStream,
    remote_addr: String,
    registry: ClientRegistry,
    emulator: EmulatorHandle,
    config: Config,
) {
    let (outbound, mut frames) = unbounded_channel::<String>();
    let (mut sink, mut stream) = socket.split();

    // Admit the client, or turn it away when every slot is taken.
    let (client_id, player) = match registry.register(&remote_addr, outbound.clone()).await {
        Ok(admitted) => admitted,
        Err(err) => {
            tracing::warn!(%remote_addr, "connection refused: {err}");
            let _ = sink.send(Message::Text(error_frame("Too many clients"))).await;
            let _ = sink.close().await;
            return;
        }
    };
    tracing::info!(%client_id, player, %remote_addr, "client connected");

    // Everything outbound funnels through one write task, so broadcasts and
    // replies cannot interleave mid-frame.
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    if let Ok(greeting) = serde_json::to_string(&Greeting {
        message: GREETING,
        client_id,
        player,
    }) {
        let _ = outbound.send(greeting);
    }

    let mut state = PadState::default();
    let mut pipe = PipeSink::new(config.player_pipe(player));

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                handle_frame(&text, &mut state, &mut pipe, &outbound, &registry, &emulator).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    registry.unregister(&client_id).await;
    tracing::info!(%client_id, player, "client disconnected");
    writer.abort();
}
