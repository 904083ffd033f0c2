use crate::{
    client::{ClientRegistry, Outbound},
    emulator::{emulator_start, emulator_status, emulator_stop, EmulatorHandle, EmulatorStatus},
    input::{Control, InputSink, PadState},
};
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Greeting sent right after a client is admitted.
pub const GREETING: &str = "Connected to Dolphin Controller Server";

/// Client to server frames.
///
/// Two shapes exist on the wire: input frames
/// `{"type": "controller_input", "input": {...}}` and control frames
/// `{"command": "start_dolphin" | "stop_dolphin" | "status"}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Inbound {
    Input(InputFrame),
    Control(ControlFrame),
}

#[derive(Debug, Deserialize)]
pub struct InputFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub input: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ControlFrame {
    pub command: Command,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    StartDolphin,
    StopDolphin,
    Status,
}

/// Server to client greeting frame.
#[derive(Debug, Serialize)]
pub struct Greeting {
    pub message: &'static str,
    pub client_id: Uuid,
    pub player: u8,
}

/// Server to client status reply.
#[derive(Debug, Serialize)]
pub struct StatusReply {
    pub status: EmulatorStatus,
}

/// Server to client error frame, `{"error": "..."}`.
pub fn error_frame(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Translate one input frame into pipe commands and push them to the sink.
///
/// Unknown control names and values of the wrong type are skipped without
/// failing the frame; only sink errors bubble up.
pub async fn apply_input_frame(
    frame: &InputFrame,
    state: &mut PadState,
    sink: &mut dyn InputSink,
) -> eyre::Result<()> {
    if frame.kind != "controller_input" {
        tracing::debug!(kind = %frame.kind, "ignoring input frame of unknown type");
        return Ok(());
    }

    for (name, value) in &frame.input {
        let Some(control) = Control::parse(name) else {
            tracing::debug!(%name, "skipping unknown control");
            continue;
        };

        let Some(command) = state.apply(control, value) else {
            tracing::debug!(%name, %value, "skipping control with unexpected value");
            continue;
        };

        sink.send(&command).await?;
    }

    Ok(())
}

/// Handle one text frame from a client.
///
/// Protocol errors are logged and answered where the original server did;
/// the connection itself stays usable.
pub async fn handle_frame(
    text: &str,
    state: &mut PadState,
    sink: &mut dyn InputSink,
    outbound: &Outbound,
    registry: &ClientRegistry,
    emulator: &EmulatorHandle,
) {
    tracing::debug!(frame = %text, "received frame");

    match serde_json::from_str::<Inbound>(text) {
        Ok(Inbound::Input(frame)) => {
            if let Err(err) = apply_input_frame(&frame, state, sink).await {
                tracing::warn!(error = %err, "failed to forward input");
                let _ = outbound.send(error_frame(&format!("Failed to forward input: {err}")));
            }
        }
        Ok(Inbound::Control(frame)) => match frame.command {
            Command::StartDolphin => {
                // Failures are already broadcast to every client.
                if let Err(err) = emulator_start(emulator, registry).await {
                    tracing::warn!(error = %err, "start_dolphin failed");
                }
            }
            Command::StopDolphin => {
                if let Err(err) = emulator_stop(emulator, registry).await {
                    tracing::warn!(error = %err, "stop_dolphin failed");
                }
            }
            Command::Status => {
                let status = emulator_status(emulator).await;
                if let Ok(reply) = serde_json::to_string(&StatusReply { status }) {
                    let _ = outbound.send(reply);
                }
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, frame = %text, "invalid frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PipeCommand;
    use async_trait::async_trait;
    use color_eyre::eyre::eyre;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::unbounded_channel;

    /// Sink that records pipe lines instead of writing to a FIFO.
    #[derive(Default)]
    struct RecordingSink {
        lines: Vec<String>,
        fail: bool,
    }

    #[async_trait]
    impl InputSink for RecordingSink {
        async fn send(&mut self, command: &PipeCommand) -> eyre::Result<()> {
            if self.fail {
                return Err(eyre!("pipe gone"));
            }
            self.lines.push(command.to_string());
            Ok(())
        }
    }

    fn test_emulator() -> (EmulatorHandle, ClientRegistry) {
        (
            EmulatorHandle::new("/no/such/padlink-emulator"),
            ClientRegistry::new(4),
        )
    }

    /// Test that an input frame becomes pipe lines
    #[tokio::test]
    async fn test_handle_frame_controller_input() {
        let (emulator, registry) = test_emulator();
        let (tx, mut rx) = unbounded_channel();
        let mut state = PadState::default();
        let mut sink = RecordingSink::default();

        let frame = r#"{"type": "controller_input", "input": {"A": true, "ANALOG_LEFT_X": 1.0, "SELECT": true}}"#;
        handle_frame(frame, &mut state, &mut sink, &tx, &registry, &emulator).await;

        // serde_json keeps object keys sorted, so A comes first. The unknown
        // SELECT control is skipped silently.
        assert_eq!(sink.lines, vec!["PRESS A", "SET MAIN 1.000 0.500"]);
        assert!(rx.try_recv().is_err());
    }

    /// Test that a sink failure is reported to the client
    #[tokio::test]
    async fn test_handle_frame_sink_error() {
        let (emulator, registry) = test_emulator();
        let (tx, mut rx) = unbounded_channel();
        let mut state = PadState::default();
        let mut sink = RecordingSink {
            fail: true,
            ..Default::default()
        };

        let frame = r#"{"type": "controller_input", "input": {"B": true}}"#;
        handle_frame(frame, &mut state, &mut sink, &tx, &registry, &emulator).await;

        let reply = rx.recv().await.unwrap();
        assert!(reply.contains("error"));
        assert!(reply.contains("pipe gone"));
    }

    /// Test the status command reply
    #[tokio::test]
    async fn test_handle_frame_status_command() {
        let (emulator, registry) = test_emulator();
        let (tx, mut rx) = unbounded_channel();
        let mut state = PadState::default();
        let mut sink = RecordingSink::default();

        handle_frame(
            r#"{"command": "status"}"#,
            &mut state,
            &mut sink,
            &tx,
            &registry,
            &emulator,
        )
        .await;

        assert_eq!(rx.recv().await.unwrap(), r#"{"status":"Stopped"}"#);
        assert!(sink.lines.is_empty());
    }

    /// Test that malformed JSON leaves the connection quiet but alive
    #[tokio::test]
    async fn test_handle_frame_invalid_json() {
        let (emulator, registry) = test_emulator();
        let (tx, mut rx) = unbounded_channel();
        let mut state = PadState::default();
        let mut sink = RecordingSink::default();

        handle_frame(
            "not json at all",
            &mut state,
            &mut sink,
            &tx,
            &registry,
            &emulator,
        )
        .await;
        handle_frame(
            r#"{"command": "self_destruct"}"#,
            &mut state,
            &mut sink,
            &tx,
            &registry,
            &emulator,
        )
        .await;

        assert!(sink.lines.is_empty());
        assert!(rx.try_recv().is_err());
    }

    /// Test input frames with an unexpected type tag
    #[tokio::test]
    async fn test_apply_input_frame_wrong_kind() {
        let mut state = PadState::default();
        let mut sink = RecordingSink::default();

        let frame: InputFrame =
            serde_json::from_str(r#"{"type": "keyboard_input", "input": {"A": true}}"#).unwrap();
        apply_input_frame(&frame, &mut state, &mut sink)
            .await
            .unwrap();

        assert!(sink.lines.is_empty());
    }

    /// Test the greeting frame shape
    #[test]
    fn test_greeting_serialization() {
        let client_id = Uuid::nil();
        let greeting = serde_json::to_value(Greeting {
            message: GREETING,
            client_id,
            player: 2,
        })
        .unwrap();

        assert_eq!(
            greeting,
            serde_json::json!({
                "message": "Connected to Dolphin Controller Server",
                "client_id": "00000000-0000-0000-0000-000000000000",
                "player": 2,
            }),
        );
    }

    /// Test command deserialization of the original wire names
    #[test]
    fn test_command_wire_names() {
        let frame: ControlFrame = serde_json::from_str(r#"{"command": "start_dolphin"}"#).unwrap();
        assert_eq!(frame.command, Command::StartDolphin);

        let frame: ControlFrame = serde_json::from_str(r#"{"command": "stop_dolphin"}"#).unwrap();
        assert_eq!(frame.command, Command::StopDolphin);
    }
}
