use crate::{client::ClientRegistry, session::error_frame};
use poem::error::{InternalServerError, NotFound};
use poem_openapi::Enum;
use serde::Serialize;
use std::{fmt, io::ErrorKind, path::PathBuf, process::Stdio, sync::Arc};
#[cfg(unix)]
use std::time::Duration;
use tokio::{
    process::{Child, Command},
    sync::Mutex,
};

/// How long a stopped emulator gets to exit on its own before SIGKILL.
#[cfg(unix)]
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Emulator run state to return via the API and the socket protocol
#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq, Serialize)]
pub enum EmulatorStatus {
    Running,
    Stopped,
}

impl fmt::Display for EmulatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmulatorStatus::Running => write!(f, "Running"),
            EmulatorStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Shared handle to the managed Dolphin process.
#[derive(Clone)]
pub struct EmulatorHandle {
    path: PathBuf,
    child: Arc<Mutex<Option<Child>>>,
}

impl EmulatorHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        EmulatorHandle {
            path: path.into(),
            child: Arc::new(Mutex::new(None)),
        }
    }

    /// Is the child we spawned still alive? Reaps a finished child.
    fn managed_alive(child: &mut Option<Child>) -> bool {
        match child {
            Some(running) => match running.try_wait() {
                Ok(None) => true,
                _ => {
                    *child = None;
                    false
                }
            },
            None => false,
        }
    }

    /// Look for a Dolphin the operator started outside of us, by executable
    /// name.
    #[cfg(unix)]
    async fn external_running(&self) -> bool {
        let Some(name) = self.path.file_name().and_then(|name| name.to_str()) else {
            return false;
        };

        match Command::new("pgrep").arg("-x").arg(name).output().await {
            Ok(output) => output.status.success() && !output.stdout.is_empty(),
            Err(_) => false,
        }
    }

    #[cfg(not(unix))]
    async fn external_running(&self) -> bool {
        false
    }
}

/// Start the emulator. Does nothing if one is already running.
pub async fn emulator_start(
    handle: &EmulatorHandle,
    registry: &ClientRegistry,
) -> Result<EmulatorStatus, poem::Error> {
    let mut child = handle.child.lock().await;

    // Already up, either ours or external.
    if EmulatorHandle::managed_alive(&mut child) || handle.external_running().await {
        tracing::info!("emulator is already running");
        return Ok(EmulatorStatus::Running);
    }

    tracing::info!(path = %handle.path.display(), "starting emulator");
    let spawned = Command::new(&handle.path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match spawned {
        Ok(process) => {
            *child = Some(process);
            Ok(EmulatorStatus::Running)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let message = format!("Emulator executable not found: {}", handle.path.display());
            tracing::error!("{message}");
            registry.broadcast(&error_frame(&message)).await;
            Err(NotFound(err))
        }
        Err(err) => {
            let message = format!("Failed to start emulator: {err}");
            tracing::error!("{message}");
            registry.broadcast(&error_frame(&message)).await;
            Err(InternalServerError(err))
        }
    }
}

/// Stop the managed emulator process. Does nothing if none is running.
pub async fn emulator_stop(
    handle: &EmulatorHandle,
    registry: &ClientRegistry,
) -> Result<EmulatorStatus, poem::Error> {
    let mut child = handle.child.lock().await;

    let Some(process) = child.as_mut() else {
        tracing::info!("emulator is not running");
        return Ok(EmulatorStatus::Stopped);
    };

    tracing::info!("stopping emulator");
    if let Err(err) = terminate(process).await {
        // The child stays in the handle so status keeps tracking it.
        let message = format!("Failed to stop emulator: {err}");
        tracing::error!("{message}");
        registry.broadcast(&error_frame(&message)).await;
        return Err(InternalServerError(err));
    }

    *child = None;
    Ok(EmulatorStatus::Stopped)
}

/// Ask the process to exit and reap it. SIGTERM first so the emulator can
/// save state, SIGKILL if it will not go.
#[cfg(unix)]
async fn terminate(process: &mut Child) -> std::io::Result<()> {
    let Some(pid) = process.id() else {
        // Already exited and reaped.
        return Ok(());
    };

    let _ = Command::new("kill").arg(pid.to_string()).status().await;
    match tokio::time::timeout(STOP_GRACE, process.wait()).await {
        Ok(exited) => exited.map(drop),
        Err(_) => process.kill().await,
    }
}

#[cfg(not(unix))]
async fn terminate(process: &mut Child) -> std::io::Result<()> {
    process.kill().await
}

/// Current emulator state, managed child or external process.
pub async fn emulator_status(handle: &EmulatorHandle) -> EmulatorStatus {
    let mut child = handle.child.lock().await;

    if EmulatorHandle::managed_alive(&mut child) || handle.external_running().await {
        EmulatorStatus::Running
    } else {
        EmulatorStatus::Stopped
    }
}
