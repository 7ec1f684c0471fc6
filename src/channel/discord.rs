//! Discord Rich Presence over the local Discord IPC socket.
//!
//! Frames are an 8 byte header (opcode and payload length, both
//! little-endian `u32`) followed by a JSON payload.

use super::{PresenceChannel, PresenceUpdate, TransportError};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Largest payload accepted from Discord.
const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Number of `discord-ipc-N` endpoints probed.
const IPC_SLOTS: usize = 10;

/// IPC frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    Handshake = 0,
    Frame = 1,
    Close = 2,
    Ping = 3,
    Pong = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = TransportError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::Handshake),
            1 => Ok(Opcode::Frame),
            2 => Ok(Opcode::Close),
            3 => Ok(Opcode::Ping),
            4 => Ok(Opcode::Pong),
            other => Err(TransportError::Protocol(format!("Unknown opcode {other}"))),
        }
    }
}

/// Byte stream to the Discord client.
pub trait IpcStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> IpcStream for T {}

/// Encode one IPC frame.
pub fn encode_frame(opcode: Opcode, payload: &Value) -> Result<Vec<u8>, TransportError> {
    let body = serde_json::to_vec(payload).map_err(|e| TransportError::Encoding(e.to_string()))?;
    let len = u32::try_from(body.len())
        .map_err(|_| TransportError::Encoding("Frame too large".to_string()))?;

    let mut frame = Vec::with_capacity(8 + body.len());
    frame.extend_from_slice(&(opcode as u32).to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

async fn write_frame<S>(
    stream: &mut S,
    opcode: Opcode,
    payload: &Value,
) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let frame = encode_frame(opcode, payload)?;
    stream.write_all(&frame).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame<S>(stream: &mut S) -> Result<(Opcode, Value), TransportError>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).await?;

    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let opcode = Opcode::try_from(opcode)?;
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if len > MAX_FRAME_LEN {
        return Err(TransportError::Protocol(format!("Frame of {len} bytes rejected")));
    }

    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    let payload =
        serde_json::from_slice(&body).map_err(|e| TransportError::Protocol(e.to_string()))?;
    Ok((opcode, payload))
}

/// Fail on a close frame or an `ERROR` event.
fn check_response(opcode: Opcode, payload: &Value) -> Result<(), TransportError> {
    if opcode == Opcode::Close || payload.get("evt").and_then(Value::as_str) == Some("ERROR") {
        let message = payload
            .pointer("/data/message")
            .or_else(|| payload.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(TransportError::Protocol(message.to_string()));
    }
    Ok(())
}

/// Build the `SET_ACTIVITY` command payload.
pub fn activity_payload(update: &PresenceUpdate, pid: u32, nonce: &str) -> Value {
    let mut activity = json!({ "details": update.details });
    if let Some(state) = &update.state {
        activity["state"] = json!(state);
    }
    if let Some(assets) = &update.assets {
        activity["assets"] = json!(assets);
    }

    json!({
        "cmd": "SET_ACTIVITY",
        "args": { "pid": pid, "activity": activity },
        "nonce": nonce,
    })
}

#[cfg(unix)]
async fn open_stream() -> Result<Box<dyn IpcStream>, TransportError> {
    use std::path::PathBuf;

    let base = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"]
        .iter()
        .find_map(|key| std::env::var_os(key))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));

    for slot in 0..IPC_SLOTS {
        let path = base.join(format!("discord-ipc-{slot}"));
        if let Ok(stream) = tokio::net::UnixStream::connect(&path).await {
            tracing::debug!("Connected to Discord IPC at {path:?}");
            return Ok(Box::new(stream));
        }
    }
    Err(TransportError::NotConnected)
}

#[cfg(windows)]
async fn open_stream() -> Result<Box<dyn IpcStream>, TransportError> {
    use tokio::net::windows::named_pipe::ClientOptions;

    for slot in 0..IPC_SLOTS {
        let name = format!(r"\\.\pipe\discord-ipc-{slot}");
        if let Ok(pipe) = ClientOptions::new().open(&name) {
            tracing::debug!("Connected to Discord IPC at {name}");
            return Ok(Box::new(pipe));
        }
    }
    Err(TransportError::NotConnected)
}

#[cfg(not(any(unix, windows)))]
async fn open_stream() -> Result<Box<dyn IpcStream>, TransportError> {
    Err(TransportError::NotConnected)
}

/// Discord Rich Presence client.
pub struct DiscordIpc {
    client_id: String,
    debug: bool,
    stream: Mutex<Option<Box<dyn IpcStream>>>,
}

impl DiscordIpc {
    pub fn new(client_id: impl Into<String>, debug: bool) -> Self {
        Self {
            client_id: client_id.into(),
            debug,
            stream: Mutex::new(None),
        }
    }

    /// Handshake over an already-open stream.
    pub async fn connect_with(&self, mut stream: Box<dyn IpcStream>) -> Result<(), TransportError> {
        let handshake = json!({ "v": 1, "client_id": self.client_id });
        write_frame(&mut *stream, Opcode::Handshake, &handshake).await?;

        let (opcode, payload) = read_frame(&mut *stream).await?;
        check_response(opcode, &payload)?;
        if self.debug {
            tracing::info!("Discord handshake response: {payload}");
        }

        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.stream.lock().await.is_some()
    }
}

#[async_trait]
impl PresenceChannel for DiscordIpc {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.client_id.trim().is_empty() {
            return Err(TransportError::Protocol("No Discord client id configured".to_string()));
        }
        let stream = open_stream().await?;
        self.connect_with(stream).await
    }

    async fn update(&self, update: &PresenceUpdate) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;

        let nonce = uuid::Uuid::new_v4().to_string();
        let payload = activity_payload(update, std::process::id(), &nonce);

        let result = async {
            write_frame(&mut **stream, Opcode::Frame, &payload).await?;
            let (opcode, response) = read_frame(&mut **stream).await?;
            if self.debug {
                tracing::info!("Discord SET_ACTIVITY response: {response}");
            }
            check_response(opcode, &response)
        }
        .await;

        // A broken pipe leaves the stream unusable; reconnect on the next toggle.
        if let Err(TransportError::Network(_)) = &result {
            *guard = None;
        }
        result
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            write_frame(&mut *stream, Opcode::Close, &json!({})).await?;
            stream.shutdown().await?;
        }
        Ok(())
    }
}
