//! VRChat chatbox over OSC/UDP.
//!
//! Only the subset of OSC 1.0 needed for `/chatbox/input` is encoded:
//! string and boolean arguments.

use super::{ChatSink, TransportError};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// OSC address of the chatbox input endpoint.
pub const CHATBOX_INPUT: &str = "/chatbox/input";

/// One OSC argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscArg<'a> {
    Str(&'a str),
    Bool(bool),
}

impl OscArg<'_> {
    fn type_tag(&self) -> char {
        match self {
            OscArg::Str(_) => 's',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
        }
    }
}

/// Append a NUL-terminated string padded to a four byte boundary.
fn push_padded(buf: &mut Vec<u8>, s: &str) -> Result<(), TransportError> {
    if s.as_bytes().contains(&0) {
        return Err(TransportError::Encoding(
            "OSC strings cannot contain NUL bytes".to_string(),
        ));
    }
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    while buf.len() % 4 != 0 {
        buf.push(0);
    }
    Ok(())
}

/// Encode a single OSC message.
pub fn encode_message(address: &str, args: &[OscArg<'_>]) -> Result<Vec<u8>, TransportError> {
    if !address.starts_with('/') {
        return Err(TransportError::Encoding(format!(
            "OSC address must start with '/': {address}"
        )));
    }

    let mut buf = Vec::with_capacity(64);
    push_padded(&mut buf, address)?;

    let tags: String = std::iter::once(',')
        .chain(args.iter().map(OscArg::type_tag))
        .collect();
    push_padded(&mut buf, &tags)?;

    for arg in args {
        // Booleans are carried entirely by their type tag.
        if let OscArg::Str(s) = arg {
            push_padded(&mut buf, s)?;
        }
    }

    Ok(buf)
}

/// Encode a chatbox message that is sent immediately (no keyboard popup).
pub fn encode_chatbox(text: &str) -> Result<Vec<u8>, TransportError> {
    encode_message(CHATBOX_INPUT, &[OscArg::Str(text), OscArg::Bool(true)])
}

/// Sends chatbox messages to a VRChat OSC listener.
pub struct OscChatbox {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscChatbox {
    /// Bind an ephemeral local socket aimed at `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let target = tokio::net::lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| TransportError::Protocol(format!("No address for {host}:{port}")))?;

        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;

        tracing::debug!("OSC chatbox target {target}");
        Ok(Self { socket, target })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

#[async_trait]
impl ChatSink for OscChatbox {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let packet = encode_chatbox(text)?;
        self.socket.send_to(&packet, self.target).await?;
        Ok(())
    }
}
