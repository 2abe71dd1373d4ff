//! The outer packet frame exchanged between the coordinator and worker
//! nodes: `[1-byte type][4-byte length][payload]`, and the packet envelope
//! (type + versioned payload) it carries.
//!
//! Framing is modeled directly on the length-prefixed async read/write loop
//! used elsewhere in this workspace for inter-process messages, adapted from
//! a JSON payload to a binary [`crate::translator::Translator`] payload and
//! given a leading type byte so a single stream can multiplex every packet
//! kind named in this module.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use buildmux_core::{BuildRequest, BuildRequestConfiguration, BuildResult, NodeConfiguration, TaskHostConfiguration, TaskHostTaskComplete};
use buildmux_events::BuildEvent;

use crate::error::{Error, Result};
use crate::packets::{
    BuildSubmissionStarted, NodeShutdown, TaskHostCallbackQueryRequest, TaskHostCallbackQueryResponse,
    TaskHostCallbackResourceRequest, TaskHostCallbackResourceResponse,
};
use crate::translator::{Translatable, Translator};

/// Maximum payload size accepted on read: 16 MiB. Large enough for a
/// `BuildResult` carrying thousands of items without bounding memory use of
/// a single malformed or hostile frame.
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Current payload envelope version. Bumped whenever a packet's wire shape
/// gains a field that changes its byte layout.
pub const CURRENT_PAYLOAD_VERSION: u8 = 2;

/// Oldest payload version a reader still accepts; producers never emit
/// below [`CURRENT_PAYLOAD_VERSION`] unless legacy output is requested.
pub const MIN_SUPPORTED_PAYLOAD_VERSION: u8 = 1;

/// Environment variable requesting legacy-compatible (previous-version)
/// payload output, for rolling upgrades where not every node has been
/// updated yet.
pub const LEGACY_WIRE_FORMAT_ENV_VAR: &str = "BUILDMUX_LEGACY_WIRE_FORMAT";

fn legacy_wire_format_requested() -> bool {
    std::env::var(LEGACY_WIRE_FORMAT_ENV_VAR)
        .map(|value| value.eq_ignore_ascii_case("1") || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The one-byte discriminant identifying a packet's payload shape on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// A [`BuildRequest`].
    BuildRequest = 0,
    /// A [`BuildRequestConfiguration`].
    BuildRequestConfiguration = 1,
    /// A [`BuildResult`].
    BuildResult = 2,
    /// A [`NodeConfiguration`] handshake.
    NodeConfiguration = 3,
    /// A [`BuildEvent`], wrapped as a `LogMessage` packet.
    LogMessage = 4,
    /// A [`TaskHostConfiguration`].
    TaskHostConfiguration = 5,
    /// A [`TaskHostTaskComplete`].
    TaskHostTaskComplete = 6,
    /// A [`TaskHostCallbackQueryRequest`].
    TaskHostCallbackQueryRequest = 7,
    /// A [`TaskHostCallbackQueryResponse`].
    TaskHostCallbackQueryResponse = 8,
    /// A [`TaskHostCallbackResourceRequest`].
    TaskHostCallbackResourceRequest = 9,
    /// A [`TaskHostCallbackResourceResponse`].
    TaskHostCallbackResourceResponse = 10,
    /// A [`NodeShutdown`].
    NodeShutdown = 11,
    /// A [`BuildSubmissionStarted`].
    BuildSubmissionStarted = 12,
}

impl PacketType {
    fn from_byte(byte: u8) -> Result<Self> {
        Ok(match byte {
            0 => Self::BuildRequest,
            1 => Self::BuildRequestConfiguration,
            2 => Self::BuildResult,
            3 => Self::NodeConfiguration,
            4 => Self::LogMessage,
            5 => Self::TaskHostConfiguration,
            6 => Self::TaskHostTaskComplete,
            7 => Self::TaskHostCallbackQueryRequest,
            8 => Self::TaskHostCallbackQueryResponse,
            9 => Self::TaskHostCallbackResourceRequest,
            10 => Self::TaskHostCallbackResourceResponse,
            11 => Self::NodeShutdown,
            12 => Self::BuildSubmissionStarted,
            other => return Err(Error::UnknownPacketType { byte: other }),
        })
    }
}

/// A packet, carrying both the type tag and a decoded payload.
#[derive(Debug, Clone)]
pub enum Packet {
    /// See [`PacketType::BuildRequest`].
    BuildRequest(BuildRequest),
    /// See [`PacketType::BuildRequestConfiguration`].
    BuildRequestConfiguration(BuildRequestConfiguration),
    /// See [`PacketType::BuildResult`].
    BuildResult(BuildResult),
    /// See [`PacketType::NodeConfiguration`].
    NodeConfiguration(NodeConfiguration),
    /// See [`PacketType::LogMessage`].
    LogMessage(BuildEvent),
    /// See [`PacketType::TaskHostConfiguration`].
    TaskHostConfiguration(TaskHostConfiguration),
    /// See [`PacketType::TaskHostTaskComplete`].
    TaskHostTaskComplete(TaskHostTaskComplete),
    /// See [`PacketType::TaskHostCallbackQueryRequest`].
    TaskHostCallbackQueryRequest(TaskHostCallbackQueryRequest),
    /// See [`PacketType::TaskHostCallbackQueryResponse`].
    TaskHostCallbackQueryResponse(TaskHostCallbackQueryResponse),
    /// See [`PacketType::TaskHostCallbackResourceRequest`].
    TaskHostCallbackResourceRequest(TaskHostCallbackResourceRequest),
    /// See [`PacketType::TaskHostCallbackResourceResponse`].
    TaskHostCallbackResourceResponse(TaskHostCallbackResourceResponse),
    /// See [`PacketType::NodeShutdown`].
    NodeShutdown(NodeShutdown),
    /// See [`PacketType::BuildSubmissionStarted`].
    BuildSubmissionStarted(BuildSubmissionStarted),
}

impl Packet {
    fn packet_type(&self) -> PacketType {
        match self {
            Self::BuildRequest(_) => PacketType::BuildRequest,
            Self::BuildRequestConfiguration(_) => PacketType::BuildRequestConfiguration,
            Self::BuildResult(_) => PacketType::BuildResult,
            Self::NodeConfiguration(_) => PacketType::NodeConfiguration,
            Self::LogMessage(_) => PacketType::LogMessage,
            Self::TaskHostConfiguration(_) => PacketType::TaskHostConfiguration,
            Self::TaskHostTaskComplete(_) => PacketType::TaskHostTaskComplete,
            Self::TaskHostCallbackQueryRequest(_) => PacketType::TaskHostCallbackQueryRequest,
            Self::TaskHostCallbackQueryResponse(_) => PacketType::TaskHostCallbackQueryResponse,
            Self::TaskHostCallbackResourceRequest(_) => PacketType::TaskHostCallbackResourceRequest,
            Self::TaskHostCallbackResourceResponse(_) => PacketType::TaskHostCallbackResourceResponse,
            Self::NodeShutdown(_) => PacketType::NodeShutdown,
            Self::BuildSubmissionStarted(_) => PacketType::BuildSubmissionStarted,
        }
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        let mut t = Translator::writer(&mut body);
        match self {
            Self::BuildRequest(v) => t.write(v)?,
            Self::BuildRequestConfiguration(v) => t.write(v)?,
            Self::BuildResult(v) => t.write(v)?,
            Self::NodeConfiguration(v) => t.write(v)?,
            Self::LogMessage(event) => {
                let json = serde_json::to_vec(event).map_err(|e| Error::malformed(e.to_string()))?;
                t.write_bytes(&json)?;
            }
            Self::TaskHostConfiguration(v) => t.write(v)?,
            Self::TaskHostTaskComplete(v) => t.write(v)?,
            Self::TaskHostCallbackQueryRequest(v) => t.write(v)?,
            Self::TaskHostCallbackQueryResponse(v) => t.write(v)?,
            Self::TaskHostCallbackResourceRequest(v) => t.write(v)?,
            Self::TaskHostCallbackResourceResponse(v) => t.write(v)?,
            Self::NodeShutdown(v) => t.write(v)?,
            Self::BuildSubmissionStarted(v) => t.write(v)?,
        }
        Ok(body)
    }

    /// Encode this packet's versioned payload: `[1-byte version][body]`.
    ///
    /// Emits [`MIN_SUPPORTED_PAYLOAD_VERSION`] instead of
    /// [`CURRENT_PAYLOAD_VERSION`] when [`LEGACY_WIRE_FORMAT_ENV_VAR`] asks
    /// for legacy-compatible output.
    pub fn encode_payload(&self) -> Result<Vec<u8>> {
        let version = if legacy_wire_format_requested() {
            MIN_SUPPORTED_PAYLOAD_VERSION
        } else {
            CURRENT_PAYLOAD_VERSION
        };
        let mut payload = vec![version];
        payload.extend(self.encode_body()?);
        Ok(payload)
    }

    fn decode_body(packet_type: PacketType, bytes: &[u8]) -> Result<Self> {
        let mut t = Translator::reader(bytes);
        Ok(match packet_type {
            PacketType::BuildRequest => Self::BuildRequest(t.read()?),
            PacketType::BuildRequestConfiguration => Self::BuildRequestConfiguration(t.read()?),
            PacketType::BuildResult => Self::BuildResult(t.read()?),
            PacketType::NodeConfiguration => Self::NodeConfiguration(t.read()?),
            PacketType::LogMessage => {
                let json = t.read_bytes()?;
                let event = serde_json::from_slice(&json).map_err(|e| Error::malformed(e.to_string()))?;
                Self::LogMessage(event)
            }
            PacketType::TaskHostConfiguration => Self::TaskHostConfiguration(t.read()?),
            PacketType::TaskHostTaskComplete => Self::TaskHostTaskComplete(t.read()?),
            PacketType::TaskHostCallbackQueryRequest => Self::TaskHostCallbackQueryRequest(t.read()?),
            PacketType::TaskHostCallbackQueryResponse => Self::TaskHostCallbackQueryResponse(t.read()?),
            PacketType::TaskHostCallbackResourceRequest => Self::TaskHostCallbackResourceRequest(t.read()?),
            PacketType::TaskHostCallbackResourceResponse => Self::TaskHostCallbackResourceResponse(t.read()?),
            PacketType::NodeShutdown => Self::NodeShutdown(t.read()?),
            PacketType::BuildSubmissionStarted => Self::BuildSubmissionStarted(t.read()?),
        })
    }

    /// Decode a packet of `packet_type` from its versioned payload bytes.
    pub fn decode_payload(packet_type: PacketType, payload: &[u8]) -> Result<Self> {
        let Some((&version, body)) = payload.split_first() else {
            return Err(Error::malformed("empty packet payload"));
        };
        if version < MIN_SUPPORTED_PAYLOAD_VERSION {
            return Err(Error::malformed(format!(
                "unsupported payload version {version}, minimum supported is {MIN_SUPPORTED_PAYLOAD_VERSION}"
            )));
        }
        Self::decode_body(packet_type, body)
    }

    /// Write this packet as a complete frame: type byte, big-endian length,
    /// versioned payload.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Result<()> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
            size: u32::MAX,
            max: MAX_PAYLOAD_SIZE,
        })?;
        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }
        writer.write_u8(self.packet_type() as u8).await.map_err(Error::from)?;
        writer.write_all(&len.to_be_bytes()).await.map_err(Error::from)?;
        writer.write_all(&payload).await.map_err(Error::from)?;
        writer.flush().await.map_err(Error::from)
    }

    /// Read one complete frame from `reader`.
    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Self> {
        let packet_type = PacketType::from_byte(reader.read_u8().await.map_err(Error::from)?)?;

        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await.map_err(Error::from)?;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await.map_err(Error::from)?;
        Self::decode_payload(packet_type, &payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildmux_core::ConfigurationId;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn frame_round_trips_over_a_stream() {
        let packet = Packet::NodeShutdown(NodeShutdown {
            reason: "draining".to_string(),
        });
        let mut buf = Vec::new();
        packet.write_to(&mut buf).await.unwrap();

        let mut reader = BufReader::new(Cursor::new(buf));
        let read = Packet::read_from(&mut reader).await.unwrap();
        match read {
            Packet::NodeShutdown(shutdown) => assert_eq!(shutdown.reason, "draining"),
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_declared_length_is_rejected() {
        let mut buf = Vec::new();
        buf.push(PacketType::NodeShutdown as u8);
        buf.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());

        let mut reader = BufReader::new(Cursor::new(buf));
        let result = Packet::read_from(&mut reader).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unknown_packet_type_byte_is_rejected() {
        let mut buf = Vec::new();
        buf.push(255);
        buf.extend_from_slice(&0u32.to_be_bytes());

        let mut reader = BufReader::new(Cursor::new(buf));
        let result = Packet::read_from(&mut reader).await;
        assert!(matches!(result, Err(Error::UnknownPacketType { byte: 255 })));
    }

    #[tokio::test]
    async fn build_request_round_trips() {
        let request = BuildRequest::new_top_level(1, 1, ConfigurationId::new(3), vec!["Build".to_string()]);
        let packet = Packet::BuildRequest(request);
        let mut buf = Vec::new();
        packet.write_to(&mut buf).await.unwrap();

        let mut reader = BufReader::new(Cursor::new(buf));
        let read = Packet::read_from(&mut reader).await.unwrap();
        match read {
            Packet::BuildRequest(request) => assert!(request.wants_target("Build")),
            other => panic!("unexpected packet: {other:?}"),
        }
    }

    #[test]
    fn legacy_wire_format_env_var_forces_minimum_version() {
        temp_env::with_var(LEGACY_WIRE_FORMAT_ENV_VAR, Some("true"), || {
            let packet = Packet::NodeShutdown(NodeShutdown {
                reason: "x".to_string(),
            });
            let payload = packet.encode_payload().unwrap();
            assert_eq!(payload[0], MIN_SUPPORTED_PAYLOAD_VERSION);
        });
    }
}
