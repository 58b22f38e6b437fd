use crate::error::{PlatformError, Result};
use crate::types::DeviceInfo;
use serde::{Deserialize, Serialize};

/// 消息类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    DeviceInfo = 0x00,
    Ping = 0x01,
}

/// 设备与平台之间的消息
///
/// 变体序号即类型标签，解码时直接还原为具体载荷。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    DeviceInfo(DeviceInfo),
    Ping,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::DeviceInfo(_) => MessageType::DeviceInfo,
            Message::Ping => MessageType::Ping,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PlatformError::ProtocolError(e.to_string()))
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        bincode::deserialize(buf).map_err(|e| PlatformError::ProtocolError(e.to_string()))
    }
}

/// 设备注册成功后的应答
pub const ACK: &[u8] = b"OK";
