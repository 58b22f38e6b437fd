use crate::device::HostsManager;
use common::{Message, PlatformError, Result, ACK};
use quinn::Connection;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 单条设备连接的注册状态
///
/// 第一条设备信息注册设备，之后同一设备的上报只刷新信息。
/// 会话销毁时注销设备，保证每条连接恰好注销一次。
pub struct DeviceSession {
    hosts: HostsManager,
    peer_ip: String,
    udid: Option<String>,
}

impl DeviceSession {
    pub fn new(hosts: HostsManager, peer_ip: impl Into<String>) -> Self {
        Self {
            hosts,
            peer_ip: peer_ip.into(),
            udid: None,
        }
    }

    pub fn udid(&self) -> Option<&str> {
        self.udid.as_deref()
    }

    /// 处理一条消息，返回需要回写给设备的数据
    pub fn handle(&mut self, msg: Message) -> Result<Vec<u8>> {
        match msg {
            Message::DeviceInfo(mut device) => {
                if device.udid.is_empty() {
                    return Err(PlatformError::InvalidParameter(
                        "device info without udid".to_string(),
                    ));
                }
                if device.ip.is_empty() {
                    device.ip = self.peer_ip.clone();
                }
                // 占用状态只能通过 acquire/release 修改
                device.reserved.clear();

                match self.udid.as_deref() {
                    None => {
                        let udid = device.udid.clone();
                        let connections = self.hosts.add_from_device_info(device);
                        info!("✓ Device registered: {} (connections: {})", udid, connections);
                        self.udid = Some(udid);
                    }
                    Some(udid) if udid == device.udid => {
                        if !self.hosts.refresh(device) {
                            warn!("Device {} vanished before refresh", udid);
                        }
                    }
                    Some(udid) => {
                        return Err(PlatformError::ProtocolError(format!(
                            "connection registered as {}, got device info for {}",
                            udid, device.udid
                        )));
                    }
                }
                Ok(ACK.to_vec())
            }
            Message::Ping => {
                debug!("Received ping from {}", self.peer_ip);
                Message::Ping.encode()
            }
        }
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(udid) = self.udid.take() {
            info!("Device disconnected: {}", udid);
            self.hosts.remove(&udid);
        }
    }
}

/// 按顺序处理连接上的双向流，每条流承载一条消息
pub async fn handle_connection(connection: Connection, hosts: HostsManager, max_message_size: usize) {
    let session_id = Uuid::new_v4();
    info!("Handling connection with session: {}", session_id);

    let peer_ip = connection.remote_address().ip().to_string();
    let mut session = DeviceSession::new(hosts, peer_ip);

    loop {
        let (mut send, mut recv) = match connection.accept_bi().await {
            Ok(streams) => streams,
            Err(e) => {
                debug!("Session {} ({:?}) closed: {}", session_id, session.udid(), e);
                break;
            }
        };

        let buf = match recv.read_to_end(max_message_size).await {
            Ok(data) => data,
            Err(e) => {
                error!("Session {} failed to read message: {}", session_id, e);
                continue;
            }
        };

        let reply = match Message::decode(&buf).and_then(|msg| session.handle(msg)) {
            Ok(reply) => reply,
            Err(e) => {
                error!("Session {} failed to handle message: {}", session_id, e);
                continue;
            }
        };

        if let Err(e) = send.write_all(&reply).await {
            warn!("Failed to write reply: {}", e);
            continue;
        }
        let _ = send.finish().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::DeviceInfo;

    fn device_info(udid: &str, ip: &str) -> Message {
        Message::DeviceInfo(DeviceInfo::new(udid, ip))
    }

    #[test]
    fn test_register_on_first_report() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts.clone(), "192.168.1.10");

        let reply = session.handle(device_info("u1", "")).unwrap();

        assert_eq!(reply, ACK);
        assert_eq!(session.udid(), Some("u1"));
        let stored = hosts.from_udid("u1").unwrap();
        assert_eq!(stored.ip, "192.168.1.10");
        assert_eq!(stored.connection_count, 1);
    }

    #[test]
    fn test_report_cannot_reserve_device() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts.clone(), "192.168.1.10");
        let mut device = DeviceInfo::new("u1", "");
        device.reserved = "self".to_string();

        session.handle(Message::DeviceInfo(device)).unwrap();

        assert!(!hosts.from_udid("u1").unwrap().is_reserved());
        assert!(hosts.acquire("u1").is_ok());
    }

    #[test]
    fn test_repeated_report_refreshes() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts.clone(), "192.168.1.10");
        session.handle(device_info("u1", "10.0.0.1")).unwrap();

        let mut update = DeviceInfo::new("u1", "10.0.0.1");
        update.brand = "Google".to_string();
        session.handle(Message::DeviceInfo(update)).unwrap();

        let stored = hosts.from_udid("u1").unwrap();
        assert_eq!(stored.connection_count, 1);
        assert_eq!(stored.brand, "Google");
    }

    #[test]
    fn test_reject_second_udid() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts.clone(), "192.168.1.10");
        session.handle(device_info("u1", "")).unwrap();

        assert!(session.handle(device_info("u2", "")).is_err());
        assert!(hosts.from_udid("u2").is_none());
        assert_eq!(session.udid(), Some("u1"));
    }

    #[test]
    fn test_reject_empty_udid() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts.clone(), "192.168.1.10");

        assert!(matches!(
            session.handle(device_info("", "")),
            Err(PlatformError::InvalidParameter(_))
        ));
        assert!(hosts.is_empty());
    }

    #[test]
    fn test_ping_reply() {
        let hosts = HostsManager::new();
        let mut session = DeviceSession::new(hosts, "192.168.1.10");

        let reply = session.handle(Message::Ping).unwrap();
        assert_eq!(Message::decode(&reply).unwrap(), Message::Ping);
        assert!(session.udid().is_none());
    }

    #[test]
    fn test_drop_unregisters_once() {
        let hosts = HostsManager::new();
        let mut first = DeviceSession::new(hosts.clone(), "192.168.1.10");
        let mut second = DeviceSession::new(hosts.clone(), "192.168.1.11");
        first.handle(device_info("u1", "")).unwrap();
        second.handle(device_info("u1", "")).unwrap();
        assert_eq!(hosts.from_udid("u1").unwrap().connection_count, 2);
        assert_eq!(hosts.from_udid("u1").unwrap().ip, "192.168.1.11");

        drop(first);
        assert_eq!(hosts.from_udid("u1").unwrap().connection_count, 1);

        drop(second);
        assert!(hosts.from_udid("u1").is_none());
    }

    #[test]
    fn test_drop_without_registration() {
        let hosts = HostsManager::new();
        hosts.add_from_device_info(DeviceInfo::new("u1", "10.0.0.1"));

        let session = DeviceSession::new(hosts.clone(), "192.168.1.10");
        drop(session);

        assert_eq!(hosts.from_udid("u1").unwrap().connection_count, 1);
    }
}
