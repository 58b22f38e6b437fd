use crate::device::HostsManager;
use common::{PlatformError, Result};
use quinn::{Endpoint, IdleTimeout, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub struct QuicServer {
    endpoint: Endpoint,
    hosts: HostsManager,
    max_message_size: usize,
}

impl QuicServer {
    pub fn new(
        addr: SocketAddr,
        hosts: HostsManager,
        max_message_size: usize,
        idle_timeout: Duration,
    ) -> Result<Self> {
        // 创建自签名证书
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .map_err(|e| PlatformError::ProtocolError(e.to_string()))?;

        let cert_der = cert
            .serialize_der()
            .map_err(|e| PlatformError::ProtocolError(e.to_string()))?;
        let key_der = cert.serialize_private_key_der();

        let cert_chain = vec![rustls::Certificate(cert_der)];
        let key = rustls::PrivateKey(key_der);

        let mut server_config = ServerConfig::with_single_cert(cert_chain, key)
            .map_err(|e| PlatformError::ProtocolError(e.to_string()))?;

        let idle_timeout = IdleTimeout::try_from(idle_timeout)
            .map_err(|e| PlatformError::QuicError(e.to_string()))?;
        let mut transport_config = quinn::TransportConfig::default();
        // 设备只使用双向流收发控制消息
        transport_config.max_concurrent_uni_streams(0_u32.into());
        transport_config.max_concurrent_bidi_streams(10_u32.into());
        transport_config.max_idle_timeout(Some(idle_timeout));
        transport_config.keep_alive_interval(Some(Duration::from_secs(5)));
        server_config.transport_config(Arc::new(transport_config));

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| PlatformError::QuicError(e.to_string()))?;

        Ok(Self {
            endpoint,
            hosts,
            max_message_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.endpoint.local_addr()?)
    }

    pub async fn run(&self) -> Result<()> {
        info!("QUIC server running...");

        while let Some(conn) = self.endpoint.accept().await {
            let hosts = self.hosts.clone();
            let max_message_size = self.max_message_size;

            tokio::spawn(async move {
                match conn.await {
                    Ok(connection) => {
                        info!("New QUIC connection from: {}", connection.remote_address());
                        super::connection::handle_connection(connection, hosts, max_message_size)
                            .await;
                    }
                    Err(e) => {
                        error!("Connection failed: {}", e);
                    }
                }
            });
        }

        Ok(())
    }
}
