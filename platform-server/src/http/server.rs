use crate::device::HostsManager;
use common::Result;
use std::net::SocketAddr;
use tracing::info;

#[derive(Clone)]
pub struct HttpServer {
    addr: SocketAddr,
    hosts: HostsManager,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, hosts: HostsManager) -> Self {
        Self { addr, hosts }
    }

    pub async fn run(&self) -> Result<()> {
        info!("HTTP server running on {}", self.addr);

        let app = super::routes::create_router(self.hosts.clone());

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
