use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use meshcall_server::{ServerConfig, SignalingServer};

/// Real signaling server on an ephemeral local port.
pub struct TestServer {
    pub url: String,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        let server = SignalingServer::bind(ServerConfig {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ice_servers: vec!["stun:127.0.0.1:3478".to_owned()],
            ..Default::default()
        })
        .await?;
        let url = format!("ws://{}/ws", server.local_addr()?);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = server
                .serve(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            url,
            shutdown_tx,
            handle,
        })
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}
