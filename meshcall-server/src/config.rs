use clap::Parser;
use meshcall_core::IceServerConfig;
use meshcall_core::utils::default_ice_servers;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "meshcall-server", version, about = "Room signaling server for mesh calls")]
pub struct ServerConfig {
    /// Address to bind.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Browser origin allowed to open signaling channels.
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    pub allowed_origin: String,

    /// ICE server urls handed to clients. Falls back to public STUN servers when empty.
    #[arg(long = "ice-server", env = "ICE_SERVERS", value_delimiter = ',')]
    pub ice_servers: Vec<String>,

    #[arg(long, env = "TURN_USERNAME")]
    pub turn_username: Option<String>,

    #[arg(long, env = "TURN_CREDENTIAL")]
    pub turn_credential: Option<String>,

    #[arg(long, env = "ROOM_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3001,
            allowed_origin: "http://localhost:3000".to_owned(),
            ice_servers: Vec::new(),
            turn_username: None,
            turn_credential: None,
            sweep_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// TURN credentials are only attached to `turn:`/`turns:` urls.
    pub fn ice_server_configs(&self) -> Vec<IceServerConfig> {
        if self.ice_servers.is_empty() {
            return default_ice_servers();
        }

        self.ice_servers
            .iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(|url| {
                let is_turn = url.starts_with("turn:") || url.starts_with("turns:");
                IceServerConfig {
                    urls: vec![url.to_owned()],
                    username: self.turn_username.clone().filter(|_| is_turn),
                    credential: self.turn_credential.clone().filter(|_| is_turn),
                }
            })
            .collect()
    }
}
