use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::resolve_data_path;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_UNDO_WINDOW_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub data_path: PathBuf,
    pub undo_window: Duration,
}

impl Config {
    /// Reads the environment, after loading `.env` if one is present.
    /// Unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        let undo_secs = env::var("UNDO_WINDOW_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_UNDO_WINDOW_SECS);

        Self {
            bind_addr,
            port,
            data_path: resolve_data_path(),
            undo_window: Duration::from_secs(undo_secs),
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
