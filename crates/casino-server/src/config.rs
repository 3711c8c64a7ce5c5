//! Startup configuration read from the environment.

use anyhow::Context;
use std::net::SocketAddr;

pub const DEFAULT_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// `tracing_subscriber::EnvFilter` directive string
    pub log_filter: String,
}

impl ServerConfig {
    /// Read `SERVER_ADDR`, `PORT` and `RUST_LOG`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = match (lookup("SERVER_ADDR"), lookup("PORT")) {
            (Some(addr), _) => addr
                .parse()
                .with_context(|| format!("SERVER_ADDR is not a socket address: {:?}", addr))?,
            (None, Some(port)) => {
                let port: u16 = port
                    .parse()
                    .with_context(|| format!("PORT is not a port number: {:?}", port))?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
            (None, None) => DEFAULT_ADDR.parse()?,
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into());

        Ok(Self { addr, log_filter })
    }
}
