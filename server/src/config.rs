use crate::error::ServerError;
use shared::{DEFAULT_MAX_LEADERBOARD, DEFAULT_MAX_PLAYERS, DEFAULT_PORT};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Settings for one relay instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Interface to listen on; all interfaces by default.
    pub bind_address: IpAddr,
    /// Port 0 lets the OS pick one, see `RelayServer::local_addr`.
    pub port: u16,
    /// Players admitted at once; further connections get the rejection notice.
    pub max_connections: usize,
    /// Entries kept on the leaderboard.
    pub max_leaderboard: usize,
}

impl RelayConfig {
    /// Address the listener binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Rejects limits that would leave the relay unable to do anything
    ///
    /// Both the player limit and the leaderboard size must be at least one.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_connections == 0 {
            return Err(ServerError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.max_leaderboard == 0 {
            return Err(ServerError::InvalidConfig(
                "max_leaderboard must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Loopback on an OS-assigned port, for tests and local tooling.
    pub fn local_ephemeral() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Self::default()
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_PLAYERS,
            max_leaderboard: DEFAULT_MAX_LEADERBOARD,
        }
    }
}
