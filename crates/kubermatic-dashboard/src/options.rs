//! Contains available options to configure the [`Server`][crate::server::Server].
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

/// The default socket address the API binds to, `0.0.0.0:8080`.
pub const DEFAULT_SOCKET_ADDRESS: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Specifies available API server options.
///
/// The [`Default`] implementation binds to `0.0.0.0:8080` and waits up to ten seconds, polling
/// every second, for a newly created cluster to become accessible.
///
/// ### Example with custom IP address and port
///
/// ```
/// use kubermatic_dashboard::options::ServerOptions;
///
/// // Set IP address and port at the same time
/// let options = ServerOptions::builder()
///     .bind_address([127, 0, 0, 1], 12345)
///     .build();
///
/// // Set IP address only
/// let options = ServerOptions::builder()
///     .bind_ip([127, 0, 0, 1])
///     .build();
///
/// // Set port only
/// let options = ServerOptions::builder()
///     .bind_port(12345)
///     .build();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerOptions {
    /// The socket address the [`TcpListener`][tokio::net::TcpListener] binds to.
    pub socket_addr: SocketAddr,

    /// How long cluster creation waits for the new cluster to become readable by its creator.
    pub readiness: ReadinessPolicy,
}

/// Interval and deadline of the post-creation readiness poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ServerOptions {
    /// Returns the default [`ServerOptionsBuilder`] which allows to selectively customize the
    /// options.
    pub fn builder() -> ServerOptionsBuilder {
        ServerOptionsBuilder::default()
    }
}

/// Selectively customizes [`ServerOptions`].
#[derive(Debug, Default)]
pub struct ServerOptionsBuilder {
    socket_addr: Option<SocketAddr>,
    readiness: Option<ReadinessPolicy>,
}

impl ServerOptionsBuilder {
    /// Sets the socket address the server binds to.
    pub fn bind_address(mut self, bind_ip: impl Into<IpAddr>, bind_port: u16) -> Self {
        self.socket_addr = Some(SocketAddr::new(bind_ip.into(), bind_port));
        self
    }

    /// Sets the IP address of the socket address the server binds to.
    pub fn bind_ip(mut self, bind_ip: impl Into<IpAddr>) -> Self {
        let addr = self.socket_addr.get_or_insert(DEFAULT_SOCKET_ADDRESS);
        addr.set_ip(bind_ip.into());
        self
    }

    /// Sets the port of the socket address the server binds to.
    pub fn bind_port(mut self, bind_port: u16) -> Self {
        let addr = self.socket_addr.get_or_insert(DEFAULT_SOCKET_ADDRESS);
        addr.set_port(bind_port);
        self
    }

    pub fn readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Builds the final [`ServerOptions`] by using default values for any not explicitly set
    /// option.
    pub fn build(self) -> ServerOptions {
        ServerOptions {
            socket_addr: self.socket_addr.unwrap_or(DEFAULT_SOCKET_ADDRESS),
            readiness: self.readiness.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        assert_eq!(ServerOptions::default().socket_addr, DEFAULT_SOCKET_ADDRESS);

        let options = ServerOptions::builder().bind_port(9090).build();
        assert_eq!(options.socket_addr.to_string(), "0.0.0.0:9090");

        let options = ServerOptions::builder()
            .bind_ip([127, 0, 0, 1])
            .bind_port(1234)
            .build();
        assert_eq!(options.socket_addr.to_string(), "127.0.0.1:1234");
        assert_eq!(options.readiness, ReadinessPolicy::default());
    }
}
