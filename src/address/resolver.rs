use std::net::{SocketAddr, ToSocketAddrs};

use tracing::debug;

use super::ServerAddress;

/// A resolved endpoint. Only produced by a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    host_name: String,
    socket_addr: SocketAddr,
}

impl Address {
    pub(crate) fn new(host_name: impl Into<String>, socket_addr: SocketAddr) -> Self {
        Self {
            host_name: host_name.into(),
            socket_addr,
        }
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn host_address(&self) -> String {
        self.socket_addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.socket_addr.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }
}

/// Forward lookup of a server's host. `None` means the host could not be
/// resolved; implementations never fail harder than that.
pub trait AddressResolver: Send + Sync {
    fn resolve(&self, address: &ServerAddress) -> Option<Address>;
}

/// Blocking lookup through the platform resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAddressResolver;

impl AddressResolver for SystemAddressResolver {
    fn resolve(&self, address: &ServerAddress) -> Option<Address> {
        let host = address.ascii_host();
        if host.is_empty() {
            debug!("Couldn't resolve server {} address: host is not a valid domain", address);
            return None;
        }

        match (host, address.port()).to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(socket_addr) => Some(Address::new(host, socket_addr)),
                None => {
                    debug!("Couldn't resolve server {} address: no records", address);
                    None
                }
            },
            Err(e) => {
                debug!("Couldn't resolve server {} address: {}", address, e);
                None
            }
        }
    }
}
