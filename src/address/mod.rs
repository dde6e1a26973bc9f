//! Turning a typed server address into something we can connect to.
//!
//! Parsing normalizes the host and fills in the default port, an SRV record
//! on `_minecraft._tcp.<host>` may redirect the address, and the effective
//! host is resolved through the platform resolver. Everything here blocks.

mod allowed;
mod redirect;
mod resolver;
mod server_address;

pub use allowed::{AllowedAddressResolver, DEFAULT};
pub use redirect::{
    DnsSrvQuery, NoRedirect, RedirectError, RedirectResolver, SrvQuery, SrvRedirectResolver, create_srv,
    create_srv_with, parse_srv_record,
};
pub use resolver::{Address, AddressResolver, SystemAddressResolver};
pub use server_address::{DEFAULT_PORT, ParseError, ServerAddress, port_or_default};
