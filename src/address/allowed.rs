use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

use super::{Address, AddressResolver, RedirectResolver, ServerAddress, SystemAddressResolver, create_srv};

/// Resolution policy used by the pinger: an SRV redirect, once found, wins
/// over the address that was asked for.
pub struct AllowedAddressResolver {
    address_resolver: Box<dyn AddressResolver>,
    redirect_resolver: Box<dyn RedirectResolver>,
}

/// Process-wide resolver backed by the system resolver and SRV lookups.
/// Statics are never dropped, so the blocking DNS client inside outlives
/// any async runtime.
pub static DEFAULT: Lazy<Arc<AllowedAddressResolver>> = Lazy::new(|| {
    Arc::new(AllowedAddressResolver::new(
        Box::new(SystemAddressResolver),
        create_srv(),
    ))
});

impl AllowedAddressResolver {
    pub fn new(address_resolver: Box<dyn AddressResolver>, redirect_resolver: Box<dyn RedirectResolver>) -> Self {
        Self {
            address_resolver,
            redirect_resolver,
        }
    }

    /// Blocking. Async callers should run this on a blocking worker.
    pub fn resolve(&self, address: &ServerAddress) -> Option<Address> {
        let direct = self.address_resolver.resolve(address);
        let redirect = self.redirect_resolver.lookup_redirect(address);
        let redirected = redirect.map(|target| {
            debug!("{} redirects to {}", address, target);
            self.address_resolver.resolve(&target)
        });
        select(direct, redirected)
    }
}

/// A redirect's outcome replaces the direct one, even when the redirect
/// target did not resolve.
// TODO: decide whether a failed redirect should fall back to the direct result
fn select(direct: Option<Address>, redirected: Option<Option<Address>>) -> Option<Address> {
    match redirected {
        Some(result) => result,
        None => direct,
    }
}
