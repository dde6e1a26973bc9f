use thiserror::Error;
use tracing::{debug, error};
use trust_dns_resolver::Resolver;
use trust_dns_resolver::config::ResolverOpts;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

use super::{ServerAddress, port_or_default};

const SRV_SERVICE: &str = "_minecraft._tcp";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RedirectError {
    #[error("no SRV record")]
    NotFound,
    #[error("SRV query timed out")]
    Timeout,
    #[error("malformed SRV record: {0:?}")]
    Malformed(String),
    #[error("SRV query failed: {0}")]
    Query(String),
}

/// Finds the server an address is redirected to, if any.
pub trait RedirectResolver: Send + Sync {
    fn lookup_redirect(&self, address: &ServerAddress) -> Option<ServerAddress>;
}

/// Resolver used when no DNS client could be set up. Never redirects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRedirect;

impl RedirectResolver for NoRedirect {
    fn lookup_redirect(&self, _address: &ServerAddress) -> Option<ServerAddress> {
        None
    }
}

/// Raw SRV query. Answers are rendered as `priority weight port target`.
pub trait SrvQuery: Send + Sync {
    fn query_srv(&self, name: &str) -> Result<Vec<String>, RedirectError>;
}

/// SRV queries through a blocking trust-dns client.
pub struct DnsSrvQuery {
    resolver: Resolver,
}

impl DnsSrvQuery {
    /// Reads the system DNS configuration with the options from `srv_opts`.
    pub fn from_system_conf() -> anyhow::Result<Self> {
        let (config, opts) = trust_dns_resolver::system_conf::read_system_conf()?;
        let resolver = Resolver::new(config, srv_opts(opts))?;
        Ok(Self { resolver })
    }
}

/// A single attempt per query so a missing SRV setup fails fast, and no
/// answer cache so every lookup goes to the network.
fn srv_opts(mut opts: ResolverOpts) -> ResolverOpts {
    opts.attempts = 1;
    opts.cache_size = 0;
    opts
}

impl SrvQuery for DnsSrvQuery {
    fn query_srv(&self, name: &str) -> Result<Vec<String>, RedirectError> {
        let lookup = self.resolver.srv_lookup(name).map_err(classify)?;
        Ok(lookup.iter().map(|srv| srv.to_string()).collect())
    }
}

fn classify(err: ResolveError) -> RedirectError {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => RedirectError::NotFound,
        ResolveErrorKind::Timeout => RedirectError::Timeout,
        _ => RedirectError::Query(err.to_string()),
    }
}

/// Follows `_minecraft._tcp` SRV records for addresses on the default port.
pub struct SrvRedirectResolver<Q> {
    query: Q,
}

impl<Q: SrvQuery> SrvRedirectResolver<Q> {
    pub fn new(query: Q) -> Self {
        Self { query }
    }

    /// `Ok(None)` when the address is not eligible for redirection.
    pub fn find_redirect(&self, address: &ServerAddress) -> Result<Option<ServerAddress>, RedirectError> {
        if !address.is_default_port() {
            return Ok(None);
        }

        let name = format!("{}.{}", SRV_SERVICE, address.ascii_host());
        let records = self.query.query_srv(&name)?;
        let first = records.first().ok_or(RedirectError::NotFound)?;
        parse_srv_record(first).map(Some)
    }
}

impl<Q: SrvQuery> RedirectResolver for SrvRedirectResolver<Q> {
    fn lookup_redirect(&self, address: &ServerAddress) -> Option<ServerAddress> {
        match self.find_redirect(address) {
            Ok(redirect) => redirect,
            Err(e) => {
                debug!("No redirect for {}: {}", address, e);
                None
            }
        }
    }
}

/// Parses `priority weight port target`. Priority and weight are ignored.
pub fn parse_srv_record(record: &str) -> Result<ServerAddress, RedirectError> {
    let fields: Vec<&str> = record.split_whitespace().collect();
    match fields.as_slice() {
        [_priority, _weight, port, target, ..] => Ok(ServerAddress::new(*target, port_or_default(port))),
        _ => Err(RedirectError::Malformed(record.to_string())),
    }
}

/// Builds the SRV-backed resolver, degrading to [`NoRedirect`] when the
/// system DNS client is unavailable.
pub fn create_srv() -> Box<dyn RedirectResolver> {
    create_srv_with(DnsSrvQuery::from_system_conf)
}

/// [`create_srv`] over any SRV client.
pub fn create_srv_with<Q, F>(init: F) -> Box<dyn RedirectResolver>
where
    Q: SrvQuery + 'static,
    F: FnOnce() -> anyhow::Result<Q>,
{
    match init() {
        Ok(query) => Box::new(SrvRedirectResolver::new(query)),
        Err(e) => {
            error!("Failed to initialize SRV redirect resolver, some servers might not work: {:?}", e);
            Box::new(NoRedirect)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubQuery {
        answer: Result<Vec<String>, RedirectError>,
        queried: Mutex<Vec<String>>,
    }

    impl StubQuery {
        fn answering(answer: Result<Vec<String>, RedirectError>) -> Self {
            Self {
                answer,
                queried: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    impl SrvQuery for StubQuery {
        fn query_srv(&self, name: &str) -> Result<Vec<String>, RedirectError> {
            self.queried.lock().unwrap().push(name.to_string());
            self.answer.clone()
        }
    }

    #[test]
    fn non_default_port_skips_query() {
        let resolver = SrvRedirectResolver::new(StubQuery::answering(Ok(vec![
            "0 5 25566 mc.example.net.".to_string(),
        ])));
        let address = ServerAddress::new("example.com", 25000);

        assert_eq!(resolver.lookup_redirect(&address), None);
        assert!(resolver.query.calls().is_empty());
    }

    #[test]
    fn default_port_queries_minecraft_service() {
        let resolver = SrvRedirectResolver::new(StubQuery::answering(Ok(vec![
            "0 5 25566 mc.example.net.".to_string(),
            "10 5 25567 backup.example.net.".to_string(),
        ])));
        let address = ServerAddress::new("müller.de", 25565);

        let redirect = resolver.lookup_redirect(&address).unwrap();
        assert_eq!(redirect.host(), "mc.example.net.");
        assert_eq!(redirect.port(), 25566);
        assert_eq!(resolver.query.calls(), vec!["_minecraft._tcp.xn--mller-kva.de"]);
    }

    #[test]
    fn query_failures_mean_no_redirect() {
        for err in [
            RedirectError::NotFound,
            RedirectError::Timeout,
            RedirectError::Query("SERVFAIL".to_string()),
        ] {
            let resolver = SrvRedirectResolver::new(StubQuery::answering(Err(err)));
            let address = ServerAddress::new("example.com", 25565);
            assert_eq!(resolver.lookup_redirect(&address), None);
        }
    }

    #[test]
    fn empty_answer_is_not_found() {
        let resolver = SrvRedirectResolver::new(StubQuery::answering(Ok(Vec::new())));
        let address = ServerAddress::new("example.com", 25565);
        assert_eq!(resolver.find_redirect(&address), Err(RedirectError::NotFound));
    }

    #[test]
    fn malformed_record_means_no_redirect() {
        let resolver = SrvRedirectResolver::new(StubQuery::answering(Ok(vec!["0 5 25566".to_string()])));
        let address = ServerAddress::new("example.com", 25565);

        assert_eq!(
            resolver.find_redirect(&address),
            Err(RedirectError::Malformed("0 5 25566".to_string()))
        );
        assert_eq!(resolver.lookup_redirect(&address), None);
    }

    #[test]
    fn parses_srv_text() {
        let target = parse_srv_record("0 5 25566 mc.example.net.").unwrap();
        assert_eq!(target.host(), "mc.example.net.");
        assert_eq!(target.port(), 25566);
    }

    #[test]
    fn bad_srv_port_defaults() {
        let target = parse_srv_record("0 5 port mc.example.net.").unwrap();
        assert_eq!(target.port(), 25565);
    }

    #[test]
    fn short_srv_text_is_malformed() {
        assert!(parse_srv_record("").is_err());
        assert!(parse_srv_record("0 5 25566").is_err());
    }

    #[test]
    fn srv_opts_disable_cache_and_retries() {
        let opts = srv_opts(ResolverOpts::default());
        assert_eq!(opts.attempts, 1);
        assert_eq!(opts.cache_size, 0);
    }

    #[test]
    fn failed_init_degrades_to_no_redirect() {
        let resolver = create_srv_with(|| -> anyhow::Result<StubQuery> { Err(anyhow::anyhow!("no resolv.conf")) });
        assert_eq!(resolver.lookup_redirect(&ServerAddress::new("example.com", 25565)), None);
    }

    #[test]
    fn successful_init_follows_redirects() {
        let resolver = create_srv_with(|| Ok(StubQuery::answering(Ok(vec!["0 5 25566 mc.example.net.".to_string()]))));
        let redirect = resolver
            .lookup_redirect(&ServerAddress::new("example.com", 25565))
            .unwrap();
        assert_eq!(redirect.port(), 25566);
    }

    #[test]
    fn no_redirect_never_redirects() {
        assert_eq!(NoRedirect.lookup_redirect(&ServerAddress::new("example.com", 25565)), None);
    }
}
