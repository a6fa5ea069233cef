//! Client-held object references.
//!
//! A [`Proxy`] is a location-independent capability to invoke an object: an
//! [`Identity`], a [`Target`] saying where the object is published, and the
//! [`InvocationConfig`] for calls made through it. A proxy never owns a servant.
//!
//! # Stringified proxies
//!
//! ```text
//! test:tcp -h localhost -p 10000:ssl -h localhost -p 10001   direct, by endpoints
//! test @ TestAdapter                                           indirect, by adapter id
//! test -o:tcp -p 10000                                         oneway
//! accounts/alice -s @ Bank                                     secure only
//! ```

pub mod config;
pub mod endpoint;

pub use config::*;
pub use endpoint::*;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::identity::Identity;

/// Malformed identity, endpoint, or proxy string.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("invalid identity: {0}")]
    Identity(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("invalid proxy: {0}")]
    Proxy(String),
}

/// Where the target object is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Indirect reference, located by adapter id.
    AdapterId(String),
    /// Direct reference. An empty list is a well-known proxy with no location,
    /// which never matches a collocated adapter.
    Endpoints(Vec<Endpoint>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    identity: Identity,
    target: Target,
    config: InvocationConfig,
}

impl Proxy {
    pub fn new(identity: Identity, target: Target, config: InvocationConfig) -> Self {
        Self { identity, target, config }
    }

    pub fn direct(identity: Identity, endpoints: Vec<Endpoint>) -> Self {
        Self::new(identity, Target::Endpoints(endpoints), InvocationConfig::default())
    }

    pub fn indirect(identity: Identity, adapter_id: impl Into<String>) -> Self {
        Self::new(identity, Target::AdapterId(adapter_id.into()), InvocationConfig::default())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &InvocationConfig {
        &self.config
    }

    pub fn adapter_id(&self) -> Option<&str> {
        match &self.target {
            Target::AdapterId(id) => Some(id),
            Target::Endpoints(_) => None,
        }
    }

    /// Endpoints usable under this proxy's configuration (secure-only when
    /// `secure` is set). Empty for indirect proxies.
    pub fn usable_endpoints(&self) -> Vec<Endpoint> {
        match &self.target {
            Target::AdapterId(_) => Vec::new(),
            Target::Endpoints(endpoints) => self.filter_endpoints(endpoints),
        }
    }

    pub(crate) fn filter_endpoints(&self, endpoints: &[Endpoint]) -> Vec<Endpoint> {
        endpoints
            .iter()
            .filter(|e| !self.config.secure || e.is_secure())
            .cloned()
            .collect()
    }

    // --- Builders returning modified copies ---

    pub fn with_identity(&self, identity: Identity) -> Self {
        Self { identity, ..self.clone() }
    }

    pub fn with_config(&self, config: InvocationConfig) -> Self {
        Self { config, ..self.clone() }
    }

    pub fn with_timeout(&self, timeout: Option<Duration>) -> Self {
        self.with_config(InvocationConfig { timeout, ..self.config.clone() })
    }

    pub fn with_mode(&self, mode: Mode) -> Self {
        self.with_config(InvocationConfig { mode, ..self.config.clone() })
    }

    pub fn oneway(&self) -> Self {
        self.with_mode(Mode::Oneway)
    }

    pub fn twoway(&self) -> Self {
        self.with_mode(Mode::Twoway)
    }

    pub fn with_secure(&self, secure: bool) -> Self {
        self.with_config(InvocationConfig { secure, ..self.config.clone() })
    }

    pub fn with_collocation_optimized(&self, collocation_optimized: bool) -> Self {
        self.with_config(InvocationConfig {
            collocation_optimized,
            ..self.config.clone()
        })
    }

    pub fn with_adapter_id(&self, adapter_id: impl Into<String>) -> Self {
        Self {
            target: Target::AdapterId(adapter_id.into()),
            ..self.clone()
        }
    }

    pub fn with_endpoints(&self, endpoints: Vec<Endpoint>) -> Self {
        Self {
            target: Target::Endpoints(endpoints),
            ..self.clone()
        }
    }

    /// Parses a stringified proxy, starting from `defaults` for any option the
    /// string does not set.
    pub fn parse_with(s: &str, defaults: InvocationConfig) -> Result<Self, ParseError> {
        let split = find_unescaped(s, |c| c == ':' || c == '@');
        let (head, tail) = match split {
            Some(pos) => (&s[..pos], Some((&s[pos..pos + 1], &s[pos + 1..]))),
            None => (s, None),
        };

        let head = head.trim_start();
        let identity_end = find_unescaped(head, char::is_whitespace).unwrap_or(head.len());
        if identity_end == 0 {
            return Err(ParseError::Proxy(format!("missing identity in `{s}`")));
        }
        let identity: Identity = head[..identity_end].parse()?;
        let tokens = head[identity_end..].split_whitespace();

        let mut config = defaults;
        for option in tokens {
            match option {
                "-t" => config.mode = Mode::Twoway,
                "-o" => config.mode = Mode::Oneway,
                "-s" => config.secure = true,
                other => return Err(ParseError::Proxy(format!("unknown option `{other}` in `{s}`"))),
            }
        }

        let target = match tail {
            None => Target::Endpoints(Vec::new()),
            Some((":", rest)) => Target::Endpoints(Endpoint::parse_list(rest)?),
            Some((_, rest)) => {
                let adapter_id = rest.trim();
                if adapter_id.is_empty() {
                    return Err(ParseError::Proxy(format!("empty adapter id in `{s}`")));
                }
                Target::AdapterId(adapter_id.to_string())
            }
        };

        Ok(Self { identity, target, config })
    }
}

/// Byte offset of the first character matching `pred` that is not preceded
/// by a `\` escape.
fn find_unescaped(s: &str, pred: impl Fn(char) -> bool) -> Option<usize> {
    let mut escaped = false;
    for (pos, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if pred(c) {
            return Some(pos);
        }
    }
    None
}

impl FromStr for Proxy {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, InvocationConfig::default())
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity)?;
        match self.config.mode {
            Mode::Twoway => write!(f, " -t")?,
            Mode::Oneway => write!(f, " -o")?,
        }
        if self.config.secure {
            write!(f, " -s")?;
        }
        match &self.target {
            Target::AdapterId(id) => write!(f, " @ {id}"),
            Target::Endpoints(endpoints) => {
                for endpoint in endpoints {
                    write!(f, ":{endpoint}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_with_separators_survive_round_trip() {
        for identity in [
            Identity::named("a:b"),
            Identity::named("a b"),
            Identity::new("x@y", "cat egory"),
            Identity::named(r"back\slash/and:more"),
        ] {
            let direct = Proxy::direct(identity.clone(), vec![Endpoint::tcp("localhost", 10000)]);
            let parsed: Proxy = direct.to_string().parse().unwrap();
            assert_eq!(parsed, direct);

            let indirect = Proxy::indirect(identity, "TestAdapter").oneway();
            let parsed: Proxy = indirect.to_string().parse().unwrap();
            assert_eq!(parsed, indirect);
        }
    }

    #[test]
    fn parses_direct_proxy() {
        let proxy: Proxy = "test:tcp -h localhost -p 10000:ssl -p 10001".parse().unwrap();
        assert_eq!(proxy.identity(), &Identity::named("test"));
        assert_eq!(
            proxy.target(),
            &Target::Endpoints(vec![Endpoint::tcp("localhost", 10000), Endpoint::ssl("localhost", 10001)])
        );
        assert_eq!(proxy.config(), &InvocationConfig::default());
    }

    #[test]
    fn parses_indirect_proxy_with_options() {
        let proxy: Proxy = "accounts/alice -o -s @ Bank".parse().unwrap();
        assert_eq!(proxy.identity(), &Identity::new("alice", "accounts"));
        assert_eq!(proxy.adapter_id(), Some("Bank"));
        assert!(proxy.config().is_oneway());
        assert!(proxy.config().secure);
    }

    #[test]
    fn well_known_proxy_has_no_endpoints() {
        let proxy: Proxy = "test".parse().unwrap();
        assert_eq!(proxy.target(), &Target::Endpoints(Vec::new()));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let proxy: Proxy = "cat/obj -o:tcp -h h -p 1".parse().unwrap();
        let reparsed: Proxy = proxy.to_string().parse().unwrap();
        assert_eq!(proxy, reparsed);
    }

    #[test]
    fn secure_filter_drops_plain_endpoints() {
        let proxy: Proxy = "test:tcp -p 1:ssl -p 2".parse().unwrap();
        assert_eq!(proxy.usable_endpoints().len(), 2);
        assert_eq!(proxy.with_secure(true).usable_endpoints(), vec![Endpoint::ssl("localhost", 2)]);
    }

    #[test]
    fn builders_leave_original_untouched() {
        let proxy = Proxy::indirect(Identity::named("test"), "A");
        let forced = proxy.with_collocation_optimized(false).with_timeout(Some(Duration::from_millis(5)));
        assert!(proxy.config().collocation_optimized);
        assert!(!forced.config().collocation_optimized);
        assert_eq!(forced.config().timeout, Some(Duration::from_millis(5)));
    }

    #[test]
    fn rejects_bad_proxies() {
        assert!("".parse::<Proxy>().is_err());
        assert!("test @ ".parse::<Proxy>().is_err());
        assert!("test -x".parse::<Proxy>().is_err());
        assert!("test:tcp -p nope".parse::<Proxy>().is_err());
    }
}
