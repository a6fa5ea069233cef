//! Published endpoints.
//!
//! An endpoint is opaque configuration to this crate: it is compared for
//! equality when matching proxies against published adapters and handed to the
//! [`Transport`](crate::transport::Transport) on the remote path. The textual
//! form is `<transport> -h <host> -p <port>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ParseError;

const SECURE_TRANSPORTS: &[&str] = &["ssl", "wss"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub transport: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(transport: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: transport.into(),
            host: host.into(),
            port,
        }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new("tcp", host, port)
    }

    pub fn ssl(host: impl Into<String>, port: u16) -> Self {
        Self::new("ssl", host, port)
    }

    pub fn is_secure(&self) -> bool {
        SECURE_TRANSPORTS.contains(&self.transport.as_str())
    }

    /// Parses a `:`-separated endpoint list, as found in `<adapter>.Endpoints`.
    pub fn parse_list(s: &str) -> Result<Vec<Endpoint>, ParseError> {
        s.split(':')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -h {} -p {}", self.transport, self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_whitespace();
        let transport = tokens
            .next()
            .ok_or_else(|| ParseError::Endpoint(format!("empty endpoint `{s}`")))?
            .to_ascii_lowercase();

        let mut host = String::from("localhost");
        let mut port = 0u16;
        while let Some(option) = tokens.next() {
            let value = tokens
                .next()
                .ok_or_else(|| ParseError::Endpoint(format!("option `{option}` needs a value in `{s}`")))?;
            match option {
                "-h" => host = value.to_string(),
                "-p" => {
                    port = value
                        .parse()
                        .map_err(|_| ParseError::Endpoint(format!("invalid port `{value}` in `{s}`")))?
                }
                other => return Err(ParseError::Endpoint(format!("unknown option `{other}` in `{s}`"))),
            }
        }

        Ok(Endpoint { transport, host, port })
    }
}
