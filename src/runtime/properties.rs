//! String key/value configuration.
//!
//! Properties are set programmatically by the bootstrap code. Recognized keys:
//!
//! | Key                           | Meaning                                         |
//! |-------------------------------|-------------------------------------------------|
//! | `Default.InvocationTimeout`   | remote reply timeout in ms, `-1` for none       |
//! | `Default.CollocationOptimized`| `0` forces every proxy onto the remote path     |
//! | `Default.Secure`              | `1` restricts proxies to secure endpoints       |
//! | `Collocation.Policy`          | `RequireActivation` (default) or `OnCreation`   |
//! | `<adapter>.Endpoints`         | `:`-separated endpoint list                     |
//! | `<adapter>.AdapterId`         | adapter id published by the adapter             |

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use super::RuntimeError;
use crate::adapter::CollocationPolicy;
use crate::proxy::InvocationConfig;

pub const INVOCATION_TIMEOUT: &str = "Default.InvocationTimeout";
pub const COLLOCATION_OPTIMIZED: &str = "Default.CollocationOptimized";
pub const SECURE: &str = "Default.Secure";
pub const COLLOCATION_POLICY: &str = "Collocation.Policy";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`; an empty value removes it.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn get_property(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_property_with_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_property(key).unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, RuntimeError> {
        self.get_property(key)
            .map(|value| {
                value.trim().parse().map_err(|_| RuntimeError::InvalidProperty {
                    key: key.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn get_property_as_int_with_default(&self, key: &str, default: i64) -> Result<i64, RuntimeError> {
        Ok(self.parse::<i64>(key)?.unwrap_or(default))
    }

    /// `0`/`1` flags.
    pub fn get_property_as_bool_with_default(&self, key: &str, default: bool) -> Result<bool, RuntimeError> {
        Ok(self.get_property_as_int_with_default(key, i64::from(default))? != 0)
    }

    /// Keys starting with `prefix`, in sorted order.
    pub fn get_properties_for_prefix(&self, prefix: &str) -> Vec<(&str, &str)> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect()
    }

    /// Proxy defaults derived from the `Default.*` keys.
    pub fn invocation_defaults(&self) -> Result<InvocationConfig, RuntimeError> {
        let timeout_ms = self.get_property_as_int_with_default(INVOCATION_TIMEOUT, -1)?;
        Ok(InvocationConfig {
            timeout: u64::try_from(timeout_ms).ok().map(Duration::from_millis),
            collocation_optimized: self.get_property_as_bool_with_default(COLLOCATION_OPTIMIZED, true)?,
            secure: self.get_property_as_bool_with_default(SECURE, false)?,
            ..InvocationConfig::default()
        })
    }

    pub fn collocation_policy(&self) -> Result<CollocationPolicy, RuntimeError> {
        match self.get_property(COLLOCATION_POLICY) {
            None | Some("RequireActivation") => Ok(CollocationPolicy::RequireActivation),
            Some("OnCreation") => Ok(CollocationPolicy::OnCreation),
            Some(other) => Err(RuntimeError::InvalidProperty {
                key: COLLOCATION_POLICY.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::new();
        for (key, value) in iter {
            properties.set_property(key, value);
        }
        properties
    }
}
