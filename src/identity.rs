//! Object identities.
//!
//! An [`Identity`] names one object within the adapters of a process. It is the
//! key of every [`ServantRegistry`](crate::servant::ServantRegistry) and the
//! first half of every [`Proxy`](crate::proxy::Proxy).
//!
//! The stringified form is `category/name`, or just `name` when the category is
//! empty. A literal `/` or `\` inside either part is escaped with a backslash,
//! and so are whitespace, `:` and `@`, which separate an identity from the
//! rest of a stringified proxy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::proxy::ParseError;

/// Immutable `{name, category}` pair. Equality is exact, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub category: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Identity with an empty category.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    /// Identities with an empty name cannot be registered with an adapter.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

fn escape(part: &str, out: &mut String) {
    for c in part.chars() {
        if matches!(c, '/' | '\\' | ':' | '@') || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(self.name.len() + self.category.len() + 1);
        if !self.category.is_empty() {
            escape(&self.category, &mut out);
            out.push('/');
        }
        escape(&self.name, &mut out);
        f.write_str(&out)
    }
}

impl FromStr for Identity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut category: Option<String> = None;
        let mut current = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(ParseError::Identity(format!("trailing escape in `{s}`"))),
                },
                '/' if category.is_none() => category = Some(std::mem::take(&mut current)),
                '/' => return Err(ParseError::Identity(format!("unescaped `/` in `{s}`"))),
                other => current.push(other),
            }
        }

        let identity = Identity::new(current, category.unwrap_or_default());

        if identity.name.is_empty() {
            return Err(ParseError::Identity(format!("empty name in `{s}`")));
        }
        Ok(identity)
    }
}
