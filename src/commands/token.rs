//! Component identifiers of the form `<user id>:<command>:<action>[:extra...]`.
//!
//! The token travels through the client and comes back verbatim, so anyone
//! can forge one. The embedded user id only keeps honest users from clicking
//! someone else's buttons; it is not an authorization check.
// TODO: sign tokens with a keyed MAC over user, command, action and issue time

use std::fmt;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentToken {
    pub user_id: u64,
    pub command: String,
    pub action: String,
    pub extra: Vec<String>,
}

impl ComponentToken {
    pub fn new(user_id: u64, command: impl Into<String>, action: impl Into<String>) -> Self {
        ComponentToken {
            user_id,
            command: command.into(),
            action: action.into(),
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, value: impl Into<String>) -> Self {
        self.extra.push(value.into());
        self
    }

    /// Parse a component id. `None` when it has fewer than three parts or a non-numeric user.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.split(SEPARATOR);
        let user_id = parts.next()?.parse().ok()?;
        let command = parts.next()?.to_string();
        let action = parts.next()?.to_string();

        Some(ComponentToken {
            user_id,
            command,
            action,
            extra: parts.map(str::to_string).collect(),
        })
    }

    pub fn issued_to(&self, user_id: u64) -> bool {
        self.user_id == user_id
    }
}

impl fmt::Display for ComponentToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}{SEPARATOR}{}", self.user_id, self.command, self.action)?;
        for part in &self.extra {
            write!(f, "{SEPARATOR}{part}")?;
        }
        Ok(())
    }
}
