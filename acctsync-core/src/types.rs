//! Domain types for account-change synchronisation.
//!
//! Short names and domain identifiers end up as segments of queue file
//! names (`<principal>-<domain>-<operation>-<timestamp>-<seq>`), so both are
//! validated on construction: a principal short name never contains `/`,
//! `\n` or NUL and never starts with `.`, and a domain never contains `-`
//! or collides with an operation word.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// An account identity, parsed from `name[/instance][@REALM]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
    instance: Option<String>,
    realm: Option<String>,
}

impl Principal {
    /// Parse a principal string. Only the short name is validated for use in
    /// file names; instance and realm just have to be non-empty when present.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let invalid = |reason| CoreError::InvalidPrincipal {
            value: value.to_owned(),
            reason,
        };

        let (rest, realm) = match value.rsplit_once('@') {
            Some((_, "")) => return Err(invalid("empty realm")),
            Some((rest, realm)) => (rest, Some(realm.to_owned())),
            None => (value, None),
        };
        let (name, instance) = match rest.split_once('/') {
            Some((_, "")) => return Err(invalid("empty instance")),
            Some((name, instance)) => (name, Some(instance.to_owned())),
            None => (rest, None),
        };
        validate_short_name(name).map_err(invalid)?;

        Ok(Self {
            name: name.to_owned(),
            instance,
            realm,
        })
    }

    /// Short account name, as written into queue entries.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(instance) = &self.instance {
            write!(f, "/{instance}")?;
        }
        if let Some(realm) = &self.realm {
            write!(f, "@{realm}")?;
        }
        Ok(())
    }
}

impl FromStr for Principal {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn validate_short_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    if name.starts_with('.') {
        return Err("name must not start with '.'");
    }
    if name.contains(['\n', '/', '\0', '@']) {
        return Err("name contains a newline, '/', '@' or NUL");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

/// Logical name of a secondary directory service (a configured sync target).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let reason = if value.is_empty() {
            Some("empty domain")
        } else if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            Some("only ASCII letters, digits, '_' and '.' are allowed")
        } else if value.starts_with('.') {
            Some("domain must not start with '.'")
        } else if value.parse::<Operation>().is_ok() {
            Some("operation names are reserved")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(CoreError::InvalidDomain { value, reason }),
            None => Ok(Self(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Domain {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Domain> for String {
    fn from(d: Domain) -> Self {
        d.0
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The kind of account change being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Password,
    Enable,
    Disable,
}

impl Operation {
    pub const ALL: [Operation; 3] = [Operation::Password, Operation::Enable, Operation::Disable];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Password => "password",
            Operation::Enable => "enable",
            Operation::Disable => "disable",
        }
    }

    pub fn class(self) -> OperationClass {
        match self {
            Operation::Password => OperationClass::Password,
            Operation::Enable | Operation::Disable => OperationClass::Status,
        }
    }

    /// Password changes carry the new credential; status changes carry nothing.
    pub fn has_payload(self) -> bool {
        matches!(self, Operation::Password)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(Operation::Password),
            "enable" => Ok(Operation::Enable),
            "disable" => Ok(Operation::Disable),
            other => Err(CoreError::UnknownOperation(other.to_owned())),
        }
    }
}

/// Operations that share ordering and blocking: enable and disable are one
/// class because a later disable must never overtake an earlier enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Password,
    Status,
}

// ---------------------------------------------------------------------------
// Password
// ---------------------------------------------------------------------------

/// A cleartext credential. Redacted in `Debug`, wiped from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Password(String);

impl Password {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// ChangeRecord
// ---------------------------------------------------------------------------

/// The unit of queued work: one account change for one target domain.
///
/// A password record always carries a payload; status records never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    principal: String,
    domain: Domain,
    operation: Operation,
    payload: Option<Password>,
}

impl ChangeRecord {
    pub fn password(principal: &Principal, domain: Domain, password: Password) -> Self {
        Self {
            principal: principal.name().to_owned(),
            domain,
            operation: Operation::Password,
            payload: Some(password),
        }
    }

    pub fn status(principal: &Principal, domain: Domain, enabled: bool) -> Self {
        Self {
            principal: principal.name().to_owned(),
            domain,
            operation: if enabled {
                Operation::Enable
            } else {
                Operation::Disable
            },
            payload: None,
        }
    }

    /// Build a record from already-separated fields, checking that the
    /// payload matches the operation.
    pub fn from_parts(
        principal: &str,
        domain: Domain,
        operation: Operation,
        payload: Option<Password>,
    ) -> Result<Self, CoreError> {
        validate_short_name(principal).map_err(|reason| CoreError::InvalidPrincipal {
            value: principal.to_owned(),
            reason,
        })?;
        if operation.has_payload() != payload.is_some() {
            return Err(CoreError::MalformedRecord(format!(
                "operation {operation} {} a payload",
                if operation.has_payload() {
                    "requires"
                } else {
                    "does not take"
                }
            )));
        }
        Ok(Self {
            principal: principal.to_owned(),
            domain,
            operation,
            payload,
        })
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn payload(&self) -> Option<&Password> {
        self.payload.as_ref()
    }

    /// Serialize as newline-terminated lines: principal, domain, operation,
    /// then the payload for operations that carry one.
    pub fn to_text(&self) -> Zeroizing<String> {
        let mut text = Zeroizing::new(String::new());
        for line in [self.principal.as_str(), self.domain.as_str(), self.operation.as_str()] {
            text.push_str(line);
            text.push('\n');
        }
        if let Some(payload) = &self.payload {
            text.push_str(payload.expose());
            text.push('\n');
        }
        text
    }

    /// Inverse of [`ChangeRecord::to_text`]. The payload is everything after
    /// the operation line minus its single terminating newline.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let malformed = |what: &str| CoreError::MalformedRecord(what.to_owned());

        let mut lines = text.splitn(4, '\n');
        let principal = lines.next().unwrap_or_default();
        let domain = lines.next().ok_or_else(|| malformed("missing domain line"))?;
        let operation = lines
            .next()
            .ok_or_else(|| malformed("missing operation line"))?;
        let rest = lines
            .next()
            .ok_or_else(|| malformed("operation line is not newline-terminated"))?;

        let domain = Domain::new(domain)?;
        let operation: Operation = operation.parse()?;
        let payload = if operation.has_payload() {
            let value = rest
                .strip_suffix('\n')
                .ok_or_else(|| malformed("payload is missing or not newline-terminated"))?;
            Some(Password::new(value))
        } else if rest.is_empty() {
            None
        } else {
            return Err(malformed("unexpected data after operation line"));
        };

        Self::from_parts(principal, domain, operation, payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
