//! Connection strings and the protocols they select.
//!
//! Every connection string has the form `<protocol>://<backend-specific-body>`. The protocol picks the backend
//! family; the body is interpreted by that family. Server backends (`mongo`, `postgresql`) use a regular URL
//! authority (`user:password@host:port/database`), while embedded backends (`nedb`, `sqlite`) treat the body as a
//! file system location.
use std::{fmt::Display, str::FromStr};

use log::*;
use pcs_common::Secret;
use url::Url;

use crate::StorageError;

/// The fixed set of storage protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// Embedded document store
    Nedb,
    /// Client-server document store
    Mongo,
    /// Embedded relational store
    Sqlite,
    /// Client-server relational store
    Postgresql,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Protocol::Nedb, Protocol::Mongo, Protocol::Sqlite, Protocol::Postgresql];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Nedb => "nedb",
            Protocol::Mongo => "mongo",
            Protocol::Sqlite => "sqlite",
            Protocol::Postgresql => "postgresql",
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, Protocol::Sqlite | Protocol::Postgresql)
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, Protocol::Nedb | Protocol::Sqlite)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| StorageError::UnsupportedProtocol(s.to_string()))
    }
}

/// A parsed connection string.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    url: String,
    protocol: Protocol,
    body: String,
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<Secret<String>>,
    segments: Vec<String>,
    params: Vec<(String, String)>,
}

impl ConnectionDescriptor {
    /// Parses a connection string. An unrecognised protocol yields [`StorageError::UnsupportedProtocol`]; a known
    /// protocol with a malformed body yields [`StorageError::InvalidConnectionUrl`].
    pub fn parse(url: &str) -> Result<Self, StorageError> {
        let (scheme, rest) = match url.split_once("://") {
            Some((scheme, rest)) => (scheme, Some(rest)),
            None => (url.split_once(':').map_or(url, |(scheme, _)| scheme), None),
        };
        let protocol = scheme.parse::<Protocol>()?;
        let rest = rest.ok_or_else(|| StorageError::InvalidConnectionUrl(format!("'{url}' is missing '://'")))?;
        let (body, query) = match rest.split_once('?') {
            Some((body, query)) => (body, Some(query)),
            None => (rest, None),
        };
        let params = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())).collect())
            .unwrap_or_default();
        let mut descriptor = Self {
            url: url.to_string(),
            protocol,
            body: body.to_string(),
            host: None,
            port: None,
            user: None,
            password: None,
            segments: Vec::new(),
            params,
        };
        if protocol.is_embedded() {
            descriptor.segments = body.split('/').filter(|s| !s.is_empty()).map(String::from).collect();
        } else {
            descriptor.parse_authority()?;
        }
        trace!("🗃️ Parsed {protocol} connection descriptor. host: {:?}, db: {:?}", descriptor.host, descriptor.database());
        Ok(descriptor)
    }

    fn parse_authority(&mut self) -> Result<(), StorageError> {
        let parsed = Url::parse(&self.url).map_err(|e| StorageError::InvalidConnectionUrl(format!("{}: {e}", self.protocol)))?;
        let decode = |s: &str| {
            urlencoding::decode(s)
                .map(|v| v.into_owned())
                .map_err(|e| StorageError::InvalidConnectionUrl(format!("Bad percent-encoding in credentials: {e}")))
        };
        self.host = parsed.host_str().filter(|h| !h.is_empty()).map(String::from);
        self.port = parsed.port();
        if !parsed.username().is_empty() {
            self.user = Some(decode(parsed.username())?);
        }
        if let Some(password) = parsed.password() {
            self.password = Some(Secret::new(decode(password)?));
        }
        self.segments = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).map(String::from).collect())
            .unwrap_or_default();
        Ok(())
    }

    /// The connection string as it was given
    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Everything between `://` and the query string.
    pub fn body(&self) -> &str {
        self.body.as_str()
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&Secret<String>> {
        self.password.as_ref()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The database name, i.e. the first path segment.
    pub fn database(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}
