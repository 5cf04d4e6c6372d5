use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifiers of a remote list, resolved from human-readable names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub site_id: String,
    pub list_id: String,
}

impl ResourceHandle {
    pub fn new(site_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            list_id: list_id.into(),
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site_id, self.list_id)
    }
}

/// Parameters identifying one dataset snapshot: where the list lives and
/// which fields are projected out of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub hostname: String,
    pub site_path: String,
    pub list_name: String,
    /// `None` keeps every field; otherwise records are projected to these keys.
    pub projected_fields: Option<BTreeSet<String>>,
}

impl ResourceKey {
    pub fn new(hostname: impl Into<String>, site_path: impl Into<String>, list_name: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            site_path: site_path.into(),
            list_name: list_name.into(),
            projected_fields: None,
        }
    }

    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projected_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// The (hostname, site path, list name) triple a handle is resolved from.
    pub fn location(&self) -> (&str, &str, &str) {
        (&self.hostname, &self.site_path, &self.list_name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} [{}]", self.hostname, self.site_path, self.list_name)?;
        if let Some(fields) = &self.projected_fields {
            write!(f, " fields={}", fields.len())?;
        }
        Ok(())
    }
}
