// ABOUTME: Mount descriptions for process containers.
// ABOUTME: Built from helpers or "source:target[:ro|rw]" strings, converted to the daemon's form.

use crate::error::{Error, Result};
use bollard::models::{Mount as ApiMount, MountTypeEnum};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// A host path.
    Bind,
    /// A named volume, or the volumes of another container.
    Volume,
}

/// A filesystem mount for a container.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Mount {
    kind: MountKind,
    source: String,
    /// Empty for `volumes_from`, where the daemon picks the targets.
    target: String,
    read_only: bool,
}

impl Mount {
    /// Bind-mount a host path.
    pub fn bind(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Bind,
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Mount a named volume.
    pub fn volume_by_name(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Volume,
            source: name.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// Mount the volumes of another container.
    pub fn volumes_from(container: impl Into<String>) -> Self {
        Self {
            kind: MountKind::Volume,
            source: container.into(),
            target: String::new(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Parse `source:target[:ro|rw]`.
    ///
    /// Sources starting with `/`, `.` or `~` are host paths; anything else is
    /// a volume name.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || Error::InvalidConfig(format!("invalid mount {spec:?}"));

        let parts: Vec<&str> = spec.split(':').collect();
        let (source, target, read_only) = match parts.as_slice() {
            [source, target] => (*source, *target, false),
            [source, target, "ro"] => (*source, *target, true),
            [source, target, "rw"] => (*source, *target, false),
            _ => return Err(invalid()),
        };
        if source.is_empty() || !target.starts_with('/') {
            return Err(invalid());
        }

        let mount = if source.starts_with(['/', '.', '~']) {
            Mount::bind(source, target)
        } else {
            Mount::volume_by_name(source, target)
        };

        Ok(if read_only { mount.read_only() } else { mount })
    }

    pub fn kind(&self) -> MountKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The daemon's representation of this mount.
    pub fn to_api(&self) -> ApiMount {
        let typ = match self.kind {
            MountKind::Bind => MountTypeEnum::BIND,
            MountKind::Volume => MountTypeEnum::VOLUME,
        };

        ApiMount {
            typ: Some(typ),
            source: Some(self.source.clone()),
            target: (!self.target.is_empty()).then(|| self.target.clone()),
            read_only: Some(self.read_only),
            ..Default::default()
        }
    }
}

impl FromStr for Mount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Mount::parse(s)
    }
}

impl TryFrom<String> for Mount {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Mount::parse(&s)
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.target)?;
        if self.read_only {
            f.write_str(":ro")?;
        }
        Ok(())
    }
}
