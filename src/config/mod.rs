// ABOUTME: Configuration for a run: dockproc.yml parsing and discovery.
// ABOUTME: Produces process arguments, falling back to the environment machine.

mod env_value;

pub use env_value::{EnvValue, parse_env_entry, resolve_env_entries};

use crate::container::ExecutionSpec;
use crate::error::{Error, Result};
use crate::mount::Mount;
use crate::process::Args;
use crate::runtime::{EnvMachine, Machine, MachineConfig};
use crate::types::ImageRef;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const CONFIG_FILENAME: &str = "dockproc.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockproc.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".dockproc/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default, deserialize_with = "deserialize_image_ref")]
    pub image: Option<ImageRef>,

    #[serde(default)]
    pub name: Option<String>,

    /// Daemon to run on; the environment machine when absent.
    #[serde(default)]
    pub machine: Option<MachineConfig>,

    #[serde(default)]
    pub env: HashMap<String, EnvValue>,

    #[serde(default)]
    pub mounts: Vec<Mount>,

    #[serde(default)]
    pub retry: u32,

    #[serde(default = "default_remove")]
    pub remove: bool,

    /// Command for `dockproc exec` when none is given on the command line.
    #[serde(default)]
    pub exec: Option<ExecutionSpec>,
}

fn default_remove() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            image: None,
            name: None,
            machine: None,
            env: HashMap::new(),
            mounts: Vec::new(),
            retry: 0,
            remove: default_remove(),
            exec: None,
        }
    }
}

impl RunConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Like [`RunConfig::discover`], but an absent file yields the defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// The configured machine, or one read from the environment.
    pub fn machine(&self) -> Arc<dyn Machine> {
        match &self.machine {
            Some(machine) => Arc::new(machine.clone()),
            None => Arc::new(EnvMachine::new()),
        }
    }

    /// Process arguments with environment values resolved.
    pub fn process_args(&self) -> Result<Args> {
        Ok(Args {
            machine: Some(self.machine()),
            env: resolve_env_entries(&self.env)?,
            mounts: self.mounts.clone(),
            name: self.name.clone().unwrap_or_default(),
            retry: self.retry,
        })
    }
}

fn deserialize_image_ref<'de, D>(deserializer: D) -> std::result::Result<Option<ImageRef>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ImageRef::parse(&s)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
