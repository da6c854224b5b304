use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{self, defaults};
use crate::errors::{Code, Result, S390Error};

/// Tunables for a run. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Prefix prepended to every OS path (sysfs, /etc, /dev)
    #[serde(default = "default_root")]
    pub root: String,

    /// Number of `udevadm settle` rounds to wait for a new sysfs entry
    #[serde(alias = "settle-retries", default = "default_settle_retries")]
    pub settle_retries: usize,

    /// Bounded wait for config file locks
    #[serde(alias = "lock-wait-ms", default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    #[serde(alias = "sg-luns-max-len", default = "default_sg_luns_max_len")]
    pub sg_luns_max_len: u32,
}

fn default_root() -> String {
    defaults::ROOT.to_string()
}

fn default_settle_retries() -> usize {
    defaults::SETTLE_RETRIES
}

fn default_lock_wait_ms() -> u64 {
    defaults::LOCK_WAIT_MS
}

fn default_sg_luns_max_len() -> u32 {
    defaults::SG_LUNS_MAX_LEN
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: default_root(),
            settle_retries: default_settle_retries(),
            lock_wait_ms: default_lock_wait_ms(),
            sg_luns_max_len: default_sg_luns_max_len(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|err| {
            S390Error::invalid_input(Code::BadConfig, "err", &err.to_string())
        })
    }

    /// Loads the config file if given, then applies `S390DEV_ROOT`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            None => Config::default(),
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|err| {
                    S390Error::InvalidInput {
                        code: Code::BadConfig,
                        params: [("path", path.to_string()), ("err", err.to_string())]
                            .into(),
                    }
                })?;

                Config::from_yaml(&yaml)?
            }
        };

        if let Ok(root) = env::var(constants::ENV_S390DEV_ROOT) {
            config.root = root;
        }

        Ok(config)
    }

    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}
