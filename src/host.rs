use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::config::Config;
use crate::errors::Result;
use crate::utils::shell::{CmdOutput, Runner, SystemRunner};

/// Everything an operation needs to touch the OS: where the filesystem
/// root is, and how commands are executed.
pub struct Host {
    root: PathBuf,
    runner: Box<dyn Runner>,
    settle_retries: usize,
    lock_wait: Duration,
    sg_luns_max_len: u32,
}

impl Host {
    pub fn new(config: &Config, runner: Box<dyn Runner>) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            runner,
            settle_retries: config.settle_retries,
            lock_wait: config.lock_wait(),
            sg_luns_max_len: config.sg_luns_max_len,
        }
    }

    pub fn system(config: &Config) -> Self {
        Self::new(config, Box::new(SystemRunner))
    }

    /// Maps an absolute OS path into this host's root
    pub fn path(&self, abs: &str) -> PathBuf {
        self.root.join(abs.trim_start_matches('/'))
    }

    pub fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        debug!(cmd, ?args, "running command");
        self.runner.run(cmd, args)
    }

    pub fn settle_retries(&self) -> usize {
        self.settle_retries
    }

    pub fn lock_wait(&self) -> Duration {
        self.lock_wait
    }

    pub fn sg_luns_max_len(&self) -> u32 {
        self.sg_luns_max_len
    }
}
