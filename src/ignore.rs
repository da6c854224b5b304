//! The channel subsystem ignore list (`cio_ignore`). Devices on that list
//! are invisible to Linux until they are removed from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::constants::cmd;
use crate::errors::{Code, Result, S390Error};
use crate::host::Host;
use crate::task::{self, Reporter};

/// One entry of a removal request: a device id, a range like
/// `0.0.0120 - 0.0.0130`, or a bare device number given as integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IgnoreEntry {
    Text(String),
    Number(i64),
}

impl IgnoreEntry {
    /// Argument for `cio_ignore -r`, `None` when the entry is blank
    fn device(&self) -> Option<String> {
        let device = match self {
            IgnoreEntry::Number(n) => n.to_string(),
            IgnoreEntry::Text(s) if s.contains('-') => s.split_whitespace().collect(),
            IgnoreEntry::Text(s) => s.trim().to_string(),
        };

        (!device.is_empty()).then_some(device)
    }
}

impl std::fmt::Display for IgnoreEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreEntry::Text(s) => f.write_str(s),
            IgnoreEntry::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Devices and ranges listed by `cio_ignore -l`. The first two lines
/// are a title and its underline.
pub fn parse_ignore_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(2)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Executes:
/// ```shell
/// cio_ignore -l
/// ```
pub fn ignore_list(host: &Host) -> Result<Vec<String>> {
    let output = host
        .run(cmd::CIO_IGNORE, &["-l"])?
        .ok_or_fail(Code::IgnoreListFailed)?;

    Ok(parse_ignore_list(&output.stdout))
}

/// Returns `device` if it is listed verbatim
pub fn ignore_lookup(host: &Host, device: &str) -> Result<String> {
    let device = device.trim();

    ignore_list(host)?
        .into_iter()
        .find(|entry| entry.eq_ignore_ascii_case(device))
        .ok_or_else(|| S390Error::not_found(Code::DeviceNotFound, "device", device))
}

/// Short reason from a `cio_ignore` error line, e.g.
/// `cio_ignore: Invalid device ID: xyz` gives `xyz`
fn failure_reason(stderr: &str) -> String {
    stderr
        .trim()
        .rsplit(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Removes every entry from the ignore list, continuing past failures.
/// Returns the removed devices, or a partial failure naming only the
/// devices that could not be removed.
pub fn remove_ignored(host: &Host, entries: &[IgnoreEntry]) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    let mut failed = BTreeMap::new();

    for entry in entries {
        let Some(device) = entry.device() else {
            error!("cannot remove blank entry {entry:?} from ignore list");
            failed.insert(entry.to_string(), "device ID is required".to_string());
            continue;
        };

        info!("removing {device} from ignore list");
        match host.run(cmd::CIO_IGNORE, &["-r", &device]) {
            Ok(output) if output.success() => removed.push(device),
            Ok(output) => {
                error!("failed to remove {device} from ignore list: {}", output.stderr.trim());
                failed.insert(device, failure_reason(&output.stderr));
            }
            Err(err) => {
                error!("failed to remove {device} from ignore list: {err}");
                failed.insert(device, err.to_string());
            }
        }
    }

    if !failed.is_empty() {
        return Err(S390Error::PartialFailure {
            code: Code::IgnoreRemoveFailed,
            failed,
        });
    }

    Ok(removed)
}

/// [`remove_ignored`] as a reported task
pub fn remove_ignored_task(
    host: &Host,
    entries: &[IgnoreEntry],
    reporter: &mut dyn Reporter,
) -> Result<Vec<String>> {
    let done = format!(
        "removed {} from ignore list",
        entries.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
    );

    task::run_task(reporter, &done, || remove_ignored(host, entries))
}
