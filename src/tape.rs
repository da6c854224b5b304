use std::fs;

use tracing::{debug, info};

use crate::constants::{cmd, paths};
use crate::entity::TapeDevice;
use crate::errors::{Code, Result};
use crate::host::Host;

/// Parses `lstape` output. Column names come from the header line and
/// each row is zipped against them, so short rows lose their trailing
/// columns. `resolve` maps a device name to its by-id name.
pub fn parse_tape_list<F>(output: &str, resolve: F) -> Vec<TapeDevice>
where
    F: Fn(&str) -> Option<String>,
{
    let mut lines = output.lines();
    let Some(header) = lines.next() else {
        return Vec::new();
    };

    let keys: Vec<&str> = header.split_whitespace().collect();

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let mut tape = TapeDevice::default();

            for (key, value) in keys.iter().zip(&tokens) {
                if *key == "Device" {
                    tape.uuid = tokens.get(1).and_then(|name| resolve(*name));
                }

                tape.columns.insert(key.to_string(), value.to_string());
            }

            tape
        })
        .collect()
}

/// Name of the `/dev/tape/by-id` link pointing at `device`
pub fn tape_uuid(host: &Host, device: &str) -> Option<String> {
    let dir = host.path(paths::TAPE_BY_ID);

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("no tape ids for {device}: {}: {err}", dir.display());
            return None;
        }
    };

    entries.filter_map(|entry| entry.ok()).find_map(|entry| {
        let target = fs::read_link(entry.path()).ok()?;
        let name = target.file_name()?.to_string_lossy().to_string();

        (name == device).then(|| entry.file_name().to_string_lossy().to_string())
    })
}

/// Executes:
/// ```shell
/// lstape --scsi-only
/// ```
pub fn list_tapes(host: &Host) -> Result<Vec<TapeDevice>> {
    info!("listing tape devices");

    let output = host
        .run(cmd::LSTAPE, &["--scsi-only"])?
        .ok_or_fail(Code::TapeListFailed)?;

    Ok(parse_tape_list(&output.stdout, |device| tape_uuid(host, device)))
}
