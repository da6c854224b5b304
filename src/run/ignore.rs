use serde_json::{json, Value};

use s390dev::errors::S390Error;
use s390dev::host::Host;
use s390dev::ignore::{self, IgnoreEntry};
use s390dev::task::Progress;

use super::to_json;
use crate::cli::CmdIgnore;

pub(super) fn run(host: &Host, cmd: CmdIgnore) -> Result<Value, S390Error> {
    match cmd {
        CmdIgnore::List => Ok(json!({ "ignored_devices": ignore::ignore_list(host)? })),
        CmdIgnore::Show(args) => to_json(ignore::ignore_lookup(host, &args.device)?),
        CmdIgnore::Remove { devices } => {
            let entries: Vec<IgnoreEntry> = devices.into_iter().map(IgnoreEntry::Text).collect();

            let mut progress = Progress::default();
            let removed = ignore::remove_ignored_task(host, &entries, &mut progress)?;

            Ok(json!({ "removed": removed, "messages": progress.messages }))
        }
    }
}
