use colored::Colorize;
use serde_json::{json, Value};

use s390dev::errors::S390Error;
use s390dev::host::Host;
use s390dev::task::Progress;
use s390dev::{lunscan, zfcp};

use super::to_json;
use crate::cli::{CmdLun, CmdLunScan};

pub(super) fn run(host: &Host, cmd: CmdLun) -> Result<Value, S390Error> {
    match cmd {
        CmdLun::List => {
            let scan = zfcp::get_luns(host)?;
            for failure in &scan.soft_failures {
                eprintln!(
                    "{}",
                    format!("WARN: skipped {}: {}", failure.context, failure.reason).yellow()
                );
            }

            to_json(scan)
        }
        CmdLun::Show(args) => to_json(zfcp::get_lun_info(host, &args.lun)?),
        CmdLun::Add(args) => {
            zfcp::add_lun(host, &args.lun)?;
            Ok(json!({ "added": args.lun }))
        }
        CmdLun::Remove(args) => {
            zfcp::remove_lun(host, &args.lun)?;
            Ok(json!({ "removed": args.lun }))
        }
    }
}

pub(super) fn run_scan(host: &Host, cmd: CmdLunScan) -> Result<Value, S390Error> {
    match cmd {
        CmdLunScan::Status => to_json(lunscan::status(host)?),
        CmdLunScan::Enable => to_json(lunscan::enable(host, true)?),
        CmdLunScan::Disable => to_json(lunscan::enable(host, false)?),
        CmdLunScan::Trigger => {
            let mut progress = Progress::default();
            lunscan::trigger(host, &mut progress)?;

            Ok(json!({ "messages": progress.messages }))
        }
    }
}
