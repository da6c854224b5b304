use serde_json::Value;

use s390dev::errors::S390Error;
use s390dev::host::Host;
use s390dev::storage;

use super::{to_json, transition};
use crate::cli::CmdStorage;

pub(super) fn run(host: &Host, cmd: CmdStorage) -> Result<Value, S390Error> {
    match cmd {
        CmdStorage::List { class } => to_json(storage::list(host, class)?),
        CmdStorage::Show(args) => to_json(storage::lookup(host, &args.device)?),
        CmdStorage::Online(args) => {
            transition("online", &args.device, || storage::online(host, &args.device))
        }
        CmdStorage::Offline(args) => {
            transition("offline", &args.device, || storage::offline(host, &args.device))
        }
    }
}
