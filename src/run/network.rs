use serde_json::{json, Value};

use s390dev::errors::S390Error;
use s390dev::host::Host;
use s390dev::network;
use s390dev::task::Progress;

use super::{to_json, transition};
use crate::cli::CmdNetwork;

pub(super) fn run(host: &Host, cmd: CmdNetwork) -> Result<Value, S390Error> {
    match cmd {
        CmdNetwork::List {
            configured,
            unconfigured,
        } => {
            let filter = match (configured, unconfigured) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };

            to_json(network::list(host, filter)?)
        }

        CmdNetwork::Show(args) => to_json(network::lookup(host, &args.interface)?),

        CmdNetwork::Configure { interface, portno } => {
            let target = &interface.interface;
            let mut progress = Progress::default();

            let mut report = transition("configure", target, || {
                network::configure_task(host, target, portno, &mut progress)
            })?;
            report["messages"] = json!(progress.messages);

            Ok(report)
        }

        CmdNetwork::Unconfigure(args) => {
            let target = &args.interface;
            let mut progress = Progress::default();

            let mut report = transition("unconfigure", target, || {
                network::unconfigure_task(host, target, &mut progress)
            })?;
            report["messages"] = json!(progress.messages);

            Ok(report)
        }

        CmdNetwork::Update { interface, portno } => {
            let target = &interface.interface;
            transition("update", target, || network::update(host, target, portno))
        }
    }
}
