//! Multi-step device transitions with compensating rollback.
//!
//! Each step is an [`Action`]. After a step succeeds, the caller records
//! the action that undoes it. If a later step fails, the recorded
//! compensations run newest first and the failure is returned as
//! [`S390Error::TransitionFailed`]. [`Transition::commit`] drops the
//! compensations once every step went through.

use tracing::{error, info, warn};

use crate::entity::Action;
use crate::errors::{Result, S390Error};
use crate::host::Host;
use crate::persist::{self, ConfFile};
use crate::{ifcfg, network, storage};

/// Performs one action against the host
pub fn execute(host: &Host, action: &Action) -> Result<()> {
    match action {
        Action::BringOnline { device } => storage::bring_online(host, device),
        Action::BringOffline { device } => storage::bring_offline(host, device),
        Action::PersistDasd { device } => persist::persist(host, device, ConfFile::Dasd),
        Action::UnpersistDasd { device } => persist::unpersist(host, device, ConfFile::Dasd),
        Action::PersistZfcp { device } => persist::persist(host, device, ConfFile::Zfcp),
        Action::UnpersistZfcp { device } => persist::unpersist(host, device, ConfFile::Zfcp),
        Action::ConfigureNetwork { device, portno } => {
            network::bring_online(host, device, *portno)
        }
        Action::RemoveNetwork { device } => network::bring_offline(host, device),
        Action::CreateIfcfg { device } => ifcfg::create(host, device),
        Action::WriteIfcfg { device, portno } => network::write_ifcfg(host, device, *portno),
        Action::RemoveIfcfg { device } => ifcfg::remove(host, device),
        Action::ReprogramPortNo { device, portno } => {
            network::reprogram_portno(host, device, *portno)
        }
    }
}

pub struct Transition<'h> {
    host: &'h Host,
    performed: Vec<Action>,
    compensations: Vec<Action>,
}

impl<'h> Transition<'h> {
    pub fn new(host: &'h Host) -> Self {
        Self {
            host,
            performed: Vec::new(),
            compensations: Vec::new(),
        }
    }

    /// Executes `action`, rolling back everything recorded so far if it fails
    pub fn apply(&mut self, action: Action) -> Result<()> {
        info!("applying {action}");

        match execute(self.host, &action) {
            Ok(()) => {
                self.performed.push(action);
                Ok(())
            }
            Err(err) => Err(self.rollback(err, action)),
        }
    }

    /// Records how to undo the last applied step
    pub fn on_rollback(&mut self, compensation: Action) {
        self.compensations.push(compensation);
    }

    /// Marks the transition complete and returns the steps performed
    pub fn commit(mut self) -> Vec<Action> {
        self.compensations.clear();
        std::mem::take(&mut self.performed)
    }

    fn unwind(&mut self) -> (Vec<Action>, Vec<Action>) {
        let mut rolled_back = Vec::new();
        let mut failures = Vec::new();

        while let Some(compensation) = self.compensations.pop() {
            warn!("rolling back with {compensation}");

            match execute(self.host, &compensation) {
                Ok(()) => rolled_back.push(compensation),
                Err(err) => {
                    error!("rollback step {compensation} failed: {err}");
                    failures.push(compensation);
                }
            }
        }

        (rolled_back, failures)
    }

    fn rollback(&mut self, error: S390Error, action_failed: Action) -> S390Error {
        error!("{action_failed} failed: {error}");
        let (actions_rolled_back, rollback_failures) = self.unwind();

        S390Error::TransitionFailed {
            error: Box::new(error),
            action_failed,
            actions_rolled_back,
            rollback_failures,
        }
    }
}

impl Drop for Transition<'_> {
    // A transition dropped without commit, e.g. on an early return
    fn drop(&mut self) {
        if !self.compensations.is_empty() {
            warn!("transition dropped before commit");
            self.unwind();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::paths;
    use crate::entity::DeviceId;
    use crate::host::test_utils::{fake_host, put, read};
    use crate::utils::shell::test_utils::{fail, joined, ok};

    fn online_file(id: &str) -> String {
        format!("{}/{id}/online", paths::CCW_DEVICES)
    }

    #[test]
    fn test_failure_runs_compensations_in_reverse() {
        let (dir, host, calls) = fake_host(|_| {
            |argv: &[String]| match argv[1].as_str() {
                "-e" => ok(""),
                _ => fail(1, "busy"),
            }
        });

        let a = DeviceId::parse("0.0.0200").unwrap();
        let b = DeviceId::parse("0.0.0300").unwrap();

        let mut tx = Transition::new(&host);
        tx.apply(Action::BringOnline { device: a }).unwrap();
        tx.on_rollback(Action::RemoveIfcfg { device: a });
        tx.apply(Action::BringOnline { device: b }).unwrap();
        tx.on_rollback(Action::BringOffline { device: b });

        // dasd.conf is missing
        let err = tx.apply(Action::PersistDasd { device: b }).unwrap_err();

        match err {
            S390Error::TransitionFailed {
                action_failed,
                actions_rolled_back,
                rollback_failures,
                error,
            } => {
                assert_eq!(action_failed, Action::PersistDasd { device: b });
                assert_eq!(error.code(), crate::errors::Code::PersistDasdFailed);
                // chccwdev -d fails in this fake, ifcfg removal succeeds
                assert_eq!(rollback_failures, vec![Action::BringOffline { device: b }]);
                assert_eq!(actions_rolled_back, vec![Action::RemoveIfcfg { device: a }]);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert_eq!(
            joined(&calls),
            vec!["chccwdev -e 0.0.0200", "chccwdev -e 0.0.0300", "chccwdev -d 0.0.0300"]
        );
        assert!(read(dir.path(), paths::DASD_CONF).is_empty());

        drop(tx);
        assert_eq!(calls.borrow().len(), 3);
    }

    #[test]
    fn test_commit_discards_compensations() {
        let (dir, host, calls) = fake_host(|_| |_: &[String]| ok(""));
        put(dir.path(), paths::DASD_CONF, "");
        put(dir.path(), &online_file("0.0.0200"), "0");

        let dev = DeviceId::parse("0200").unwrap();
        let mut tx = Transition::new(&host);
        tx.apply(Action::BringOnline { device: dev }).unwrap();
        tx.on_rollback(Action::BringOffline { device: dev });
        tx.apply(Action::PersistDasd { device: dev }).unwrap();

        let performed = tx.commit();
        assert_eq!(performed.len(), 2);
        assert_eq!(joined(&calls), vec!["chccwdev -e 0.0.0200"]);
    }

    #[test]
    fn test_drop_without_commit_unwinds() {
        let (_dir, host, calls) = fake_host(|_| |_: &[String]| ok(""));
        let dev = DeviceId::parse("0200").unwrap();

        {
            let mut tx = Transition::new(&host);
            tx.apply(Action::BringOnline { device: dev }).unwrap();
            tx.on_rollback(Action::BringOffline { device: dev });
        }

        assert_eq!(
            joined(&calls),
            vec!["chccwdev -e 0.0.0200", "chccwdev -d 0.0.0200"]
        );
    }
}
