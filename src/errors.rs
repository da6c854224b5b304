use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

use crate::entity::action::Action;

/// Substitution parameters attached to an error, consumed by the
/// presentation layer to render a localized message.
pub type Params = BTreeMap<&'static str, String>;

pub type Result<T> = std::result::Result<T, S390Error>;

/// Symbolic error codes. These are stable strings, never free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    BadConfig,
    InvalidDeviceId,
    MissingParameter,
    InvalidWwpnOrLun,
    InvalidLunPath,
    InvalidPortNo,
    InvalidDeviceClass,
    NotStorageDevice,
    DeviceNotFound,
    LunNotFound,
    DeviceNotConfigured,
    LunScanEnabled,
    CommandFailed,
    ListStorageFailed,
    LookupStorageFailed,
    ListNetworkFailed,
    BringOnlineFailed,
    BringOfflineFailed,
    NetworkConfigureFailed,
    NetworkUnconfigureFailed,
    PersistDasdFailed,
    UnpersistDasdFailed,
    PersistZfcpFailed,
    UnpersistZfcpFailed,
    CreateIfcfgFailed,
    WriteIfcfgFailed,
    RemoveIfcfgFailed,
    PortNoUpdateFailed,
    HeaderNotFound,
    BadPattern,
    ZiplConfMalformed,
    ZiplConfFailed,
    BootParamNotFound,
    ZiplFailed,
    LunScanStatusFailed,
    LunScanToggleFailed,
    LunScanTriggerFailed,
    ListLunsFailed,
    AddLunFailed,
    RemoveLunFailed,
    RemoveSgDeviceFailed,
    MultipathFlushFailed,
    IgnoreListFailed,
    IgnoreRemoveFailed,
    TapeListFailed,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::BadConfig => "bad-config",
            Code::InvalidDeviceId => "invalid-device-id",
            Code::MissingParameter => "missing-parameter",
            Code::InvalidWwpnOrLun => "invalid-wwpn-or-lun",
            Code::InvalidLunPath => "invalid-lun-path",
            Code::InvalidPortNo => "invalid-portno",
            Code::InvalidDeviceClass => "invalid-device-class",
            Code::NotStorageDevice => "not-storage-device",
            Code::DeviceNotFound => "device-not-found",
            Code::LunNotFound => "lun-not-found",
            Code::DeviceNotConfigured => "device-not-configured",
            Code::LunScanEnabled => "lun-scan-enabled",
            Code::CommandFailed => "command-failed",
            Code::ListStorageFailed => "list-storage-failed",
            Code::LookupStorageFailed => "lookup-storage-failed",
            Code::ListNetworkFailed => "list-network-failed",
            Code::BringOnlineFailed => "bring-online-failed",
            Code::BringOfflineFailed => "bring-offline-failed",
            Code::NetworkConfigureFailed => "network-configure-failed",
            Code::NetworkUnconfigureFailed => "network-unconfigure-failed",
            Code::PersistDasdFailed => "persist-dasd-failed",
            Code::UnpersistDasdFailed => "unpersist-dasd-failed",
            Code::PersistZfcpFailed => "persist-zfcp-failed",
            Code::UnpersistZfcpFailed => "unpersist-zfcp-failed",
            Code::CreateIfcfgFailed => "create-ifcfg-failed",
            Code::WriteIfcfgFailed => "write-ifcfg-failed",
            Code::RemoveIfcfgFailed => "remove-ifcfg-failed",
            Code::PortNoUpdateFailed => "portno-update-failed",
            Code::HeaderNotFound => "header-not-found",
            Code::BadPattern => "bad-pattern",
            Code::ZiplConfMalformed => "zipl-conf-malformed",
            Code::ZiplConfFailed => "zipl-conf-failed",
            Code::BootParamNotFound => "boot-param-not-found",
            Code::ZiplFailed => "zipl-failed",
            Code::LunScanStatusFailed => "lun-scan-status-failed",
            Code::LunScanToggleFailed => "lun-scan-toggle-failed",
            Code::LunScanTriggerFailed => "lun-scan-trigger-failed",
            Code::ListLunsFailed => "list-luns-failed",
            Code::AddLunFailed => "add-lun-failed",
            Code::RemoveLunFailed => "remove-lun-failed",
            Code::RemoveSgDeviceFailed => "remove-sg-device-failed",
            Code::MultipathFlushFailed => "multipath-flush-failed",
            Code::IgnoreListFailed => "ignore-list-failed",
            Code::IgnoreRemoveFailed => "ignore-remove-failed",
            Code::TapeListFailed => "tape-list-failed",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum S390Error {
    #[error("invalid input: {code}")]
    InvalidInput { code: Code, params: Params },

    #[error("not found: {code}")]
    NotFound { code: Code, params: Params },

    #[error("invalid operation: {code}")]
    InvalidOperation { code: Code, params: Params },

    #[error("command {command} exited with non-zero status {rc}")]
    CmdFailed {
        code: Code,
        command: String,
        rc: i32,
        stderr: String,
    },

    #[error("command {command} failed to spawn")]
    CmdSpawn {
        command: String,
        #[source]
        error: std::io::Error,
    },

    #[error("persistence failed: {code}")]
    PersistenceFailed {
        code: Code,
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("sysfs attribute {path} not accessible: {code}")]
    SysfsFailed {
        code: Code,
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("unrecognized output: {code}")]
    ParseFailed { code: Code, params: Params },

    #[error("transition failed at {action_failed}: {error}")]
    TransitionFailed {
        error: Box<S390Error>,
        action_failed: Action,
        actions_rolled_back: Vec<Action>,
        rollback_failures: Vec<Action>,
    },

    #[error("{} device(s) failed: {code}", failed.len())]
    PartialFailure {
        code: Code,
        failed: BTreeMap<String, String>,
    },
}

impl S390Error {
    pub fn invalid_input(code: Code, key: &'static str, value: &str) -> Self {
        S390Error::InvalidInput {
            code,
            params: Params::from([(key, value.to_string())]),
        }
    }

    pub fn not_found(code: Code, key: &'static str, value: &str) -> Self {
        S390Error::NotFound {
            code,
            params: Params::from([(key, value.to_string())]),
        }
    }

    pub fn code(&self) -> Code {
        match self {
            S390Error::InvalidInput { code, .. }
            | S390Error::NotFound { code, .. }
            | S390Error::InvalidOperation { code, .. }
            | S390Error::CmdFailed { code, .. }
            | S390Error::PersistenceFailed { code, .. }
            | S390Error::SysfsFailed { code, .. }
            | S390Error::ParseFailed { code, .. }
            | S390Error::PartialFailure { code, .. } => *code,
            S390Error::CmdSpawn { .. } => Code::CommandFailed,
            S390Error::TransitionFailed { error, .. } => error.code(),
        }
    }

    pub fn params(&self) -> Params {
        match self {
            S390Error::InvalidInput { params, .. }
            | S390Error::NotFound { params, .. }
            | S390Error::InvalidOperation { params, .. }
            | S390Error::ParseFailed { params, .. } => params.clone(),
            S390Error::CmdFailed {
                command, rc, stderr, ..
            } => Params::from([
                ("command", command.clone()),
                ("rc", rc.to_string()),
                ("err", stderr.trim().to_string()),
            ]),
            S390Error::CmdSpawn { command, error } => Params::from([
                ("command", command.clone()),
                ("err", error.to_string()),
            ]),
            S390Error::PersistenceFailed { path, error, .. }
            | S390Error::SysfsFailed { path, error, .. } => Params::from([
                ("path", path.clone()),
                ("err", error.to_string()),
            ]),
            S390Error::TransitionFailed {
                error,
                action_failed,
                ..
            } => {
                let mut params = error.params();
                params.insert("action", action_failed.to_string());
                params
            }
            S390Error::PartialFailure { failed, .. } => Params::from([(
                "devices",
                failed.keys().cloned().collect::<Vec<_>>().join(", "),
            )]),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = json!({
            "code": self.code(),
            "params": self.params(),
        });

        match self {
            S390Error::TransitionFailed {
                actions_rolled_back,
                rollback_failures,
                ..
            } => {
                value["rolledBack"] = json!(actions_rolled_back);
                value["rollbackFailures"] = json!(rollback_failures);
            }
            S390Error::PartialFailure { failed, .. } => {
                value["failed"] = json!(failed);
            }
            _ => {}
        }

        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DeviceId;

    #[test]
    fn test_transition_error_reports_inner_code() {
        let device: DeviceId = "0.0.0200".parse().unwrap();
        let err = S390Error::TransitionFailed {
            error: Box::new(S390Error::CmdFailed {
                code: Code::BringOnlineFailed,
                command: "chccwdev -e 0.0.0200".into(),
                rc: 1,
                stderr: "device busy\n".into(),
            }),
            action_failed: Action::BringOnline { device },
            actions_rolled_back: vec![],
            rollback_failures: vec![],
        };

        assert_eq!(err.code(), Code::BringOnlineFailed);

        let params = err.params();
        assert_eq!(params["rc"], "1");
        assert_eq!(params["err"], "device busy");
        assert!(params.contains_key("action"));

        let json = err.to_json();
        assert_eq!(json["code"], "bring-online-failed");
        assert!(json["rolledBack"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_partial_failure_lists_devices() {
        let err = S390Error::PartialFailure {
            code: Code::IgnoreRemoveFailed,
            failed: BTreeMap::from([
                ("dev1".to_string(), "not ignored".to_string()),
                ("25".to_string(), "bad range".to_string()),
            ]),
        };

        assert_eq!(err.params()["devices"], "25, dev1");
        assert_eq!(err.to_json()["failed"]["dev1"], "not ignored");
    }
}
