use serde::{Deserialize, Serialize};

use super::device::Status;
use super::id::{DeviceId, LunId, LunPath, Wwpn};

/// Details of a single LUN, gathered with `sg_inq`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunInfo {
    pub hba_id: DeviceId,
    pub remote_wwpn: Wwpn,
    pub lun_id: LunId,
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sg_dev: Option<String>,
    pub status: Status,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub dev_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(rename = "controllerSN", skip_serializing_if = "Option::is_none")]
    pub controller_sn: Option<String>,
}

/// Something that went wrong during best-effort work and was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftFailure {
    pub context: String,
    pub reason: String,
}

impl SoftFailure {
    pub fn new<C: ToString, R: ToString>(context: C, reason: R) -> Self {
        Self {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result of a LUN scan: everything found, plus what had to be skipped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LunScan {
    pub luns: Vec<LunPath>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub soft_failures: Vec<SoftFailure>,
}
