pub mod action;
pub mod device;
pub mod id;
pub mod lun;
pub mod report;
pub mod tape;

pub use action::Action;
pub use device::{DeviceClass, NetworkDevice, Status, StorageDevice};
pub use id::{
    validate_hba_id, validate_lun_path, validate_wwpn_or_lun, DeviceId, FcId, LunId, LunPath,
    Wwpn, LUN0, WLUN,
};
pub use lun::{LunInfo, LunScan, SoftFailure};
pub use report::Report;
pub use tape::TapeDevice;
