//! DASD-ECKD and zFCP adapter devices on the CCW bus

use tracing::{error, info};

use crate::constants::cmd;
use crate::entity::{Action, DeviceClass, DeviceId, StorageDevice};
use crate::errors::{Code, Result, S390Error};
use crate::host::Host;
use crate::parse::{self, Layout};
use crate::persist::{self, ConfFile};
use crate::sysfs;
use crate::transition::Transition;

const LSCSS_HEADER: &str = r"(Device)\s+(Subchan)\.\s+(DevType)\s+(CU Type)\s+(Use)\s+(PIM)\s+(PAM)\s+(POM)\s+(CHPIDs)$";

// The Use column is either `yes` or three blanks
const LSCSS_ROW_TAIL: &str = r"\s+(\d\.\d\.[0-9a-fA-F]{4})\s+(\w+/\w+)\s+(\w+/\w+)\s(\s{3}|yes)\s+([0-9a-fA-F]{2})\s+([0-9a-fA-F]{2})\s+([0-9a-fA-F]{2})\s+(\w+\s\w+)";

fn lscss_row(device: Option<&DeviceId>) -> String {
    let device = match device {
        Some(id) => format!("({})", regex::escape(&id.to_string())),
        None => r"(\d\.\d\.[0-9a-fA-F]{4})".to_string(),
    };

    format!("{device}{LSCSS_ROW_TAIL}")
}

/// Storage class of `device`, if it is bound to a storage driver
pub fn storage_class(host: &Host, device: &DeviceId) -> Option<DeviceClass> {
    DeviceClass::STORAGE
        .into_iter()
        .find(|class| sysfs::is_class_member(host, device, *class))
}

fn require_storage(host: &Host, device: &DeviceId) -> Result<DeviceClass> {
    storage_class(host, device).ok_or_else(|| {
        error!("{device} is not a DASD-ECKD or zFCP device");
        S390Error::invalid_input(Code::NotStorageDevice, "device", &device.to_string())
    })
}

/// All storage devices, or only those of `class`
pub fn list(host: &Host, class: Option<DeviceClass>) -> Result<Vec<StorageDevice>> {
    let classes = match class {
        None => DeviceClass::STORAGE.to_vec(),
        Some(DeviceClass::Osa) => {
            return Err(S390Error::invalid_input(
                Code::InvalidDeviceClass,
                "type",
                &DeviceClass::Osa.to_string(),
            ))
        }
        Some(class) => vec![class],
    };

    let members: Vec<(DeviceClass, DeviceId)> = classes
        .into_iter()
        .flat_map(|class| {
            sysfs::list_device_class(host, class)
                .into_iter()
                .map(move |id| (class, id))
        })
        .collect();

    if members.is_empty() {
        return Ok(Vec::new());
    }

    let output = host.run(cmd::LSCSS, &[])?.ok_or_fail(Code::ListStorageFailed)?;
    let layout = Layout::new(LSCSS_HEADER, &lscss_row(None))?;
    let rows = parse::get_rows_keyed(&output.stdout, &layout, "Device", |row| {
        Ok(row.clone())
    })?;

    members
        .into_iter()
        .filter_map(|(class, id)| rows.get(&id.to_string()).map(|row| (class, row)))
        .map(|(class, row)| StorageDevice::from_lscss(row, class))
        .collect()
}

pub fn lookup(host: &Host, device: &str) -> Result<StorageDevice> {
    let id = DeviceId::parse(device)?;
    let class = require_storage(host, &id)?;

    let device = id.to_string();
    let output = host
        .run(cmd::LSCSS, &["-d", &device])?
        .ok_or_fail(Code::LookupStorageFailed)?;

    if output.stdout.trim().is_empty() {
        return Err(S390Error::not_found(Code::DeviceNotFound, "device", &device));
    }

    let row = parse::get_row_data(
        &output.stdout,
        &parse::pattern(LSCSS_HEADER)?,
        &parse::pattern(&lscss_row(Some(&id)))?,
    )?;

    if row.is_empty() {
        return Err(S390Error::not_found(Code::DeviceNotFound, "device", &device));
    }

    StorageDevice::from_lscss(&row, class)
}

/// Executes:
/// ```shell
/// chccwdev -e ${{ device }}
/// ```
pub fn bring_online(host: &Host, device: &DeviceId) -> Result<()> {
    info!("bringing {device} online");
    host.run(cmd::CHCCWDEV, &["-e", &device.to_string()])?
        .ok_or_fail(Code::BringOnlineFailed)
        .map(|_| ())
}

/// Executes:
/// ```shell
/// chccwdev -d ${{ device }}
/// ```
pub fn bring_offline(host: &Host, device: &DeviceId) -> Result<()> {
    info!("bringing {device} offline");
    host.run(cmd::CHCCWDEV, &["-d", &device.to_string()])?
        .ok_or_fail(Code::BringOfflineFailed)
        .map(|_| ())
}

/// Brings a storage device online and adds it to its boot config.
/// Steps already in effect are skipped.
pub fn online(host: &Host, device: &str) -> Result<Vec<Action>> {
    let device = DeviceId::parse(device)?;
    let class = require_storage(host, &device)?;

    let mut tx = Transition::new(host);

    if !sysfs::is_online(host, &device) {
        tx.apply(Action::BringOnline { device })?;
        tx.on_rollback(Action::BringOffline { device });
    }

    match class {
        DeviceClass::Zfcp => {
            if !persist::is_persisted(host, &device, ConfFile::Zfcp) {
                tx.apply(Action::PersistZfcp { device })?;
            }
        }
        _ => {
            if !persist::is_persisted(host, &device, ConfFile::Dasd) {
                tx.apply(Action::PersistDasd { device })?;
            }
        }
    }

    Ok(tx.commit())
}

/// Takes a storage device offline and removes it from its boot config
pub fn offline(host: &Host, device: &str) -> Result<Vec<Action>> {
    let device = DeviceId::parse(device)?;
    let class = require_storage(host, &device)?;

    let mut tx = Transition::new(host);

    if sysfs::is_online(host, &device) {
        tx.apply(Action::BringOffline { device })?;
        tx.on_rollback(Action::BringOnline { device });
    }

    match class {
        DeviceClass::Zfcp => {
            if persist::is_persisted(host, &device, ConfFile::Zfcp) {
                tx.apply(Action::UnpersistZfcp { device })?;
            }
        }
        _ => {
            if persist::is_persisted(host, &device, ConfFile::Dasd) {
                tx.apply(Action::UnpersistDasd { device })?;
            }
        }
    }

    Ok(tx.commit())
}
