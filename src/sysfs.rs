use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::constants::paths;
use crate::entity::{DeviceClass, DeviceId};
use crate::errors::{Code, S390Error};
use crate::host::Host;

/// Reads a sysfs attribute, trimmed
pub fn read_attr<P: AsRef<Path>>(path: P) -> io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

pub fn write_attr<P: AsRef<Path>>(path: P, value: &str) -> io::Result<()> {
    fs::write(path, value)
}

/// Wraps an attribute write failure into a typed error
pub fn write_attr_or<P: AsRef<Path>>(
    path: P,
    value: &str,
    code: Code,
) -> Result<(), S390Error> {
    write_attr(&path, value).map_err(|error| S390Error::SysfsFailed {
        code,
        path: path.as_ref().display().to_string(),
        error,
    })
}

/// True iff the attribute reads `1`. Unreadable means unset.
pub fn attr_is_set<P: AsRef<Path>>(path: P) -> bool {
    matches!(read_attr(path).as_deref(), Ok("1"))
}

/// Device ids bound to the class driver, taken from the `0.*`
/// directories below the driver's sysfs path
pub fn list_device_class(host: &Host, class: DeviceClass) -> Vec<DeviceId> {
    let dir = host.path(&class.driver_dir());

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!("cannot list {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut ids: Vec<DeviceId> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            match name.starts_with("0.") {
                true => DeviceId::parse(&name).ok(),
                false => None,
            }
        })
        .collect();

    ids.sort();
    ids
}

pub fn is_class_member(host: &Host, device: &DeviceId, class: DeviceClass) -> bool {
    list_device_class(host, class).contains(device)
}

/// Online state of a CCW device
pub fn is_online(host: &Host, device: &DeviceId) -> bool {
    attr_is_set(host.path(&format!("{}/{device}/online", paths::CCW_DEVICES)))
}

/// Online state of a CCW group device (qeth)
pub fn is_group_online(host: &Host, device: &DeviceId) -> bool {
    attr_is_set(host.path(&format!("{}/{device}/online", paths::CCWGROUP_DEVICES)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_utils::{fake_host, mkdir, put};
    use crate::utils::shell::test_utils::ok;

    #[test]
    fn test_list_device_class() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        let root = dir.path();

        mkdir(root, "/sys/bus/ccw/drivers/dasd-eckd/0.0.0200");
        mkdir(root, "/sys/bus/ccw/drivers/dasd-eckd/0.0.0100");
        mkdir(root, "/sys/bus/ccw/drivers/dasd-eckd/module");
        put(root, "/sys/bus/ccw/drivers/dasd-eckd/bind", "");
        mkdir(root, "/sys/bus/ccw/drivers/zfcp/0.0.3c02");

        let dasds = list_device_class(&host, DeviceClass::DasdEckd);
        let names: Vec<String> = dasds.iter().map(|d| d.to_string()).collect();
        assert_eq!(names, vec!["0.0.0100", "0.0.0200"]);

        let zfcp = DeviceId::parse("3c02").unwrap();
        assert!(is_class_member(&host, &zfcp, DeviceClass::Zfcp));
        assert!(!is_class_member(&host, &zfcp, DeviceClass::DasdEckd));

        // Missing driver directory
        assert!(list_device_class(&host, DeviceClass::Osa).is_empty());
    }

    #[test]
    fn test_is_online() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        let root = dir.path();

        put(root, "/sys/bus/ccw/devices/0.0.0200/online", "1\n");
        put(root, "/sys/bus/ccw/devices/0.0.0300/online", "0\n");
        put(root, "/sys/bus/ccwgroup/devices/0.0.f500/online", "1\n");

        let id = |s| DeviceId::parse(s).unwrap();
        assert!(is_online(&host, &id("0200")));
        assert!(!is_online(&host, &id("0300")));
        assert!(!is_online(&host, &id("0400")));
        assert!(is_group_online(&host, &id("f500")));
        assert!(!is_group_online(&host, &id("0200")));
    }
}
