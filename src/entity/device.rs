use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::id::DeviceId;
use crate::constants::paths;
use crate::errors::{Code, Params, Result, S390Error};
use crate::parse::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    #[serde(rename = "dasd-eckd")]
    DasdEckd,

    #[serde(rename = "zfcp")]
    Zfcp,

    #[serde(rename = "osa")]
    Osa,
}

impl DeviceClass {
    pub const STORAGE: [DeviceClass; 2] = [DeviceClass::DasdEckd, DeviceClass::Zfcp];

    /// sysfs directory of the driver bound to devices of this class
    pub fn driver_dir(&self) -> String {
        match self {
            DeviceClass::DasdEckd => format!("{}/dasd-eckd", paths::CCW_DRIVERS),
            DeviceClass::Zfcp => format!("{}/zfcp", paths::CCW_DRIVERS),
            DeviceClass::Osa => format!("{}/qeth", paths::CCWGROUP_DRIVERS),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceClass::DasdEckd => "dasd-eckd",
            DeviceClass::Zfcp => "zfcp",
            DeviceClass::Osa => "osa",
        };

        f.write_str(s)
    }
}

impl FromStr for DeviceClass {
    type Err = S390Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dasd-eckd" | "dasd" => Ok(DeviceClass::DasdEckd),
            "zfcp" => Ok(DeviceClass::Zfcp),
            "osa" | "qeth" => Ok(DeviceClass::Osa),
            _ => Err(S390Error::invalid_input(
                Code::InvalidDeviceClass,
                "type",
                s,
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Offline,
    Unconfigured,
}

fn column<'a>(row: &'a Row, name: &'static str) -> Result<&'a str> {
    row.get(name).map(|s| s.as_str()).ok_or_else(|| S390Error::ParseFailed {
        code: Code::HeaderNotFound,
        params: Params::from([("column", name.to_string())]),
    })
}

fn device_id_column(row: &Row, name: &'static str) -> Result<DeviceId> {
    let value = column(row, name)?;
    DeviceId::parse(value).map_err(|_| S390Error::ParseFailed {
        code: Code::InvalidDeviceId,
        params: Params::from([("column", name.to_string()), ("value", value.to_string())]),
    })
}

/// A DASD or zFCP adapter as reported by `lscss`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDevice {
    pub device: DeviceId,
    pub sub_channel: DeviceId,
    pub device_type: String,
    pub cu_type: String,
    pub status: Status,
    pub device_class: DeviceClass,
    pub enabled_chipids: Vec<String>,
    pub installed_chipids: Vec<String>,
}

impl StorageDevice {
    pub fn from_lscss(row: &Row, device_class: DeviceClass) -> Result<Self> {
        let status = match column(row, "Use")? {
            "yes" => Status::Online,
            _ => Status::Offline,
        };

        // Eight path ids packed into two words, e.g. `b0b10d00 11223344`
        let chpids: String = column(row, "CHPIDs")?.split_whitespace().collect();
        let chpid_tokens = split_chpids(&chpids);

        let pim = parse_mask(column(row, "PIM")?)?;
        let pam = parse_mask(column(row, "PAM")?)?;

        let installed_chipids = chpids_for_mask(pim, &chpid_tokens);
        let enabled_chipids = match pim == pam {
            true => installed_chipids.clone(),
            false => chpids_for_mask(pam & pim, &chpid_tokens),
        };

        Ok(Self {
            device: device_id_column(row, "Device")?,
            sub_channel: device_id_column(row, "Subchan")?,
            device_type: column(row, "DevType")?.to_string(),
            cu_type: column(row, "CU Type")?.to_string(),
            status,
            device_class,
            enabled_chipids,
            installed_chipids,
        })
    }
}

fn parse_mask(mask: &str) -> Result<u8> {
    u8::from_str_radix(mask, 16).map_err(|_| S390Error::ParseFailed {
        code: Code::HeaderNotFound,
        params: Params::from([("mask", mask.to_string())]),
    })
}

/// Splits packed channel path ids, e.g. `b0b10d00` into `b0 b1 0d 00`
pub fn split_chpids(packed: &str) -> Vec<String> {
    packed
        .as_bytes()
        .chunks(2)
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect()
}

/// Bit 7 (MSB) of `mask` selects `ids[0]`, bit 6 selects `ids[1]` and so on
pub fn chpids_for_mask(mask: u8, ids: &[String]) -> Vec<String> {
    (0..8)
        .filter(|i| mask & (0x80 >> i) != 0)
        .filter_map(|i| ids.get(i).cloned())
        .collect()
}

/// An OSA (qeth) network device as reported by `znetconf`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDevice {
    pub name: String,
    pub state: Status,
    pub device_ids: Vec<DeviceId>,
    pub card_type: String,
    pub chpid: String,
    pub driver: String,
    #[serde(rename = "type")]
    pub dev_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub osa_portno: Option<u8>,
}

impl NetworkDevice {
    pub fn from_znetconf(row: &Row) -> Result<Self> {
        let device_ids = column(row, "Device IDs")?
            .split(',')
            .map(DeviceId::parse)
            .collect::<Result<Vec<_>>>()?;

        let first = device_ids.first().ok_or_else(|| S390Error::ParseFailed {
            code: Code::InvalidDeviceId,
            params: Params::from([("column", "Device IDs".to_string())]),
        })?;

        let name = match row.get("Name") {
            Some(name) => name.clone(),
            None => first.to_string(),
        };

        let state = match row.get("State").map(|s| s.to_lowercase()) {
            None => Status::Unconfigured,
            Some(s) if s == "online" => Status::Online,
            Some(_) => Status::Offline,
        };

        Ok(Self {
            name,
            state,
            card_type: column(row, "Card Type")?.to_string(),
            chpid: column(row, "CHPID")?.to_string(),
            driver: column(row, "Drv")?.to_string(),
            dev_type: column(row, "Type")?.to_string(),
            device_ids,
            osa_portno: None,
        })
    }

    /// First (read) subchannel, which also names the device
    pub fn id(&self) -> Option<&DeviceId> {
        self.device_ids.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        split_chpids("b0b10d00")
    }

    #[test]
    fn test_chpids_for_mask() {
        assert_eq!(ids(), vec!["b0", "b1", "0d", "00"]);
        assert_eq!(chpids_for_mask(0xe0, &ids()), vec!["b0", "b1", "0d"]);
        assert_eq!(chpids_for_mask(0x80, &ids()), vec!["b0"]);
        assert_eq!(chpids_for_mask(0x50, &ids()), vec!["b1", "00"]);
        // Bits beyond the known ids select nothing
        assert_eq!(chpids_for_mask(0xff, &ids()).len(), 4);
    }

    fn lscss_row(use_col: &str, pim: &str, pam: &str) -> Row {
        lscss_row_with_paths(use_col, pim, pam, "b0b10d00 00000000")
    }

    fn lscss_row_with_paths(use_col: &str, pim: &str, pam: &str, chpids: &str) -> Row {
        Row::from([
            ("Device".to_string(), "0.0.0200".to_string()),
            ("Subchan".to_string(), "0.0.0000".to_string()),
            ("DevType".to_string(), "3390/0a".to_string()),
            ("CU Type".to_string(), "3990/e9".to_string()),
            ("Use".to_string(), use_col.to_string()),
            ("PIM".to_string(), pim.to_string()),
            ("PAM".to_string(), pam.to_string()),
            ("POM".to_string(), "ff".to_string()),
            ("CHPIDs".to_string(), chpids.to_string()),
        ])
    }

    #[test]
    fn test_storage_from_lscss() {
        let dev = StorageDevice::from_lscss(&lscss_row("yes", "e0", "e0"), DeviceClass::DasdEckd)
            .unwrap();

        assert_eq!(dev.status, Status::Online);
        assert_eq!(dev.device.to_string(), "0.0.0200");
        assert_eq!(dev.cu_type, "3990/e9");
        assert_eq!(dev.installed_chipids, vec!["b0", "b1", "0d"]);
        assert_eq!(dev.enabled_chipids, dev.installed_chipids);

        let dev = StorageDevice::from_lscss(&lscss_row("   ", "e0", "80"), DeviceClass::DasdEckd)
            .unwrap();

        assert_eq!(dev.status, Status::Offline);
        assert_eq!(dev.installed_chipids, vec!["b0", "b1", "0d"]);
        assert_eq!(dev.enabled_chipids, vec!["b0"]);
    }

    #[test]
    fn test_enabled_subset_of_installed() {
        // PAM claims a path that is not installed
        let dev = StorageDevice::from_lscss(&lscss_row("yes", "80", "c0"), DeviceClass::Zfcp)
            .unwrap();

        assert_eq!(dev.installed_chipids, vec!["b0"]);
        assert_eq!(dev.enabled_chipids, vec!["b0"]);
    }

    #[test]
    fn test_paths_from_second_chpid_word() {
        let row = lscss_row_with_paths("yes", "ff", "0f", "b0b10d00 11223344");
        let dev = StorageDevice::from_lscss(&row, DeviceClass::DasdEckd).unwrap();

        assert_eq!(
            dev.installed_chipids,
            vec!["b0", "b1", "0d", "00", "11", "22", "33", "44"]
        );
        assert_eq!(dev.enabled_chipids, vec!["11", "22", "33", "44"]);

        let row = lscss_row_with_paths("yes", "01", "01", "00000000 000000fe");
        let dev = StorageDevice::from_lscss(&row, DeviceClass::Zfcp).unwrap();
        assert_eq!(dev.installed_chipids, vec!["fe"]);
    }

    #[test]
    fn test_network_from_unconfigured_row() {
        let row = Row::from([
            ("Device IDs".to_string(), "0.0.f503,0.0.f504,0.0.f505".to_string()),
            ("Type".to_string(), "1731/01".to_string()),
            ("Card Type".to_string(), "OSA (QDIO)".to_string()),
            ("CHPID".to_string(), "76".to_string()),
            ("Drv".to_string(), "qeth".to_string()),
        ]);

        let dev = NetworkDevice::from_znetconf(&row).unwrap();
        assert_eq!(dev.name, "0.0.f503");
        assert_eq!(dev.state, Status::Unconfigured);
        assert_eq!(dev.device_ids.len(), 3);
        assert_eq!(dev.id().unwrap().to_string(), "0.0.f503");

        let json = serde_json::to_value(&dev).unwrap();
        assert_eq!(json["type"], "1731/01");
        assert_eq!(json["state"], "unconfigured");
        assert!(json.get("osa_portno").is_none());
    }

    #[test]
    fn test_device_class_from_str() {
        assert_eq!("dasd-eckd".parse::<DeviceClass>().unwrap(), DeviceClass::DasdEckd);
        assert_eq!("ZFCP".parse::<DeviceClass>().unwrap(), DeviceClass::Zfcp);
        assert_eq!(
            "tape".parse::<DeviceClass>().unwrap_err().code(),
            Code::InvalidDeviceClass
        );
    }
}
