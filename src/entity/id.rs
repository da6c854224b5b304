use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::ENCCW;
use crate::errors::{Code, Result, S390Error};

/// Channel subsystem device address `<css>.<ssid>.<devno>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    css: u8,
    ssid: u8,
    devno: u16,
}

impl DeviceId {
    pub fn new(css: u8, ssid: u8, devno: u16) -> Self {
        Self { css, ssid, devno }
    }

    /// Accepts `0.0.f500`, `f500` and `enccw0.0.f500`.
    /// A bare devno gets the `0.0.` prefix.
    pub fn parse(input: &str) -> Result<Self> {
        let bad = || S390Error::invalid_input(Code::InvalidDeviceId, "device", input);

        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix(ENCCW).unwrap_or(trimmed);

        let normalized = match trimmed.contains('.') {
            true => trimmed.to_string(),
            false => format!("0.0.{trimmed}"),
        };

        let parts: Vec<&str> = normalized.split('.').collect();
        let [css, ssid, devno] = parts.as_slice() else {
            return Err(bad());
        };

        let digit = |s: &str| -> Option<u8> {
            match s.as_bytes() {
                [b] if b.is_ascii_digit() => Some(b - b'0'),
                _ => None,
            }
        };

        if devno.len() != 4 || !devno.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }

        let css = digit(*css).ok_or_else(bad)?;
        let ssid = digit(*ssid).ok_or_else(bad)?;
        let devno = u16::from_str_radix(*devno, 16).map_err(|_| bad())?;

        Ok(Self { css, ssid, devno })
    }

    pub fn devno(&self) -> u16 {
        self.devno
    }

    /// Network interface name, e.g. `enccw0.0.f500`
    pub fn interface(&self) -> String {
        format!("{ENCCW}{self}")
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:04x}", self.css, self.ssid, self.devno)
    }
}

impl FromStr for DeviceId {
    type Err = S390Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A 64-bit Fibre Channel identifier (WWPN or FCP LUN), written as
/// `0x` followed by 16 hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FcId(pub u64);

pub type Wwpn = FcId;
pub type LunId = FcId;

/// LUN 0, added to a port to start discovery
pub const LUN0: LunId = FcId(0);

/// REPORT LUNS well-known LUN, the fallback probe
pub const WLUN: LunId = FcId(0xc101_0000_0000_0000);

impl FcId {
    pub fn parse(input: &str) -> Result<Self> {
        let bad =
            || S390Error::invalid_input(Code::InvalidWwpnOrLun, "id", input);

        let hex = input.trim().strip_prefix("0x").ok_or_else(bad)?;
        if hex.len() != 16 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }

        u64::from_str_radix(hex, 16).map(FcId).map_err(|_| bad())
    }
}

impl fmt::Display for FcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl FromStr for FcId {
    type Err = S390Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// `<hba>:<wwpn>:<lun>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LunPath {
    pub hba_id: DeviceId,
    pub wwpn: Wwpn,
    pub lun: LunId,
}

impl LunPath {
    pub fn new(hba_id: DeviceId, wwpn: Wwpn, lun: LunId) -> Self {
        Self { hba_id, wwpn, lun }
    }

    /// Builds a path from separately supplied fields, rejecting
    /// missing ones before validating the rest.
    pub fn from_parts(hba_id: &str, wwpn: &str, lun: &str) -> Result<Self> {
        for (name, value) in [("hbaId", hba_id), ("remoteWwpn", wwpn), ("lunId", lun)] {
            if value.trim().is_empty() {
                return Err(S390Error::invalid_input(
                    Code::MissingParameter,
                    "param",
                    name,
                ));
            }
        }

        Ok(Self {
            hba_id: validate_hba_id(hba_id)?,
            wwpn: validate_wwpn_or_lun(wwpn)?,
            lun: validate_wwpn_or_lun(lun)?,
        })
    }

    /// sysfs location of the LUN entry below its port
    pub fn port_dir(&self) -> String {
        format!(
            "{}/{}/{}",
            crate::constants::paths::ZFCP_DRIVER,
            self.hba_id,
            self.wwpn
        )
    }

    pub fn lun_dir(&self) -> String {
        format!("{}/{}", self.port_dir(), self.lun)
    }

    /// `zfcp.conf` line for this LUN
    pub fn conf_line(&self) -> String {
        format!("{} {} {}", self.hba_id, self.wwpn, self.lun)
    }
}

pub fn validate_hba_id(input: &str) -> Result<DeviceId> {
    if !input.trim().contains('.') {
        return Err(S390Error::invalid_input(
            Code::InvalidDeviceId,
            "hbaId",
            input,
        ));
    }

    DeviceId::parse(input)
}

pub fn validate_wwpn_or_lun(input: &str) -> Result<FcId> {
    FcId::parse(input)
}

pub fn validate_lun_path(input: &str) -> Result<LunPath> {
    let parts: Vec<&str> = input.split(':').collect();
    let [hba_id, wwpn, lun] = parts.as_slice() else {
        return Err(S390Error::invalid_input(
            Code::InvalidLunPath,
            "path",
            input,
        ));
    };

    Ok(LunPath {
        hba_id: validate_hba_id(hba_id)?,
        wwpn: validate_wwpn_or_lun(wwpn)?,
        lun: validate_wwpn_or_lun(lun)?,
    })
}

impl fmt::Display for LunPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.hba_id, self.wwpn, self.lun)
    }
}

impl FromStr for LunPath {
    type Err = S390Error;

    fn from_str(s: &str) -> Result<Self> {
        validate_lun_path(s)
    }
}

macro_rules! serde_as_string {
    ($($t:ty),*) => {
        $(
            impl Serialize for $t {
                fn serialize<S: Serializer>(
                    &self,
                    serializer: S,
                ) -> std::result::Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $t {
                fn deserialize<D: Deserializer<'de>>(
                    deserializer: D,
                ) -> std::result::Result<Self, D::Error> {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                }
            }
        )*
    };
}

serde_as_string!(DeviceId, FcId, LunPath);
