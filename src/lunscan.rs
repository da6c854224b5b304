//! Automatic LUN scanning of the zfcp driver, at boot (zipl.conf kernel
//! parameter) and on the running system (module parameter).

use serde::Serialize;
use tracing::info;

use crate::constants::{cmd, paths};
use crate::errors::{Code, Params, Result, S390Error};
use crate::host::Host;
use crate::parse;
use crate::sysfs;
use crate::task::{self, Reporter};
use crate::zipl;

pub const BOOT_PARAM: &str = "zfcp.allow_lun_scan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LunScanStatus {
    pub boot: bool,
    pub current: bool,
}

/// Value of the boot parameter inside a kernel command line
pub fn boot_value(parameters: &str) -> Result<bool> {
    let re = parse::pattern(r"zfcp\.allow_lun_scan=(\d)")?;

    re.captures(parameters)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str() != "0")
        .ok_or_else(|| S390Error::ParseFailed {
            code: Code::BootParamNotFound,
            params: Params::from([("param", BOOT_PARAM.to_string())]),
        })
}

/// Sets the boot parameter in a kernel command line. A missing parameter
/// goes before the closing quote, or at the end of an unquoted line.
pub fn with_boot_value(parameters: &str, enable: bool) -> Result<String> {
    let token = format!("{BOOT_PARAM}={}", u8::from(enable));
    let re = parse::pattern(r"zfcp\.allow_lun_scan=\S")?;

    if re.is_match(parameters) {
        return Ok(re.replace_all(parameters, regex::NoExpand(token.as_str())).to_string());
    }

    let updated = match parameters.strip_suffix('"') {
        Some(inner) if inner.starts_with('"') && inner.len() > 1 => {
            format!("{} {token}\"", inner.trim_end())
        }
        _ if parameters.trim().is_empty() => token,
        _ => format!("{} {token}", parameters.trim_end()),
    };

    Ok(updated)
}

/// Runtime setting, `Y` or `N`
pub fn current(host: &Host) -> Result<bool> {
    let path = host.path(paths::ALLOW_LUN_SCAN);

    sysfs::read_attr(&path)
        .map(|value| value == "Y")
        .map_err(|error| S390Error::SysfsFailed {
            code: Code::LunScanStatusFailed,
            path: paths::ALLOW_LUN_SCAN.to_string(),
            error,
        })
}

pub fn status(host: &Host) -> Result<LunScanStatus> {
    let conf = zipl::load(host)?;
    let (_, parameters) = conf.default_parameters()?;

    Ok(LunScanStatus {
        boot: boot_value(&parameters)?,
        current: current(host)?,
    })
}

/// Enables or disables the scan for the next boot and right away
pub fn enable(host: &Host, enable: bool) -> Result<LunScanStatus> {
    let mut conf = zipl::load(host)?;
    let (section, parameters) = conf.default_parameters()?;

    conf.set(&section, "parameters", &with_boot_value(&parameters, enable)?)?;
    zipl::save(host, &conf)?;

    info!("updating boot loader");
    host.run(cmd::ZIPL, &[])?.ok_or_fail(Code::ZiplFailed)?;

    let value = if enable { "Y" } else { "N" };
    sysfs::write_attr_or(
        host.path(paths::ALLOW_LUN_SCAN),
        value,
        Code::LunScanToggleFailed,
    )?;

    status(host)
}

/// Executes:
/// ```shell
/// /usr/bin/rescan-scsi-bus.sh -a
/// ```
pub fn trigger(host: &Host, reporter: &mut dyn Reporter) -> Result<()> {
    task::run_task(reporter, "LUN scan triggered", || {
        info!("triggering LUN scan");
        host.run(cmd::RESCAN_SCSI_BUS, &["-a"])?
            .ok_or_fail(Code::LunScanTriggerFailed)
            .map(|_| ())
    })
}
