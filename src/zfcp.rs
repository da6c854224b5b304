//! zFCP LUN discovery and management.
//!
//! The kernel exposes attached LUNs as SCSI generic devices under
//! `/sys/class/scsi_generic`, each naming its adapter, port and LUN.
//! A port without any attached LUN shows nothing, so discovery attaches
//! a probe LUN (LUN 0, falling back to the REPORT LUNS well-known LUN),
//! asks it for the port's LUN list with `sg_luns`, and detaches it again.
//!
//! Discovery state is a [`LunMap`] value that every step re-derives
//! from sysfs and passes along. Problems with single ports or devices are
//! collected as [`SoftFailure`]s, only a failing adapter listing aborts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constants::{cmd, paths};
use crate::entity::{
    DeviceId, FcId, LunId, LunInfo, LunPath, LunScan, SoftFailure, Status, Wwpn, LUN0, WLUN,
};
use crate::errors::{Code, Params, Result, S390Error};
use crate::host::Host;
use crate::lunscan;
use crate::parse;
use crate::persist;
use crate::sysfs;

/// LUN → sg device name, `None` for LUNs only reported by a probe
pub type PortLuns = BTreeMap<LunId, Option<String>>;
pub type LunMap = BTreeMap<DeviceId, BTreeMap<Wwpn, PortLuns>>;

const NO_FCP_DEVICES: &str = "No fcp devices found";

fn sg_dir(host: &Host, sg: &str) -> PathBuf {
    host.path(&format!("{}/{sg}", paths::SCSI_GENERIC))
}

/// sg devices backed by Fibre Channel, i.e. those with a `device/wwpn`
pub fn sg_devices(host: &Host) -> Vec<String> {
    let dir = host.path(paths::SCSI_GENERIC);

    let Ok(entries) = fs::read_dir(&dir) else {
        debug!("no sg devices under {}", dir.display());
        return Vec::new();
    };

    let mut devices: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|sg| sg_dir(host, sg).join("device/wwpn").exists())
        .collect();

    devices.sort();
    devices
}

/// LUN path an sg device belongs to
fn sg_lun_path(host: &Host, sg: &str) -> std::result::Result<LunPath, String> {
    let dir = sg_dir(host, sg).join("device");
    let attr = |name: &str| sysfs::read_attr(dir.join(name)).map_err(|err| format!("{name}: {err}"));

    let hba_id = DeviceId::parse(&attr("hba_id")?).map_err(|err| err.to_string())?;
    let wwpn = Wwpn::parse(&attr("wwpn")?).map_err(|err| err.to_string())?;
    let lun = LunId::parse(&attr("fcp_lun")?).map_err(|err| err.to_string())?;

    Ok(LunPath::new(hba_id, wwpn, lun))
}

pub fn find_sg_device(host: &Host, lun: &LunPath) -> Option<String> {
    sg_devices(host)
        .into_iter()
        .find(|sg| sg_lun_path(host, sg).ok().as_ref() == Some(lun))
}

/// LUN ids listed by `sg_luns`, one 16 hex digit id per line
pub fn parse_sg_luns(output: &str) -> Vec<LunId> {
    let Ok(re) = parse::pattern(r"\b([0-9a-fA-F]{16})\b") else {
        return Vec::new();
    };

    re.captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| u64::from_str_radix(m.as_str(), 16).ok())
        .map(FcId)
        .collect()
}

/// Executes:
/// ```shell
/// sg_luns -m ${{ max_len }} /dev/${{ sg }}
/// ```
fn report_luns(host: &Host, sg: &str) -> std::result::Result<Vec<LunId>, String> {
    let max_len = host.sg_luns_max_len().to_string();
    let dev = format!("/dev/{sg}");

    match host.run(cmd::SG_LUNS, &["-m", &max_len, &dev]) {
        Ok(output) if output.success() => Ok(parse_sg_luns(&output.stdout)),
        Ok(output) => Err(format!("sg_luns exited with {}: {}", output.rc, output.stderr.trim())),
        Err(err) => Err(err.to_string()),
    }
}

/// Builds the map of attached LUNs from sysfs, extended with the LUNs
/// reported by attached probe LUNs
pub fn lun_map(host: &Host) -> (LunMap, Vec<SoftFailure>) {
    let mut map = LunMap::new();
    let mut failures = Vec::new();

    for sg in sg_devices(host) {
        let path = match sg_lun_path(host, &sg) {
            Ok(path) => path,
            Err(reason) => {
                warn!("skipping {sg}: {reason}");
                failures.push(SoftFailure::new(&sg, reason));
                continue;
            }
        };

        let port = map
            .entry(path.hba_id)
            .or_default()
            .entry(path.wwpn)
            .or_default();

        port.insert(path.lun, Some(sg.clone()));

        if path.lun != LUN0 && path.lun != WLUN {
            continue;
        }

        match report_luns(host, &sg) {
            Ok(luns) => {
                for lun in luns {
                    port.entry(lun).or_insert(None);
                }
            }
            Err(reason) => {
                warn!("cannot list LUNs behind {sg}: {reason}");
                failures.push(SoftFailure::new(&sg, reason));
            }
        }
    }

    (map, failures)
}

fn has_port(map: &LunMap, hba_id: &DeviceId, wwpn: &Wwpn) -> bool {
    map.get(hba_id).is_some_and(|ports| ports.contains_key(wwpn))
}

/// Executes:
/// ```shell
/// lszfcp -D
/// ```
/// No attached units is an empty list, any other failure is an error.
pub fn attached_luns(host: &Host) -> Result<Vec<LunPath>> {
    let output = host.run(cmd::LSZFCP, &["-D"])?;

    if !output.success()
        && (output.stderr.contains(NO_FCP_DEVICES) || output.stdout.contains(NO_FCP_DEVICES))
    {
        return Ok(Vec::new());
    }

    let output = output.ok_or_fail(Code::ListLunsFailed)?;

    // 0.0.3c02/0x500507630503c7ae/0x4010400000000000 0:0:0:1073758224
    let luns = output
        .stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|unit| unit.replace('/', ":").parse::<LunPath>().ok())
        .collect();

    Ok(luns)
}

fn merge(map: &mut LunMap, attached: &[LunPath]) {
    for lun in attached {
        map.entry(lun.hba_id)
            .or_default()
            .entry(lun.wwpn)
            .or_default()
            .entry(lun.lun)
            .or_insert(None);
    }
}

/// Adapters with their remote ports, from the zfcp driver tree
pub fn ports(host: &Host) -> BTreeMap<DeviceId, Vec<Wwpn>> {
    let mut adapters = BTreeMap::new();

    let Ok(entries) = fs::read_dir(host.path(paths::ZFCP_DRIVER)) else {
        return adapters;
    };

    for entry in entries.filter_map(|entry| entry.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        let Ok(hba_id) = DeviceId::parse(&name) else {
            continue;
        };

        if !name.starts_with("0.") || !entry.path().is_dir() {
            continue;
        }

        let mut wwpns: Vec<Wwpn> = fs::read_dir(entry.path())
            .map(|ports| {
                ports
                    .filter_map(|port| port.ok())
                    .filter(|port| port.path().is_dir())
                    .filter_map(|port| Wwpn::parse(&port.file_name().to_string_lossy()).ok())
                    .collect()
            })
            .unwrap_or_default();

        wwpns.sort();
        adapters.insert(hba_id, wwpns);
    }

    adapters
}

/// Ports flagged `access_denied`, `failed` or `in_recovery` are left alone
fn port_usable(port_dir: &Path) -> bool {
    ["access_denied", "failed", "in_recovery"]
        .iter()
        .all(|flag| !sysfs::attr_is_set(port_dir.join(flag)))
}

/// Executes:
/// ```shell
/// /sbin/udevadm settle --exit-if-exists=${{ lun_dir }}
/// ```
fn settle(host: &Host, lun: &LunPath) {
    let arg = format!("--exit-if-exists={}", lun.lun_dir());

    match host.run(cmd::UDEVADM, &["settle", &arg]) {
        Ok(output) if !output.success() => debug!("udevadm settle exited with {}", output.rc),
        Err(err) => debug!("udevadm settle: {err}"),
        _ => {}
    }
}

fn write_port_attr(host: &Host, lun: &LunPath, attr: &str, code: Code) -> Result<()> {
    let path = host.path(&format!("{}/{attr}", lun.port_dir()));
    sysfs::write_attr_or(path, &lun.lun.to_string(), code)
}

/// Attaches `candidate` to the port and waits for the kernel to report the
/// port. A probe that never shows up is detached again.
fn probe(host: &Host, port: &LunPath, candidate: LunId, failures: &mut Vec<SoftFailure>) -> bool {
    let lun = LunPath::new(port.hba_id, port.wwpn, candidate);
    info!("probing {lun}");

    if let Err(err) = write_port_attr(host, &lun, "unit_add", Code::AddLunFailed) {
        warn!("cannot attach probe {lun}: {err}");
        failures.push(SoftFailure::new(lun, err));
        return false;
    }

    for _ in 0..host.settle_retries() {
        settle(host, &lun);
        if has_port(&lun_map(host).0, &lun.hba_id, &lun.wwpn) {
            return true;
        }
    }

    if let Err(err) = write_port_attr(host, &lun, "unit_remove", Code::RemoveLunFailed) {
        warn!("cannot detach probe {lun}: {err}");
        failures.push(SoftFailure::new(lun, err));
    }

    false
}

/// Well-known LUN detached when `lun` itself cannot be. The WLUN
/// backs every LUN except itself, which falls back to LUN 0.
fn fallback_lun(lun: LunId) -> LunId {
    match lun == WLUN {
        true => LUN0,
        false => WLUN,
    }
}

/// Detaches a probe LUN and its sg device. If the probe cannot be
/// detached the alternate well-known LUN is tried instead.
fn retract(host: &Host, map: &LunMap, lun: &LunPath, failures: &mut Vec<SoftFailure>) {
    let sg = map
        .get(&lun.hba_id)
        .and_then(|ports| ports.get(&lun.wwpn))
        .and_then(|luns| luns.get(&lun.lun))
        .cloned()
        .flatten();

    if let Some(sg) = sg {
        info!("removing sg device {sg}");
        let delete = sg_dir(host, &sg).join("device/delete");
        if let Err(err) = sysfs::write_attr_or(delete, "1", Code::RemoveSgDeviceFailed) {
            warn!("cannot remove {sg}: {err}");
            failures.push(SoftFailure::new(&sg, err));
        }
    }

    if write_port_attr(host, lun, "unit_remove", Code::RemoveLunFailed).is_ok() {
        return;
    }

    let other = LunPath::new(lun.hba_id, lun.wwpn, fallback_lun(lun.lun));

    if let Err(err) = write_port_attr(host, &other, "unit_remove", Code::RemoveLunFailed) {
        warn!("cannot detach probe {lun} nor {other}: {err}");
        failures.push(SoftFailure::new(lun, err));
    }
}

/// Every LUN behind every usable port, attached or not
pub fn get_luns(host: &Host) -> Result<LunScan> {
    let attached = attached_luns(host)?;

    let (mut map, mut soft_failures) = lun_map(host);
    merge(&mut map, &attached);

    let mut luns = Vec::new();

    for (hba_id, wwpns) in ports(host) {
        for wwpn in wwpns {
            let port = LunPath::new(hba_id, wwpn, LUN0);
            let port_dir = host.path(&port.port_dir());

            if !port_dir.is_dir() || !port_usable(&port_dir) {
                info!("skipping port {hba_id}:{wwpn}");
                continue;
            }

            let mut probed = None;

            if !has_port(&map, &hba_id, &wwpn) {
                probed = [LUN0, WLUN]
                    .into_iter()
                    .find(|candidate| probe(host, &port, *candidate, &mut soft_failures));

                if probed.is_none() {
                    soft_failures.push(SoftFailure::new(
                        format!("{hba_id}:{wwpn}"),
                        "no probe LUN could be attached",
                    ));
                    continue;
                }

                // Probing made the port's LUNs visible
                let (fresh, _) = lun_map(host);
                map = fresh;
                merge(&mut map, &attached);
            }

            if let Some(port_luns) = map.get(&hba_id).and_then(|ports| ports.get(&wwpn)) {
                luns.extend(port_luns.keys().map(|lun| LunPath::new(hba_id, wwpn, *lun)));
            }

            if let Some(probe_lun) = probed {
                retract(host, &map, &LunPath::new(hba_id, wwpn, probe_lun), &mut soft_failures);
            }
        }
    }

    Ok(LunScan {
        luns,
        soft_failures,
    })
}

fn refuse_when_scanning(host: &Host) -> Result<()> {
    if lunscan::current(host)? {
        return Err(S390Error::InvalidOperation {
            code: Code::LunScanEnabled,
            params: Params::new(),
        });
    }

    Ok(())
}

/// Attaches `lun` and waits for its sysfs entry to appear
fn attach(host: &Host, lun: &LunPath) -> Result<bool> {
    write_port_attr(host, lun, "unit_add", Code::AddLunFailed)?;

    let lun_dir = host.path(&lun.lun_dir());
    for _ in 0..host.settle_retries() {
        settle(host, lun);
        if lun_dir.exists() {
            return Ok(true);
        }
    }

    Ok(lun_dir.exists())
}

fn detach_quietly(host: &Host, lun: &LunPath) {
    if let Err(err) = write_port_attr(host, lun, "unit_remove", Code::RemoveLunFailed) {
        warn!("cannot detach {lun}: {err}");
    }
}

/// Attaches a LUN and records it in zfcp.conf
pub fn add_lun(host: &Host, lun: &LunPath) -> Result<()> {
    refuse_when_scanning(host)?;

    // Someone else may have attached it already
    if host.path(&lun.lun_dir()).exists() {
        info!("{lun} already attached");
        return persist::persist_lun(host, lun);
    }

    info!("adding LUN {lun}");
    if !attach(host, lun)? {
        detach_quietly(host, lun);
        return Err(S390Error::not_found(Code::LunNotFound, "lun", &lun.to_string()));
    }

    persist::persist_lun(host, lun)
}

/// Multipath map holding the block device of `sg`, if any
fn multipath_name(host: &Host, sg: &str) -> Option<String> {
    let first_entry = |dir: PathBuf| -> Option<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names.into_iter().next()
    };

    let block = first_entry(sg_dir(host, sg).join("device/block"))?;
    let holder = first_entry(host.path(&format!("{}/{block}/holders", paths::SYS_BLOCK)))?;
    let name = sysfs::read_attr(host.path(&format!("{}/{holder}/dm/name", paths::SYS_BLOCK))).ok()?;

    (!name.is_empty()).then_some(name)
}

/// Executes:
/// ```shell
/// multipath -f ${{ name }}
/// ```
fn flush_multipath(host: &Host, sg: &str) -> Result<()> {
    let Some(name) = multipath_name(host, sg) else {
        debug!("no multipath map on {sg}");
        return Ok(());
    };

    info!("flushing multipath map {name}");
    host.run(cmd::MULTIPATH, &["-f", &name])?
        .ok_or_fail(Code::MultipathFlushFailed)
        .map(|_| ())
}

/// Detaches a LUN, its sg device and multipath map, and drops it from
/// zfcp.conf
pub fn remove_lun(host: &Host, lun: &LunPath) -> Result<()> {
    refuse_when_scanning(host)?;

    if !host.path(&lun.lun_dir()).exists() {
        info!("{lun} already removed");
        return persist::unpersist_lun(host, lun);
    }

    info!("removing LUN {lun}");

    if let Some(sg) = find_sg_device(host, lun) {
        flush_multipath(host, &sg)?;
        sysfs::write_attr_or(
            sg_dir(host, &sg).join("device/delete"),
            "1",
            Code::RemoveSgDeviceFailed,
        )?;
    }

    write_port_attr(host, lun, "unit_remove", Code::RemoveLunFailed)?;
    persist::unpersist_lun(host, lun)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Inquiry {
    dev_type: Option<String>,
    vendor: Option<String>,
    product: Option<String>,
    serial: Option<String>,
}

fn parse_sg_inq(output: &str) -> Inquiry {
    let field = |label: &str| -> Option<String> {
        let re = parse::pattern(&format!(r"{label}:\s+(\S+)")).ok()?;
        re.captures(output)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };

    Inquiry {
        dev_type: field("Peripheral device type"),
        vendor: field("Vendor identification"),
        product: field("Product identification"),
        serial: field("Unit serial number"),
    }
}

/// Details of a LUN. A LUN that is not attached is attached for the
/// inquiry and detached afterwards.
pub fn get_lun_info(host: &Host, lun: &LunPath) -> Result<LunInfo> {
    let configured = host.path(&lun.lun_dir()).exists();
    let mut temporary = Vec::new();

    if !configured {
        if attach(host, lun)? {
            temporary.push(lun.lun);
        } else {
            detach_quietly(host, lun);

            let wlun = LunPath::new(lun.hba_id, lun.wwpn, WLUN);
            if attach(host, &wlun)? {
                temporary.push(WLUN);
            } else {
                detach_quietly(host, &wlun);
            }
        }
    }

    let sg = find_sg_device(host, lun);

    let mut details = LunInfo {
        hba_id: lun.hba_id,
        remote_wwpn: lun.wwpn,
        lun_id: lun.lun,
        configured,
        sg_dev: None,
        status: Status::Offline,
        dev_type: None,
        vendor: None,
        product: None,
        controller_sn: None,
    };

    if let Some(sg) = &sg {
        let output = host.run(cmd::SG_INQ, &[&format!("/dev/{sg}")])?;

        if output.success() {
            let inquiry = parse_sg_inq(&output.stdout);
            details.status = match output.stdout.trim().is_empty() {
                true => Status::Offline,
                false => Status::Online,
            };
            details.dev_type = inquiry.dev_type;
            details.vendor = inquiry.vendor;
            details.product = inquiry.product;
            details.controller_sn = inquiry.serial;
        } else {
            warn!("sg_inq on {sg} exited with {}", output.rc);
        }
    }

    if !temporary.is_empty() {
        let mut map = LunMap::new();
        if let Some(sg) = &sg {
            map.entry(lun.hba_id)
                .or_default()
                .entry(lun.wwpn)
                .or_default()
                .insert(lun.lun, Some(sg.clone()));
        }

        let mut failures = Vec::new();
        for attached in temporary {
            retract(host, &map, &LunPath::new(lun.hba_id, lun.wwpn, attached), &mut failures);
        }

        for failure in failures {
            warn!("{}: {}", failure.context, failure.reason);
        }
    } else {
        details.sg_dev = sg.clone();
    }

    match sg {
        Some(_) => Ok(details),
        None => Err(S390Error::not_found(Code::LunNotFound, "lun", &lun.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::host::test_utils::{fake_host, mkdir, put, read};
    use crate::utils::shell::test_utils::{fail, joined, ok};
    use crate::utils::shell::CmdOutput;

    const HBA: &str = "0.0.3c02";
    const PORT_A: &str = "0x500507630503c7ae";
    const PORT_B: &str = "0x5005076305ffffff";
    const LUN_1: &str = "0x4010400000000000";
    const LUN_2: &str = "0x4010400100000000";

    const SG_LUNS: &str = "Lun list length = 16 which imples 2 lun entries
Report luns [select_report=0x0]:
    4010400000000000
    4010400100000000
";

    fn port_dir(port: &str) -> String {
        format!("{}/{HBA}/{port}", paths::ZFCP_DRIVER)
    }

    /// Creates the sysfs entries of an attached LUN
    fn attach_sg(root: &Path, sg: &str, port: &str, lun: &str) {
        let dev = format!("{}/{sg}/device", paths::SCSI_GENERIC);
        put(root, &format!("{dev}/hba_id"), HBA);
        put(root, &format!("{dev}/wwpn"), port);
        put(root, &format!("{dev}/fcp_lun"), lun);
        mkdir(root, &format!("{}/{lun}", port_dir(port)));
    }

    /// `udevadm settle` brings up whatever LUN was last written to
    /// `unit_add` of port A, unless it is in `dead`
    fn fake_tools(dead: &'static [&'static str]) -> impl FnOnce(PathBuf) -> Box<dyn Fn(&[String]) -> CmdOutput> {
        move |root: PathBuf| -> Box<dyn Fn(&[String]) -> CmdOutput> {
            Box::new(move |argv: &[String]| match argv[0].as_str() {
                "lszfcp" => fail(1, "Error: No fcp devices found."),
                "sg_luns" => ok(SG_LUNS),
                "/sbin/udevadm" => {
                    let added = read(&root, &format!("{}/unit_add", port_dir(PORT_A)));
                    if !added.is_empty() && !dead.contains(&added.as_str()) {
                        attach_sg(&root, "sg5", PORT_A, &added);
                    }
                    ok("")
                }
                "multipath" => ok(""),
                "sg_inq" => ok("standard INQUIRY:
  PQual=0  Peripheral device type: disk
 Vendor identification: IBM
 Product identification: 2107900
 Unit serial number: 75DXP71
"),
                _ => fail(127, "unexpected command"),
            })
        }
    }

    fn setup(root: &Path) {
        mkdir(root, &port_dir(PORT_A));
        mkdir(root, &port_dir(PORT_B));
        put(root, &format!("{}/access_denied", port_dir(PORT_B)), "1\n");
        put(root, paths::ALLOW_LUN_SCAN, "N\n");
        put(root, paths::ZFCP_CONF, "");
    }

    fn lun(l: &str) -> LunPath {
        format!("{HBA}:{PORT_A}:{l}").parse().unwrap()
    }

    #[test]
    fn test_parse_sg_luns() {
        let luns = parse_sg_luns(SG_LUNS);
        assert_eq!(luns, vec![LunId::parse(LUN_1).unwrap(), LunId::parse(LUN_2).unwrap()]);
        assert!(parse_sg_luns("no luns").is_empty());
    }

    #[test]
    fn test_lun_map_reports_soft_failures() {
        let (dir, host, calls) = fake_host(fake_tools(&[]));
        attach_sg(dir.path(), "sg0", PORT_A, "0x0000000000000000");
        put(dir.path(), "/sys/class/scsi_generic/sg1/device/wwpn", PORT_B);
        mkdir(dir.path(), "/sys/class/scsi_generic/sg2");

        let (map, failures) = lun_map(&host);
        let port = &map[&DeviceId::parse(HBA).unwrap()][&Wwpn::parse(PORT_A).unwrap()];

        assert_eq!(port.len(), 3);
        assert_eq!(port[&LUN0], Some("sg0".to_string()));
        assert_eq!(port[&LunId::parse(LUN_2).unwrap()], None);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].context, "sg1");
        assert_eq!(joined(&calls), vec!["sg_luns -m 32768 /dev/sg0"]);
    }

    #[test]
    fn test_get_luns_probes_and_retracts() {
        let (dir, host, _) = fake_host(fake_tools(&[]));
        setup(dir.path());

        let scan = get_luns(&host).unwrap();
        let paths: Vec<String> = scan.luns.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                format!("{HBA}:{PORT_A}:0x0000000000000000"),
                format!("{HBA}:{PORT_A}:{LUN_1}"),
                format!("{HBA}:{PORT_A}:{LUN_2}"),
            ]
        );
        assert!(scan.soft_failures.is_empty());

        // Probe detached again
        assert_eq!(read(dir.path(), "/sys/class/scsi_generic/sg5/device/delete"), "1");
        assert_eq!(
            read(dir.path(), &format!("{}/unit_remove", port_dir(PORT_A))),
            "0x0000000000000000"
        );
        // Port B was never touched
        assert!(read(dir.path(), &format!("{}/unit_add", port_dir(PORT_B))).is_empty());
    }

    #[test]
    fn test_get_luns_falls_back_to_wlun() {
        let (dir, host, calls) = fake_host(fake_tools(&["0x0000000000000000"]));
        setup(dir.path());

        let scan = get_luns(&host).unwrap();
        assert_eq!(scan.luns.len(), 3);
        assert!(scan.luns.contains(&lun("0xc101000000000000")));

        let settles = joined(&calls)
            .iter()
            .filter(|c| c.starts_with("/sbin/udevadm"))
            .count();
        // Four tries for LUN 0, one for the WLUN
        assert_eq!(settles, 5);
    }

    #[test]
    fn test_fallback_lun() {
        let tests = HashMap::from([
            (LUN0, WLUN),
            (WLUN, LUN0),
            (LunId::parse(LUN_1).unwrap(), WLUN),
            (LunId::parse(LUN_2).unwrap(), WLUN),
        ]);

        for (lun, expected) in tests {
            assert_eq!(fallback_lun(lun), expected, "lun {lun}");
        }
    }

    #[test]
    fn test_get_luns_skips_dead_ports() {
        let (dir, host, _) = fake_host(fake_tools(&["0x0000000000000000", "0xc101000000000000"]));
        setup(dir.path());

        let scan = get_luns(&host).unwrap();
        assert!(scan.luns.is_empty());
        assert_eq!(scan.soft_failures.len(), 1);
        assert_eq!(scan.soft_failures[0].context, format!("{HBA}:{PORT_A}"));
    }

    #[test]
    fn test_get_luns_adapter_failure_is_fatal() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| fail(2, "lszfcp: sysfs not mounted"));
        setup(dir.path());

        let err = get_luns(&host).unwrap_err();
        assert_eq!(err.code(), Code::ListLunsFailed);
    }

    #[test]
    fn test_attached_luns() {
        let (_dir, host, _) = fake_host(|_| {
            |_: &[String]| {
                ok("0.0.3c02/0x500507630503c7ae/0x4010400000000000 0:0:0:1073758224
0.0.3c02/0x500507630503c7ae/0x4010400100000000 0:0:0:1073823760
")
            }
        });

        let luns = attached_luns(&host).unwrap();
        assert_eq!(luns, vec![lun(LUN_1), lun(LUN_2)]);
    }

    #[test]
    fn test_add_lun() {
        let (dir, host, _) = fake_host(fake_tools(&[]));
        setup(dir.path());

        add_lun(&host, &lun(LUN_1)).unwrap();
        assert_eq!(
            read(dir.path(), paths::ZFCP_CONF),
            format!("{HBA} {PORT_A} {LUN_1}\n")
        );

        // Already attached, persisted once
        add_lun(&host, &lun(LUN_1)).unwrap();
        assert_eq!(read(dir.path(), paths::ZFCP_CONF).lines().count(), 1);
    }

    #[test]
    fn test_add_lun_not_found() {
        let (dir, host, _) = fake_host(fake_tools(&[LUN_2]));
        setup(dir.path());

        let err = add_lun(&host, &lun(LUN_2)).unwrap_err();
        assert_eq!(err.code(), Code::LunNotFound);
        assert_eq!(read(dir.path(), &format!("{}/unit_remove", port_dir(PORT_A))), LUN_2);
        assert!(read(dir.path(), paths::ZFCP_CONF).is_empty());
    }

    #[test]
    fn test_manual_changes_refused_while_scanning() {
        let (dir, host, calls) = fake_host(fake_tools(&[]));
        setup(dir.path());
        put(dir.path(), paths::ALLOW_LUN_SCAN, "Y\n");

        assert_eq!(add_lun(&host, &lun(LUN_1)).unwrap_err().code(), Code::LunScanEnabled);
        assert_eq!(remove_lun(&host, &lun(LUN_1)).unwrap_err().code(), Code::LunScanEnabled);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_remove_lun_flushes_multipath() {
        let (dir, host, calls) = fake_host(fake_tools(&[]));
        setup(dir.path());
        attach_sg(dir.path(), "sg3", PORT_A, LUN_1);
        mkdir(dir.path(), "/sys/class/scsi_generic/sg3/device/block/sdc");
        mkdir(dir.path(), "/sys/block/sdc/holders/dm-0");
        put(dir.path(), "/sys/block/dm-0/dm/name", "mpatha\n");
        put(dir.path(), paths::ZFCP_CONF, &format!("{HBA} {PORT_A} {LUN_1}\n"));

        remove_lun(&host, &lun(LUN_1)).unwrap();

        assert_eq!(joined(&calls), vec!["multipath -f mpatha"]);
        assert_eq!(read(dir.path(), "/sys/class/scsi_generic/sg3/device/delete"), "1");
        assert_eq!(read(dir.path(), &format!("{}/unit_remove", port_dir(PORT_A))), LUN_1);
        assert!(read(dir.path(), paths::ZFCP_CONF).is_empty());
    }

    #[test]
    fn test_remove_lun_without_multipath() {
        let (dir, host, calls) = fake_host(fake_tools(&[]));
        setup(dir.path());
        attach_sg(dir.path(), "sg3", PORT_A, LUN_1);

        remove_lun(&host, &lun(LUN_1)).unwrap();
        assert!(calls.borrow().is_empty());

        // Nothing left to remove
        std::fs::remove_dir(dir.path().join(port_dir(PORT_A).trim_start_matches('/')).join(LUN_1))
            .unwrap();
        remove_lun(&host, &lun(LUN_1)).unwrap();
    }

    #[test]
    fn test_get_lun_info_configured() {
        let (dir, host, calls) = fake_host(fake_tools(&[]));
        setup(dir.path());
        attach_sg(dir.path(), "sg3", PORT_A, LUN_1);

        let info = get_lun_info(&host, &lun(LUN_1)).unwrap();
        assert!(info.configured);
        assert_eq!(info.sg_dev.as_deref(), Some("sg3"));
        assert_eq!(info.status, Status::Online);
        assert_eq!(info.dev_type.as_deref(), Some("disk"));
        assert_eq!(info.vendor.as_deref(), Some("IBM"));
        assert_eq!(info.product.as_deref(), Some("2107900"));
        assert_eq!(info.controller_sn.as_deref(), Some("75DXP71"));
        assert_eq!(joined(&calls), vec!["sg_inq /dev/sg3"]);
    }

    #[test]
    fn test_get_lun_info_attaches_temporarily() {
        let (dir, host, _) = fake_host(fake_tools(&[]));
        setup(dir.path());

        let info = get_lun_info(&host, &lun(LUN_2)).unwrap();
        assert!(!info.configured);
        assert_eq!(info.sg_dev, None);
        assert_eq!(info.vendor.as_deref(), Some("IBM"));

        assert_eq!(read(dir.path(), "/sys/class/scsi_generic/sg5/device/delete"), "1");
        assert_eq!(read(dir.path(), &format!("{}/unit_remove", port_dir(PORT_A))), LUN_2);
    }

    #[test]
    fn test_parse_sg_inq_fields_are_independent() {
        let inquiry = parse_sg_inq(" Vendor identification: IBM\n");
        assert_eq!(inquiry.vendor.as_deref(), Some("IBM"));
        assert_eq!(inquiry.product, None);
        assert_eq!(parse_sg_inq(""), Inquiry::default());
    }
}
