//! OSA (qeth) network devices managed through `znetconf`

use tracing::{info, warn};

use crate::constants::{cmd, paths};
use crate::entity::{Action, DeviceId, NetworkDevice};
use crate::errors::{Code, Params, Result, S390Error};
use crate::host::Host;
use crate::ifcfg;
use crate::parse::{self, Layout};
use crate::sysfs;
use crate::task::{self, Reporter};
use crate::transition::Transition;

const IDS: &str = r"(\d\.\d\.[0-9a-fA-F]{4},\d\.\d\.[0-9a-fA-F]{4},\d\.\d\.[0-9a-fA-F]{4})";

const CONFIGURED_HEADER: &str =
    r"(Device IDs)\s+(Type)\s+(Card Type)\s+(CHPID)\s+(Drv)\.\s+(Name)\s+(State)\s*$";
const UNCONFIGURED_HEADER: &str = r"(Device IDs)\s+(Type)\s+(Card Type)\s+(CHPID)\s+(Drv)\.\s*$";

fn configured_layout() -> Result<Layout> {
    let value = format!(
        r"{IDS}\s+(\w+/\w+)\s+(\w+)\s+([0-9a-fA-F]{{2}})\s+(qeth)\s+(\w+\d\.\d\.[0-9a-fA-F]{{4}})\s+(\w+)\s*$"
    );
    Layout::new(CONFIGURED_HEADER, &value)
}

fn unconfigured_layout() -> Result<Layout> {
    let value = format!(r"{IDS}\s+(\w+/\w+)\s+(OSA\s+\(\w+\))\s+([0-9a-fA-F]{{2}})\s+(qeth)\s*$");

    // znetconf -u prints a scanning banner above the header
    Ok(Layout::new(UNCONFIGURED_HEADER, &value)?.at(1, 3))
}

pub const PORTNOS: [u8; 2] = [0, 1];

pub fn validate_portno(portno: u8) -> Result<u8> {
    match PORTNOS.contains(&portno) {
        true => Ok(portno),
        false => Err(S390Error::invalid_input(
            Code::InvalidPortNo,
            "portno",
            &portno.to_string(),
        )),
    }
}

fn portno_path(host: &Host, device: &DeviceId) -> std::path::PathBuf {
    host.path(&format!("{}/{device}/portno", paths::QETH_DRIVER))
}

/// Port number currently programmed on the card, if readable
pub fn read_portno(host: &Host, device: &DeviceId) -> Option<u8> {
    sysfs::read_attr(portno_path(host, device))
        .ok()
        .and_then(|value| value.parse().ok())
}

fn znetconf_rows(host: &Host, flag: &str, layout: &Layout) -> Result<Vec<NetworkDevice>> {
    let output = host
        .run(cmd::ZNETCONF, &[flag])?
        .ok_or_fail(Code::ListNetworkFailed)?;

    parse::get_rows_info(&output.stdout, layout)?
        .iter()
        .map(NetworkDevice::from_znetconf)
        .collect()
}

pub fn configured_devices(host: &Host) -> Result<Vec<NetworkDevice>> {
    let mut devices = znetconf_rows(host, "-c", &configured_layout()?)?;

    for device in devices.iter_mut() {
        device.osa_portno = device.id().and_then(|id| read_portno(host, id));
    }

    Ok(devices)
}

pub fn unconfigured_devices(host: &Host) -> Result<Vec<NetworkDevice>> {
    znetconf_rows(host, "-u", &unconfigured_layout()?)
}

/// `configured`: `Some(true)` lists only configured devices,
/// `Some(false)` only unconfigured ones, `None` both.
pub fn list(host: &Host, configured: Option<bool>) -> Result<Vec<NetworkDevice>> {
    match configured {
        Some(true) => configured_devices(host),
        Some(false) => unconfigured_devices(host),
        None => {
            let mut devices = configured_devices(host)?;
            devices.extend(unconfigured_devices(host)?);
            Ok(devices)
        }
    }
}

fn find(devices: Vec<NetworkDevice>, id: &DeviceId) -> Option<NetworkDevice> {
    devices.into_iter().find(|dev| dev.id() == Some(id))
}

/// Looks a device up by id or by its `enccw` interface name
pub fn lookup(host: &Host, interface: &str) -> Result<NetworkDevice> {
    let id = DeviceId::parse(interface)?;

    if let Some(device) = find(configured_devices(host)?, &id) {
        return Ok(device);
    }

    find(unconfigured_devices(host)?, &id)
        .ok_or_else(|| S390Error::not_found(Code::DeviceNotFound, "device", &id.to_string()))
}

/// Executes:
/// ```shell
/// znetconf -a ${{ device }} [-o portno=${{ portno }}]
/// ```
pub fn bring_online(host: &Host, device: &DeviceId, portno: Option<u8>) -> Result<()> {
    info!("configuring network device {device}");

    let id = device.to_string();
    let option = portno.map(|p| format!("portno={p}"));

    let mut args = vec!["-a", id.as_str()];
    if let Some(option) = option.as_deref() {
        args.extend(["-o", option]);
    }

    host.run(cmd::ZNETCONF, &args)?
        .ok_or_fail(Code::NetworkConfigureFailed)
        .map(|_| ())
}

/// Executes:
/// ```shell
/// znetconf -r ${{ device }} -n
/// ```
pub fn bring_offline(host: &Host, device: &DeviceId) -> Result<()> {
    info!("removing network device {device}");

    host.run(cmd::ZNETCONF, &["-r", &device.to_string(), "-n"])?
        .ok_or_fail(Code::NetworkUnconfigureFailed)
        .map(|_| ())
}

/// Writes the keys a network script needs for `device` to come up at boot
pub fn write_ifcfg(host: &Host, device: &DeviceId, portno: Option<u8>) -> Result<()> {
    let current = find(configured_devices(host)?, device).ok_or_else(|| {
        S390Error::not_found(Code::DeviceNotFound, "device", &device.to_string())
    })?;

    let subchannels: Vec<String> = current.device_ids.iter().map(|id| id.to_string()).collect();

    let mut script = ifcfg::load(host, device)?;
    script.set("DEVICE", &current.name);
    script.set("ONBOOT", "yes");
    script.set("SUBCHANNELS", &subchannels.join(","));
    script.set("NETTYPE", "qeth");

    if let Some(portno) = portno.or_else(|| read_portno(host, device)) {
        script.set_portno(portno);
    }

    info!("writing {}", ifcfg::path(host, device).display());
    ifcfg::save(host, device, &script)
}

/// Programs a new port number. The card has to be offline for the
/// write and is always set back online afterwards.
pub fn reprogram_portno(host: &Host, device: &DeviceId, portno: u8) -> Result<()> {
    let online = host.path(&format!("{}/{device}/online", paths::CCWGROUP_DEVICES));
    info!("setting portno {portno} on {device}");

    let result = sysfs::write_attr_or(&online, "0", Code::PortNoUpdateFailed).and_then(|_| {
        sysfs::write_attr_or(
            portno_path(host, device),
            &portno.to_string(),
            Code::PortNoUpdateFailed,
        )
    });

    let restored = sysfs::write_attr_or(&online, "1", Code::PortNoUpdateFailed);
    if let Err(err) = &restored {
        warn!("failed to set {device} back online: {err}");
    }

    result.and(restored)
}

/// Brings the device online and writes its network script
pub fn configure(host: &Host, interface: &str, portno: Option<u8>) -> Result<Vec<Action>> {
    let device = DeviceId::parse(interface)?;
    let portno = portno.map(validate_portno).transpose()?;

    let mut tx = Transition::new(host);

    if !sysfs::is_group_online(host, &device) {
        tx.apply(Action::ConfigureNetwork { device, portno })?;
        tx.on_rollback(Action::RemoveNetwork { device });
    } else if let Some(portno) = portno {
        match read_portno(host, &device) {
            Some(current) if current != portno => {
                tx.apply(Action::ReprogramPortNo { device, portno })?;
                tx.on_rollback(Action::ReprogramPortNo {
                    device,
                    portno: current,
                });
            }
            _ => {}
        }
    }

    if !ifcfg::exists(host, &device) {
        tx.apply(Action::CreateIfcfg { device })?;
        tx.on_rollback(Action::RemoveIfcfg { device });
    }

    tx.apply(Action::WriteIfcfg { device, portno })?;

    Ok(tx.commit())
}

/// Takes the device offline and removes its network script
pub fn unconfigure(host: &Host, interface: &str) -> Result<Vec<Action>> {
    let device = DeviceId::parse(interface)?;

    let mut tx = Transition::new(host);

    if sysfs::is_group_online(host, &device) {
        let portno = read_portno(host, &device);
        tx.apply(Action::RemoveNetwork { device })?;
        tx.on_rollback(Action::ConfigureNetwork { device, portno });
    }

    if ifcfg::exists(host, &device) {
        tx.apply(Action::RemoveIfcfg { device })?;
    }

    Ok(tx.commit())
}

/// [`configure`] as a reported task
pub fn configure_task(
    host: &Host,
    interface: &str,
    portno: Option<u8>,
    reporter: &mut dyn Reporter,
) -> Result<Vec<Action>> {
    let done = format!("configured network device {interface}");
    task::run_task(reporter, &done, || configure(host, interface, portno))
}

/// [`unconfigure`] as a reported task
pub fn unconfigure_task(
    host: &Host,
    interface: &str,
    reporter: &mut dyn Reporter,
) -> Result<Vec<Action>> {
    let done = format!("unconfigured network device {interface}");
    task::run_task(reporter, &done, || unconfigure(host, interface))
}

/// Changes the OSA port of a configured device
pub fn update(host: &Host, interface: &str, portno: u8) -> Result<Vec<Action>> {
    let device = DeviceId::parse(interface)?;
    let portno = validate_portno(portno)?;

    if !sysfs::is_group_online(host, &device) {
        return Err(S390Error::InvalidOperation {
            code: Code::DeviceNotConfigured,
            params: Params::from([("device", device.to_string())]),
        });
    }

    let mut tx = Transition::new(host);

    match read_portno(host, &device) {
        Some(current) if current == portno => {
            info!("{device} already uses portno {portno}");
        }
        current => {
            tx.apply(Action::ReprogramPortNo { device, portno })?;
            if let Some(current) = current {
                tx.on_rollback(Action::ReprogramPortNo {
                    device,
                    portno: current,
                });
            }
        }
    }

    if !ifcfg::exists(host, &device) {
        tx.apply(Action::CreateIfcfg { device })?;
        tx.on_rollback(Action::RemoveIfcfg { device });
    }

    tx.apply(Action::WriteIfcfg {
        device,
        portno: Some(portno),
    })?;

    Ok(tx.commit())
}
