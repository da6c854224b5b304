use clap::{Args, Parser, Subcommand};

use s390dev::constants::ENV_S390DEV_ROOT;
use s390dev::entity::{validate_lun_path, DeviceClass, LunPath};
use s390dev::errors::{Code, S390Error};

#[derive(Debug, Parser)]
#[clap(
    version,
    about = "Configure s390x storage, network and FC devices with rollback"
)]
pub struct Cli {
    #[command(subcommand)]
    pub commands: Commands,

    /// YAML config file
    #[arg(
        global = true,
        short = 'c',
        long = "config",
        value_parser = validate_filename
    )]
    pub config: Option<String>,

    /// Resolve every OS path (sysfs, /etc, /dev) below this directory
    #[arg(global = true, long = "root", env = ENV_S390DEV_ROOT)]
    pub root: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// DASD-ECKD devices and zFCP adapters
    #[command(subcommand)]
    Storage(CmdStorage),

    /// OSA (qeth) network devices
    #[command(subcommand)]
    Network(CmdNetwork),

    /// Fibre Channel LUNs behind zFCP adapters
    #[command(subcommand)]
    Lun(CmdLun),

    /// Automatic LUN scanning of the zfcp driver
    #[command(subcommand)]
    Lunscan(CmdLunScan),

    /// Channel subsystem ignore list
    #[command(subcommand)]
    Ignore(CmdIgnore),

    /// SCSI tape devices
    #[command(subcommand)]
    Tape(CmdTape),
}

#[derive(Debug, Subcommand)]
pub enum CmdStorage {
    List {
        /// Only list devices of this class (dasd-eckd, zfcp)
        #[arg(short = 't', long = "type", value_parser = parse_device_class)]
        class: Option<DeviceClass>,
    },
    Show(ArgsDevice),
    /// Bring a device online and persist it for the next boot
    Online(ArgsDevice),
    /// Bring a device offline and drop it from the boot config
    Offline(ArgsDevice),
}

#[derive(Debug, Args)]
pub struct ArgsDevice {
    /// Device id, e.g. 0.0.0200 or 0200
    pub device: String,
}

#[derive(Debug, Subcommand)]
pub enum CmdNetwork {
    List {
        /// Only configured devices
        #[arg(long)]
        configured: bool,

        /// Only unconfigured devices
        #[arg(long, conflicts_with = "configured")]
        unconfigured: bool,
    },
    Show(ArgsInterface),
    /// Configure a device and write its ifcfg script
    Configure {
        #[command(flatten)]
        interface: ArgsInterface,

        /// OSA port number
        #[arg(short = 'p', long = "portno")]
        portno: Option<u8>,
    },
    /// Unconfigure a device and remove its ifcfg script
    Unconfigure(ArgsInterface),
    /// Change the OSA port of a configured device
    Update {
        #[command(flatten)]
        interface: ArgsInterface,

        #[arg(short = 'p', long = "portno")]
        portno: u8,
    },
}

#[derive(Debug, Args)]
pub struct ArgsInterface {
    /// Device id or interface name, e.g. 0.0.f500 or enccw0.0.f500
    pub interface: String,
}

#[derive(Debug, Subcommand)]
pub enum CmdLun {
    /// Discover every LUN behind every usable port
    List,
    Show(ArgsLun),
    Add(ArgsLun),
    Remove(ArgsLun),
}

#[derive(Debug, Args)]
pub struct ArgsLun {
    /// <hba>:<wwpn>:<lun>, e.g. 0.0.3c02:0x500507630503c7ae:0x4010400000000000
    #[arg(value_parser = parse_lun_path)]
    pub lun: LunPath,
}

#[derive(Debug, Subcommand)]
pub enum CmdLunScan {
    Status,
    Enable,
    Disable,
    /// Rescan all SCSI hosts
    Trigger,
}

#[derive(Debug, Subcommand)]
pub enum CmdIgnore {
    List,
    Show(ArgsDevice),
    /// Remove devices or ranges (0.0.0120-0.0.0130) from the list
    Remove {
        #[arg(required = true)]
        devices: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CmdTape {
    List,
}

fn validate_filename(name: &str) -> Result<String, S390Error> {
    if name.is_empty() {
        return Err(S390Error::invalid_input(Code::BadConfig, "path", name));
    }

    Ok(name.to_string())
}

fn parse_device_class(s: &str) -> Result<DeviceClass, S390Error> {
    match s.parse()? {
        DeviceClass::Osa => Err(S390Error::invalid_input(Code::InvalidDeviceClass, "type", s)),
        class => Ok(class),
    }
}

fn parse_lun_path(s: &str) -> Result<LunPath, S390Error> {
    validate_lun_path(s)
}
