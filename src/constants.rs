pub mod defaults {
    pub const ROOT: &str = "/";
    pub const SETTLE_RETRIES: usize = 4;
    pub const LOCK_WAIT_MS: u64 = 1000;
    pub const SG_LUNS_MAX_LEN: u32 = 32768;
}

pub const ENV_S390DEV_ROOT: &str = "S390DEV_ROOT";

pub mod paths {
    pub const CCW_DEVICES: &str = "/sys/bus/ccw/devices";
    pub const CCW_DRIVERS: &str = "/sys/bus/ccw/drivers";
    pub const CCWGROUP_DEVICES: &str = "/sys/bus/ccwgroup/devices";
    pub const CCWGROUP_DRIVERS: &str = "/sys/bus/ccwgroup/drivers";
    pub const QETH_DRIVER: &str = "/sys/bus/ccwgroup/drivers/qeth";
    pub const ZFCP_DRIVER: &str = "/sys/bus/ccw/drivers/zfcp";
    pub const SCSI_GENERIC: &str = "/sys/class/scsi_generic";
    pub const SYS_BLOCK: &str = "/sys/block";
    pub const ALLOW_LUN_SCAN: &str = "/sys/module/zfcp/parameters/allow_lun_scan";

    pub const DASD_CONF: &str = "/etc/dasd.conf";
    pub const ZFCP_CONF: &str = "/etc/zfcp.conf";
    pub const ZIPL_CONF: &str = "/etc/zipl.conf";
    pub const IFCFG_DIR: &str = "/etc/sysconfig/network-scripts";

    pub const TAPE_BY_ID: &str = "/dev/tape/by-id";
}

pub mod cmd {
    pub const ZNETCONF: &str = "znetconf";
    pub const LSCSS: &str = "lscss";
    pub const CHCCWDEV: &str = "chccwdev";
    pub const CIO_IGNORE: &str = "cio_ignore";
    pub const ZIPL: &str = "zipl";
    pub const LSZFCP: &str = "lszfcp";
    pub const SG_INQ: &str = "sg_inq";
    pub const SG_LUNS: &str = "sg_luns";
    pub const LSTAPE: &str = "lstape";
    pub const MULTIPATH: &str = "multipath";
    pub const UDEVADM: &str = "/sbin/udevadm";
    pub const RESCAN_SCSI_BUS: &str = "/usr/bin/rescan-scsi-bus.sh";
}

pub const ENCCW: &str = "enccw";

// Use programs instead of bindings to avoid API dependencies
pub const REQUIRED_COMMANDS: [&str; 10] = [
    cmd::ZNETCONF,
    cmd::LSCSS,
    cmd::CHCCWDEV,
    cmd::CIO_IGNORE,
    cmd::ZIPL,
    cmd::LSZFCP,
    cmd::SG_INQ,
    cmd::SG_LUNS,
    cmd::LSTAPE,
    cmd::MULTIPATH,
];
