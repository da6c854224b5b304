use tracing::{error, info};

use crate::constants::paths;
use crate::entity::{DeviceId, LunPath, LUN0};
use crate::errors::{Code, Result, S390Error};
use crate::host::Host;
use crate::utils::fs;

/// Boot-time device lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfFile {
    /// `/etc/dasd.conf`: one device id per line
    Dasd,
    /// `/etc/zfcp.conf`: `<adapter> <wwpn> <lun>` per line
    Zfcp,
}

impl ConfFile {
    pub fn path(&self) -> &'static str {
        match self {
            ConfFile::Dasd => paths::DASD_CONF,
            ConfFile::Zfcp => paths::ZFCP_CONF,
        }
    }

    fn persist_code(&self) -> Code {
        match self {
            ConfFile::Dasd => Code::PersistDasdFailed,
            ConfFile::Zfcp => Code::PersistZfcpFailed,
        }
    }

    fn unpersist_code(&self) -> Code {
        match self {
            ConfFile::Dasd => Code::UnpersistDasdFailed,
            ConfFile::Zfcp => Code::UnpersistZfcpFailed,
        }
    }

    fn line(&self, device: &DeviceId) -> String {
        match self {
            ConfFile::Dasd => device.to_string(),
            // An adapter entry without port or LUN
            ConfFile::Zfcp => format!("{device} {LUN0} {LUN0}"),
        }
    }
}

pub fn is_persisted(host: &Host, device: &DeviceId, conf: ConfFile) -> bool {
    fs::contains_ci(host.path(conf.path()), &device.to_string())
}

pub fn persist(host: &Host, device: &DeviceId, conf: ConfFile) -> Result<()> {
    let path = host.path(conf.path());
    info!("persisting {device} to {}", conf.path());

    fs::append_line_locked(&path, &conf.line(device), host.lock_wait()).map_err(|err| {
        error!("failed to persist {device} to {}: {err}", conf.path());
        S390Error::PersistenceFailed {
            code: conf.persist_code(),
            path: conf.path().to_string(),
            error: err,
        }
    })
}

/// Drops every line mentioning `device`, case-insensitively
pub fn unpersist(host: &Host, device: &DeviceId, conf: ConfFile) -> Result<()> {
    let path = host.path(conf.path());
    let needle = device.to_string();
    info!("removing {device} from {}", conf.path());

    fs::remove_lines_locked(
        &path,
        |line| line.to_lowercase().contains(&needle),
        host.lock_wait(),
    )
    .map(|_| ())
    .map_err(|err| {
        error!("failed to remove {device} from {}: {err}", conf.path());
        S390Error::PersistenceFailed {
            code: conf.unpersist_code(),
            path: conf.path().to_string(),
            error: err,
        }
    })
}

fn is_lun_line(line: &str, lun: &LunPath) -> bool {
    let fields: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
    fields == [lun.hba_id.to_string(), lun.wwpn.to_string(), lun.lun.to_string()]
}

pub fn is_lun_persisted(host: &Host, lun: &LunPath) -> bool {
    match std::fs::read_to_string(host.path(paths::ZFCP_CONF)) {
        Ok(content) => content.lines().any(|line| is_lun_line(line, lun)),
        Err(_) => false,
    }
}

pub fn persist_lun(host: &Host, lun: &LunPath) -> Result<()> {
    if is_lun_persisted(host, lun) {
        return Ok(());
    }

    info!("persisting LUN {lun} to {}", paths::ZFCP_CONF);
    fs::append_line_locked(host.path(paths::ZFCP_CONF), &lun.conf_line(), host.lock_wait())
        .map_err(|err| S390Error::PersistenceFailed {
            code: Code::PersistZfcpFailed,
            path: paths::ZFCP_CONF.to_string(),
            error: err,
        })
}

pub fn unpersist_lun(host: &Host, lun: &LunPath) -> Result<()> {
    info!("removing LUN {lun} from {}", paths::ZFCP_CONF);

    match fs::remove_lines_locked(
        host.path(paths::ZFCP_CONF),
        |line| is_lun_line(line, lun),
        host.lock_wait(),
    ) {
        Ok(_) => Ok(()),
        // Nothing to remove from
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(S390Error::PersistenceFailed {
            code: Code::UnpersistZfcpFailed,
            path: paths::ZFCP_CONF.to_string(),
            error: err,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_utils::{fake_host, put, read};
    use crate::utils::shell::test_utils::ok;

    #[test]
    fn test_persist_dasd() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        put(dir.path(), paths::DASD_CONF, "0.0.0100\n");

        let dev = DeviceId::parse("0.0.0200").unwrap();
        assert!(!is_persisted(&host, &dev, ConfFile::Dasd));

        persist(&host, &dev, ConfFile::Dasd).unwrap();
        assert!(is_persisted(&host, &dev, ConfFile::Dasd));
        assert_eq!(read(dir.path(), paths::DASD_CONF), "0.0.0100\n0.0.0200\n");

        unpersist(&host, &dev, ConfFile::Dasd).unwrap();
        assert!(!is_persisted(&host, &dev, ConfFile::Dasd));
        assert_eq!(read(dir.path(), paths::DASD_CONF), "0.0.0100\n");
    }

    #[test]
    fn test_unpersist_is_case_insensitive() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        put(dir.path(), paths::DASD_CONF, "0.0.ABCD use_diag=0\n0.0.0100\n");

        let dev = DeviceId::parse("abcd").unwrap();
        assert!(is_persisted(&host, &dev, ConfFile::Dasd));
        unpersist(&host, &dev, ConfFile::Dasd).unwrap();
        assert_eq!(read(dir.path(), paths::DASD_CONF), "0.0.0100\n");
    }

    #[test]
    fn test_persist_errors_are_distinct() {
        let (_dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        let dev = DeviceId::parse("0.0.0200").unwrap();

        // Neither file exists
        let codes = [
            persist(&host, &dev, ConfFile::Dasd).unwrap_err().code(),
            unpersist(&host, &dev, ConfFile::Dasd).unwrap_err().code(),
            persist(&host, &dev, ConfFile::Zfcp).unwrap_err().code(),
            unpersist(&host, &dev, ConfFile::Zfcp).unwrap_err().code(),
        ];

        assert_eq!(
            codes,
            [
                Code::PersistDasdFailed,
                Code::UnpersistDasdFailed,
                Code::PersistZfcpFailed,
                Code::UnpersistZfcpFailed,
            ]
        );
    }

    #[test]
    fn test_persist_zfcp_adapter_line() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        put(dir.path(), paths::ZFCP_CONF, "");

        let dev = DeviceId::parse("0.0.3c02").unwrap();
        persist(&host, &dev, ConfFile::Zfcp).unwrap();
        assert_eq!(
            read(dir.path(), paths::ZFCP_CONF),
            "0.0.3c02 0x0000000000000000 0x0000000000000000\n"
        );
    }

    #[test]
    fn test_persist_lun() {
        let (dir, host, _) = fake_host(|_| |_: &[String]| ok(""));
        put(dir.path(), paths::ZFCP_CONF, "0.0.3c02 0x500507630503c7ae 0x4010400100000000\n");

        let lun: LunPath = "0.0.3c02:0x500507630503c7ae:0x4010400000000000".parse().unwrap();
        persist_lun(&host, &lun).unwrap();
        persist_lun(&host, &lun).unwrap();
        assert!(is_lun_persisted(&host, &lun));
        assert_eq!(read(dir.path(), paths::ZFCP_CONF).lines().count(), 2);

        unpersist_lun(&host, &lun).unwrap();
        assert!(!is_lun_persisted(&host, &lun));
        assert_eq!(
            read(dir.path(), paths::ZFCP_CONF),
            "0.0.3c02 0x500507630503c7ae 0x4010400100000000\n"
        );
    }
}
