//! `ifcfg-enccw<id>` network scripts: shell-style `KEY=value` files.
//!
//! Edits keep unknown keys, comments and ordering intact.

use std::fs::{self, OpenOptions, Permissions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::PathBuf;

use tracing::info;

use crate::constants::paths;
use crate::entity::DeviceId;
use crate::errors::{Code, Result, S390Error};
use crate::host::Host;

pub const KEY_OPTIONS: &str = "OPTIONS";

pub fn default_options(portno: u8) -> String {
    format!("layer2=1 portno={portno}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    /// Unquoted value
    Parsed(String),
    /// Could not be unquoted, kept verbatim
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Assign { key: String, value: Value },
    Verbatim(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ifcfg {
    entries: Vec<Entry>,
}

impl Ifcfg {
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    return Entry::Verbatim(line.to_string());
                }

                let Some((key, raw)) = trimmed.split_once('=') else {
                    return Entry::Verbatim(line.to_string());
                };

                let value = match shlex::split(raw) {
                    Some(words) => Value::Parsed(words.join(" ")),
                    None => Value::Raw(raw.to_string()),
                };

                Entry::Assign {
                    key: key.trim().to_string(),
                    value,
                }
            })
            .collect();

        Self { entries }
    }

    fn find(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Assign { key: k, value } if k == key => Some(value),
            _ => None,
        })
    }

    /// Unquoted value of `key`, `None` if absent or unparsable
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.find(key) {
            Some(Value::Parsed(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let new = Value::Parsed(value.to_string());

        for entry in self.entries.iter_mut() {
            if let Entry::Assign { key: k, value } = entry {
                if k == key {
                    *value = new;
                    return;
                }
            }
        }

        self.entries.push(Entry::Assign {
            key: key.to_string(),
            value: new,
        });
    }

    /// Sets `portno=` inside OPTIONS, keeping the other tokens
    pub fn set_portno(&mut self, portno: u8) {
        let options = match self.find(KEY_OPTIONS) {
            Some(Value::Parsed(current)) => options_with_portno(current, portno),
            Some(Value::Raw(_)) | None => default_options(portno),
        };

        self.set(KEY_OPTIONS, &options);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Verbatim(line) => out.push_str(line),
                Entry::Assign { key, value } => {
                    out.push_str(key);
                    out.push('=');
                    match value {
                        Value::Parsed(v) => out.push_str(&quote(v)),
                        Value::Raw(v) => out.push_str(v),
                    }
                }
            }
            out.push('\n');
        }

        out
    }
}

/// Replaces the `portno=` token of an OPTIONS string, appending one when
/// missing. An empty string gets the default options.
pub fn options_with_portno(options: &str, portno: u8) -> String {
    if options.trim().is_empty() {
        return default_options(portno);
    }

    let token = format!("portno={portno}");
    let mut found = false;
    let mut tokens: Vec<String> = options
        .split_whitespace()
        .map(|t| match t.starts_with("portno=") {
            true => {
                found = true;
                token.clone()
            }
            false => t.to_string(),
        })
        .collect();

    if !found {
        tokens.push(token);
    }

    tokens.join(" ")
}

fn quote(value: &str) -> String {
    let plain = |c: char| c.is_ascii_alphanumeric() || "._,/:=@+_-".contains(c);
    if value.chars().all(plain) {
        return value.to_string();
    }

    let mut quoted = String::from('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');

    quoted
}

pub fn path(host: &Host, device: &DeviceId) -> PathBuf {
    host.path(&format!("{}/ifcfg-{}", paths::IFCFG_DIR, device.interface()))
}

pub fn exists(host: &Host, device: &DeviceId) -> bool {
    crate::utils::fs::file_exists(path(host, device))
}

fn persistence_error(code: Code, path: PathBuf, error: io::Error) -> S390Error {
    S390Error::PersistenceFailed {
        code,
        path: path.display().to_string(),
        error,
    }
}

/// Creates an empty script readable by everyone
pub fn create(host: &Host, device: &DeviceId) -> Result<()> {
    let path = path(host, device);
    info!("creating {}", path.display());

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .mode(0o644)
        .open(&path)
        .and_then(|_| fs::set_permissions(&path, Permissions::from_mode(0o644)))
        .map_err(|err| persistence_error(Code::CreateIfcfgFailed, path, err))
}

pub fn load(host: &Host, device: &DeviceId) -> Result<Ifcfg> {
    let path = path(host, device);
    fs::read_to_string(&path)
        .map(|text| Ifcfg::parse(&text))
        .map_err(|err| persistence_error(Code::WriteIfcfgFailed, path, err))
}

pub fn save(host: &Host, device: &DeviceId, ifcfg: &Ifcfg) -> Result<()> {
    let path = path(host, device);
    fs::write(&path, ifcfg.render())
        .map_err(|err| persistence_error(Code::WriteIfcfgFailed, path, err))
}

/// Removing a missing script succeeds
pub fn remove(host: &Host, device: &DeviceId) -> Result<()> {
    let path = path(host, device);
    info!("removing {}", path.display());

    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(persistence_error(Code::RemoveIfcfgFailed, path, err)),
    }
}
