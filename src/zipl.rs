//! `/etc/zipl.conf`: an INI file with `[section]` headers and
//! `key=value` entries. Values may continue on indented lines.
//!
//! Edits replace single entries in place, so comments and the layout
//! of untouched lines survive a write.

use std::collections::BTreeMap;
use std::fs;

use tracing::{info, warn};

use crate::constants::paths;
use crate::errors::{Code, Params, Result, S390Error};
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    value: String,
    /// First line of the entry
    line: usize,
    /// Number of lines, continuations included
    span: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZiplConf {
    lines: Vec<String>,
    sections: BTreeMap<String, BTreeMap<String, Entry>>,
}

fn malformed(line: usize, text: &str) -> S390Error {
    S390Error::ParseFailed {
        code: Code::ZiplConfMalformed,
        params: Params::from([("line", (line + 1).to_string()), ("text", text.to_string())]),
    }
}

impl ZiplConf {
    /// Strict parse. An indented line that does not continue a value, or
    /// an entry outside any section, is rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let lines: Vec<String> = text.lines().map(String::from).collect();
        let mut sections: BTreeMap<String, BTreeMap<String, Entry>> = BTreeMap::new();

        let mut section: Option<String> = None;
        let mut key: Option<String> = None;

        for (n, raw) in lines.iter().enumerate() {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with(char::is_whitespace) {
                let entry = section
                    .as_ref()
                    .zip(key.as_ref())
                    .and_then(|(s, k)| sections.get_mut(s).and_then(|entries| entries.get_mut(k)))
                    .ok_or_else(|| malformed(n, raw))?;

                entry.value.push('\n');
                entry.value.push_str(trimmed);
                entry.span = n - entry.line + 1;
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                sections.entry(name.to_string()).or_default();
                section = Some(name.to_string());
                key = None;
                continue;
            }

            let Some(current) = section.as_ref() else {
                return Err(malformed(n, raw));
            };

            let (k, v) = match trimmed.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                // Flag lines such as `defaultauto`
                None => (trimmed, ""),
            };

            let k = k.to_lowercase();
            sections.entry(current.clone()).or_default().insert(
                k.clone(),
                Entry {
                    value: v.to_string(),
                    line: n,
                    span: 1,
                },
            );
            key = Some(k);
        }

        Ok(Self { lines, sections })
    }

    /// Parses `text`, retrying once with all indentation removed when
    /// the strict parse fails. The flag tells whether that happened.
    pub fn parse_tolerant(text: &str) -> Result<(Self, bool)> {
        match Self::parse(text) {
            Ok(conf) => Ok((conf, false)),
            Err(err) => {
                warn!("zipl.conf does not parse ({err}), removing indentation");
                Self::parse(&normalize(text)).map(|conf| (conf, true))
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .map(|entry| entry.value.as_str())
    }

    /// Replaces an existing entry. Every line of a multi-line value after
    /// the first is written back indented as a continuation.
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        let entry = self
            .sections
            .get(section)
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .ok_or_else(|| boot_param_not_found(&format!("{section}.{key}")))?;

        let range = entry.line..entry.line + entry.span;
        let mut lines = self.lines.clone();
        lines.splice(range, [format!("{key}={}", value.replace('\n', "\n "))]);

        *self = Self::parse(&lines.join("\n"))?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    /// `parameters` of the section `[defaultboot] default=` points at,
    /// together with that section's name
    pub fn default_parameters(&self) -> Result<(String, String)> {
        let section = self
            .get("defaultboot", "default")
            .ok_or_else(|| boot_param_not_found("defaultboot.default"))?;

        let parameters = self
            .get(section, "parameters")
            .ok_or_else(|| boot_param_not_found(&format!("{section}.parameters")))?;

        Ok((section.to_string(), parameters.to_string()))
    }
}

pub fn normalize(text: &str) -> String {
    let mut out: String = text
        .lines()
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

fn boot_param_not_found(param: &str) -> S390Error {
    S390Error::ParseFailed {
        code: Code::BootParamNotFound,
        params: Params::from([("param", param.to_string())]),
    }
}

fn conf_error(error: std::io::Error) -> S390Error {
    S390Error::PersistenceFailed {
        code: Code::ZiplConfFailed,
        path: paths::ZIPL_CONF.to_string(),
        error,
    }
}

/// Reads the host's zipl.conf. A file that only parses without
/// indentation is rewritten in that form.
pub fn load(host: &Host) -> Result<ZiplConf> {
    let path = host.path(paths::ZIPL_CONF);
    let text = fs::read_to_string(&path).map_err(conf_error)?;

    let (conf, normalized) = ZiplConf::parse_tolerant(&text)?;
    if normalized {
        info!("rewriting {} without indentation", paths::ZIPL_CONF);
        fs::write(&path, conf.render()).map_err(conf_error)?;
    }

    Ok(conf)
}

pub fn save(host: &Host, conf: &ZiplConf) -> Result<()> {
    fs::write(host.path(paths::ZIPL_CONF), conf.render()).map_err(conf_error)
}
