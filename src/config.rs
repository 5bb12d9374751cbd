use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::client::ClientConfig;
use crate::util::strip_quotes;

pub(crate) const DEFAULT_CATALOG_URL: &str = "https://api.census.gov/data.json";

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
}

impl RcConfig {
    fn set(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        match field {
            "url" => self.url = Some(value.to_string()),
            "key" => self.key = Some(value.to_string()),
            "verify" => self.verify = Some(value != "0" && !value.eq_ignore_ascii_case("false")),
            _ => {}
        }
    }
}

/// Resolves configuration from explicit arguments, then `CENSUSAPI_URL` /
/// `CENSUSAPI_KEY`, then the first `.censusapirc` found.
pub(crate) fn load_config(
    url: Option<String>,
    key: Option<String>,
    verify: Option<bool>,
) -> Result<ClientConfig> {
    let url = url.or_else(|| env_value("CENSUSAPI_URL"));
    let key = key.or_else(|| env_value("CENSUSAPI_KEY"));
    resolve(url, key, verify, &rc_candidates())
}

fn resolve(
    mut url: Option<String>,
    mut key: Option<String>,
    verify: Option<bool>,
    candidates: &[PathBuf],
) -> Result<ClientConfig> {
    let mut file_verify = None;

    if url.is_none() || key.is_none() || verify.is_none() {
        if let Some(rc_path) = candidates.iter().find(|p| p.exists()) {
            let cfg = read_rc(rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;
            tracing::debug!("loaded configuration from {}", rc_path.display());
            url = url.or(cfg.url);
            key = key.or(cfg.key);
            file_verify = cfg.verify;
        }
    }

    Ok(ClientConfig {
        url: url.unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
        key: key.filter(|k| !k.trim().is_empty()),
        verify: verify.or(file_verify).unwrap_or(true),
    })
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_rc(&text))
}

fn parse_rc(text: &str) -> RcConfig {
    let mut cfg = RcConfig::default();
    // `key:` may sit alone with the value on the following line.
    let mut pending: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(field) = pending.take() {
            if !line.contains(':') {
                cfg.set(field, strip_quotes(line));
                continue;
            }
        }

        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let field = field.trim();
        let value = strip_quotes(value);
        if value.is_empty() {
            pending = Some(match field {
                "url" => "url",
                "key" => "key",
                _ => continue,
            });
        } else {
            cfg.set(field, value);
        }
    }

    cfg
}

fn rc_candidates() -> Vec<PathBuf> {
    if let Some(p) = env_value("CENSUSAPI_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".censusapirc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".censusapirc"));
    }
    v
}
