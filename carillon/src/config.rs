use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use carillon_proto::dav::Autocreate;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AutocreatePolicy {
    None,
    Principal,
    Defaults,
}

impl From<AutocreatePolicy> for Autocreate {
    fn from(value: AutocreatePolicy) -> Self {
        match value {
            AutocreatePolicy::None => Autocreate::None,
            AutocreatePolicy::Principal => Autocreate::Principal,
            AutocreatePolicy::Defaults => Autocreate::Defaults,
        }
    }
}

impl std::str::FromStr for AutocreatePolicy {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "principal" => Ok(Self::Principal),
            "defaults" => Ok(Self::Defaults),
            _ => anyhow::bail!("autocreate must be one of none, principal, defaults"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Filesystem root holding the collection hierarchy
    pub data_root: PathBuf,

    /// Principal path assumed when the outer layer forwards no identity
    pub current_user_principal: Option<String>,

    /// Leading URI path to strip before routing (reverse proxy subpath)
    #[serde(default)]
    pub route_prefix: String,

    #[serde(default = "default_autocreate")]
    pub autocreate: AutocreatePolicy,

    /// Refuse requests with minor protocol deviations (missing
    /// Content-Type and the like)
    #[serde(default)]
    pub strict: bool,

    /// Collection size above which queries consult the index
    #[serde(default = "default_index_threshold")]
    pub index_threshold: usize,

    /// Bound on cached per-tree indexes
    #[serde(default = "default_index_capacity")]
    pub index_capacity: usize,
}

fn default_bind_addr() -> SocketAddr {
    "[::]:8008".parse().unwrap()
}

fn default_autocreate() -> AutocreatePolicy {
    AutocreatePolicy::None
}

fn default_index_threshold() -> usize {
    16
}

fn default_index_capacity() -> usize {
    256
}

impl Config {
    pub fn with_root(data_root: PathBuf) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            data_root,
            current_user_principal: None,
            route_prefix: String::new(),
            autocreate: default_autocreate(),
            strict: false,
            index_threshold: default_index_threshold(),
            index_capacity: default_index_capacity(),
        }
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let cfg: Config = toml::from_str(r#"data_root = "/var/lib/carillon""#).unwrap();
        assert_eq!(cfg.bind_addr, default_bind_addr());
        assert_eq!(cfg.autocreate, AutocreatePolicy::None);
        assert!(!cfg.strict);
    }

    #[test]
    fn full_config() {
        let cfg: Config = toml::from_str(
            r#"
bind_addr = "127.0.0.1:5232"
data_root = "/srv/dav"
current_user_principal = "/alice/"
route_prefix = "/dav"
autocreate = "defaults"
strict = true
index_threshold = 64
"#,
        )
        .unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:5232".parse().unwrap());
        assert_eq!(cfg.autocreate, AutocreatePolicy::Defaults);
        assert_eq!(cfg.route_prefix, "/dav");
        assert_eq!(cfg.index_threshold, 64);
    }
}
