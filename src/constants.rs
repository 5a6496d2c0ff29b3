// BgpSim: BGP Network Simulator written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Process-wide configuration: whether the reconciler is enabled at all, the constant prefixes
//! prepended to every generated prefix-list, and how to reach the routing engine.

use lazy_static::lazy_static;
use serde::Deserialize;

use crate::model::ConstantPrefixes;

macro_rules! expect {
    ($result:expr, $($rest:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!("Error: {}: {}\n", format!($($rest)*), e);
            panic!()
        })
    };
}

/// The default rule set prepended to every IPv4/IPv6 prefix-list, read from `[default_pl_rules]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultPlRules {
    #[serde(default)]
    pub v4: Vec<String>,
    #[serde(default)]
    pub v6: Vec<String>,
}

fn default_engine_binary() -> String {
    "vtysh".to_string()
}

/// Top-level shape of `allowlist.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowListConstants {
    /// Whether the reconciler acts on config-db events at all; when `false`, every event is
    /// acknowledged but otherwise ignored.
    pub enabled: bool,
    #[serde(default)]
    pub default_pl_rules: DefaultPlRules,
    /// Path to the `vtysh`-compatible binary used to reach the routing engine.
    #[serde(default = "default_engine_binary")]
    pub engine_binary: String,
}

impl AllowListConstants {
    /// Load constants from a TOML file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_string(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_string(), e))
    }

    /// The constant prefixes as a [`ConstantPrefixes`] value, for use by the reconciler.
    pub fn constant_prefixes(&self) -> ConstantPrefixes {
        ConstantPrefixes {
            v4: self.default_pl_rules.v4.clone(),
            v6: self.default_pl_rules.v6.clone(),
        }
    }
}

/// Errors loading `allowlist.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{0}': {1}")]
    Read(String, std::io::Error),
    #[error("cannot parse '{0}': {1}")]
    Parse(String, toml::de::Error),
}

lazy_static! {
    /// Path to `allowlist.toml`, overridable via `ALLOWLIST_CONFIG` for tests and alternate
    /// deployments.
    pub static ref CONFIG_PATH: String =
        std::env::var("ALLOWLIST_CONFIG").unwrap_or_else(|_| "/etc/sonic/allowlist.toml".to_string());

    /// The loaded process-wide constants. Panics at first access if the file is missing or
    /// malformed, mirroring how other ambient configuration in this codebase is loaded eagerly.
    pub static ref CONFIG: AllowListConstants = expect!(
        AllowListConstants::load(&CONFIG_PATH),
        "failed to load allow-list constants from '{}'",
        *CONFIG_PATH
    );
}
