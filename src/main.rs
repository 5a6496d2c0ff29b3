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

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use bgp_allowlist_reconciler::constants::AllowListConstants;
use bgp_allowlist_reconciler::{ConfigDbEvent, EventDispatcher, PolicyReconciler, VtyshExecutor};

/// Watch a configuration-database table and reconcile BGP allow-list policy against the local
/// routing engine.
#[derive(Debug, Parser)]
struct Cli {
    /// Path to the process-wide constants file.
    #[clap(long = "config", short = 'c', default_value = "/etc/sonic/allowlist.toml")]
    config: String,
}

/// One line of the event stream consumed on stdin: `{"op":"SET"|"DEL","key":"...","data":{...}}`.
/// Production deployments feed this from a configuration-database subscription; this shape lets
/// the binary be driven by any such adapter without this crate depending on one.
#[derive(Debug, Deserialize)]
#[serde(tag = "op")]
enum Event {
    #[serde(rename = "SET")]
    Set {
        key: String,
        #[serde(default)]
        data: HashMap<String, String>,
    },
    #[serde(rename = "DEL")]
    Del { key: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let constants = Arc::new(AllowListConstants::load(&args.config)?);
    log::info!("allow-list reconciler starting, enabled={}", constants.enabled);

    let engine = Arc::new(VtyshExecutor::new(constants.engine_binary.clone()));
    let reconciler = PolicyReconciler::new(engine, constants.clone());
    let dispatcher = EventDispatcher::new(reconciler, constants);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("dropping malformed event line: {e}");
                continue;
            }
        };
        match event {
            Event::Set { key, data } => {
                dispatcher.set_handler(&(key, data) as &dyn ConfigDbEvent).await;
            }
            Event::Del { key } => {
                dispatcher.del_handler(&key).await;
            }
        }
    }

    Ok(())
}
