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

//! The routing-engine command channel: an external collaborator that feeds text lines to a running
//! BGP engine and returns a text dump of its running configuration. Transport is kept out of the
//! rest of the crate behind the [`EngineExecutor`] trait.

use async_trait::async_trait;
use itertools::Itertools;
use tokio::process::Command;

pub use crate::error::EngineError;

/// Operations the reconciler needs from the routing engine. Implemented for real deployments by
/// [`VtyshExecutor`] and for tests by [`InMemoryEngine`].
#[async_trait]
pub trait EngineExecutor: Send + Sync {
    /// Return the full running configuration, as an ordered sequence of lines.
    async fn text(&self) -> Result<Vec<String>, EngineError>;

    /// Apply a batch of commands. Not atomic across engine semantics: on an engine-reported
    /// failure, a prefix of `commands` may already be applied.
    async fn push(&self, commands: &[String]) -> Result<bool, EngineError>;

    /// Run an arbitrary engine command (used for the peer soft-reload) and return whether it
    /// succeeded, along with its stdout/stderr.
    async fn run_command(&self, argv: &[&str]) -> Result<(bool, String, String), EngineError>;
}

/// Executor that shells out to `vtysh` on the local machine, the way `cisco_lab::ssh::SshSession`
/// shells out to `ssh`.
#[derive(Debug, Clone)]
pub struct VtyshExecutor {
    /// Path to the `vtysh` binary.
    binary: String,
}

impl VtyshExecutor {
    /// Construct an executor that invokes the given `vtysh`-compatible binary.
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::from(std::process::Command::new(&self.binary));
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<(bool, String, String), EngineError> {
        log::trace!("[vtysh] {}", args.iter().join(" "));
        let mut cmd = self.command();
        for arg in args {
            cmd.arg(arg);
        }
        let output = cmd.output().await?;
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = String::from_utf8(output.stderr)?;
        Ok((output.status.success(), stdout, stderr))
    }
}

#[async_trait]
impl EngineExecutor for VtyshExecutor {
    async fn text(&self) -> Result<Vec<String>, EngineError> {
        let (ok, stdout, stderr) = self.run(&["-c", "show running-config"]).await?;
        if !ok {
            return Err(EngineError::Rejected(stderr));
        }
        Ok(stdout.lines().map(str::to_string).collect())
    }

    async fn push(&self, commands: &[String]) -> Result<bool, EngineError> {
        if commands.is_empty() {
            return Ok(true);
        }
        let mut args: Vec<&str> = vec!["-c", "configure terminal"];
        for c in commands {
            args.push("-c");
            args.push(c.as_str());
        }
        let (ok, _stdout, stderr) = self.run(&args).await?;
        if !ok {
            log::warn!("[vtysh] command batch rejected: {stderr}");
        }
        Ok(ok)
    }

    async fn run_command(&self, argv: &[&str]) -> Result<(bool, String, String), EngineError> {
        self.run(argv).await
    }
}

/// In-memory fake engine used by tests: holds the "running configuration" as a `Vec<String>` and
/// applies commands the same way the rest of this crate expects a real engine to.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    lines: std::sync::Mutex<Vec<String>>,
    /// Number of times [`EngineExecutor::run_command`] was invoked (the soft-reload call).
    pub reload_count: std::sync::atomic::AtomicUsize,
    fail_push: std::sync::atomic::AtomicBool,
}

impl InMemoryEngine {
    /// Construct a fake engine whose initial running configuration is `lines`.
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines: std::sync::Mutex::new(lines),
            reload_count: std::sync::atomic::AtomicUsize::new(0),
            fail_push: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Force the next [`EngineExecutor::push`] to fail, to exercise `EngineError` handling.
    pub fn fail_next_push(&self) {
        self.fail_push
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Snapshot of the current lines, for test assertions.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineExecutor for InMemoryEngine {
    async fn text(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.lines.lock().unwrap().clone())
    }

    async fn push(&self, commands: &[String]) -> Result<bool, EngineError> {
        if self
            .fail_push
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Ok(false);
        }
        let mut lines = self.lines.lock().unwrap();
        for cmd in commands {
            apply_fake(&mut lines, cmd);
        }
        Ok(true)
    }

    async fn run_command(&self, argv: &[&str]) -> Result<(bool, String, String), EngineError> {
        self.reload_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok((true, String::new(), format!("ran: {}", argv.join(" "))))
    }
}

/// Apply a single emitted command to the fake engine's line buffer, approximating how a real
/// running-config accretes and retracts lines under `no`-prefixed commands.
fn apply_fake(lines: &mut Vec<String>, cmd: &str) {
    if let Some(rest) = cmd.strip_prefix("no ") {
        if rest.starts_with("ip prefix-list ") || rest.starts_with("ipv6 prefix-list ") {
            // `no {ip|ipv6} prefix-list X` removes every `X seq N ...` line, not just one.
            let marker = format!("{rest} seq ");
            lines.retain(|l| !l.starts_with(&marker));
        } else if rest.starts_with("route-map ") {
            // `no route-map X permit N` removes the header and its indented match lines.
            if let Some(header_pos) = lines.iter().position(|l| l == rest) {
                let mut end = header_pos + 1;
                while end < lines.len() && lines[end].starts_with(' ') {
                    end += 1;
                }
                lines.drain(header_pos..end);
            }
        } else if rest.starts_with("bgp community-list standard ") {
            // `no bgp community-list standard X` removes the `X permit <value>` line.
            let marker = format!("{rest} permit ");
            lines.retain(|l| !l.starts_with(&marker));
        } else {
            lines.retain(|l| l != rest);
        }
    } else {
        lines.push(cmd.to_string());
    }
}
