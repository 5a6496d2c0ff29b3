//! Translates raw configuration-database events into [`PolicyReconciler`] calls: key/value
//! validation lives here so the reconciler only ever sees well-formed identities and prefix lists.

use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::Mutex;

use crate::constants::AllowListConstants;
use crate::error::InvalidEvent;
use crate::model::CommunityValue;
use crate::prefix;
use crate::reconciler::PolicyReconciler;

lazy_static! {
    static ref KEY_RE: Regex = Regex::new(r"^DEPLOYMENT_ID\|(\d+)(?:\|(\S+))?$").unwrap();
}

/// A single `SET` notification from the configuration database: a key and its field/value
/// payload. Kept narrow so the dispatcher does not depend on any particular subscription client's
/// event type — only on being handed something that looks like a row.
pub trait ConfigDbEvent {
    /// The raw `DEPLOYMENT_ID|<id>[|<community>]` key.
    fn key(&self) -> &str;
    /// The row's field/value payload (`prefixes_v4`, `prefixes_v6`).
    fn data(&self) -> &HashMap<String, String>;
}

impl ConfigDbEvent for (String, HashMap<String, String>) {
    fn key(&self) -> &str {
        &self.0
    }

    fn data(&self) -> &HashMap<String, String> {
        &self.1
    }
}

/// Handles `SET`/`DEL` notifications for one configuration-database table, validating them and
/// driving a [`PolicyReconciler`]. Single-threaded by construction: the inner mutex exists only to
/// give the dispatcher interior mutability behind a shared reference, not for concurrency — events
/// are still processed strictly one at a time.
pub struct EventDispatcher {
    reconciler: Mutex<PolicyReconciler>,
    constants: Arc<AllowListConstants>,
}

impl EventDispatcher {
    /// Construct a dispatcher driving `reconciler`, gated by `constants.enabled`.
    pub fn new(reconciler: PolicyReconciler, constants: Arc<AllowListConstants>) -> Self {
        Self {
            reconciler: Mutex::new(reconciler),
            constants,
        }
    }

    /// Handle a `SET key=... data={...}` event. Always returns `true` (handled): malformed events
    /// are logged and dropped rather than retried.
    pub async fn set_handler(&self, event: &dyn ConfigDbEvent) -> bool {
        let key = event.key();
        let data = event.data();
        if !self.constants.enabled {
            log::debug!("allow-list reconciler disabled, ignoring SET {key}");
            return true;
        }

        let (id, community) = match parse_key(key) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("dropping SET {key}: {e}");
                return true;
            }
        };

        let v4_prefixes = match parse_prefix_list(data.get("prefixes_v4"), prefix::is_ipv4, key, "ipv4") {
            Ok(p) => p,
            Err(e) => {
                log::warn!("dropping SET {key}: {e}");
                return true;
            }
        };
        let v6_prefixes = match parse_prefix_list(data.get("prefixes_v6"), prefix::is_ipv6, key, "ipv6") {
            Ok(p) => p,
            Err(e) => {
                log::warn!("dropping SET {key}: {e}");
                return true;
            }
        };

        if v4_prefixes.is_empty() && v6_prefixes.is_empty() {
            log::warn!("dropping SET {key}: {}", InvalidEvent::NoPrefixes(key.to_string()));
            return true;
        }

        let mut reconciler = self.reconciler.lock().await;
        if let Err(e) = reconciler.apply(id, community, v4_prefixes, v6_prefixes).await {
            log::error!("apply failed for {key}: {e}");
        }
        true
    }

    /// Handle a `DEL key=...` event. Always returns `true`.
    pub async fn del_handler(&self, key: &str) -> bool {
        if !self.constants.enabled {
            log::debug!("allow-list reconciler disabled, ignoring DEL {key}");
            return true;
        }

        let (id, community) = match parse_key(key) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("dropping DEL {key}: {e}");
                return true;
            }
        };

        let mut reconciler = self.reconciler.lock().await;
        if let Err(e) = reconciler.retract(id, community).await {
            log::error!("retract failed for {key}: {e}");
        }
        true
    }
}

fn parse_key(key: &str) -> Result<(u32, CommunityValue), InvalidEvent> {
    let caps = KEY_RE
        .captures(key)
        .ok_or_else(|| InvalidEvent::MalformedKey(key.to_string()))?;
    let id: u32 = caps[1]
        .parse()
        .map_err(|_| InvalidEvent::MalformedKey(key.to_string()))?;
    let community = caps
        .get(2)
        .map(|m| CommunityValue::Value(m.as_str().to_string()))
        .unwrap_or(CommunityValue::Empty);
    Ok((id, community))
}

fn parse_prefix_list(
    raw: Option<&String>,
    valid: fn(&str) -> bool,
    key: &str,
    family: &'static str,
) -> Result<Vec<String>, InvalidEvent> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let mut prefixes = Vec::new();
    for p in raw.split(',') {
        let p = p.trim();
        if !valid(p) {
            return Err(InvalidEvent::InvalidPrefix {
                key: key.to_string(),
                family,
                prefix: p.to_string(),
            });
        }
        prefixes.push(p.to_string());
    }
    Ok(prefixes)
}
