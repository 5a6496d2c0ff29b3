//! Top-level reconciliation: `apply` and `retract` diff declared intent against the parsed running
//! configuration, compute a minimal command batch, push it, and trigger a peer soft-reload only
//! when something actually changed.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config_view::ConfigView;
use crate::constants::AllowListConstants;
use crate::engine::EngineExecutor;
use crate::error::ReconcileError;
use crate::model::{CommunityValue, DeploymentKey, Family};
use crate::names;
use crate::parser;
use crate::prefix::{prefix_len_v4, prefix_len_v6};
use crate::sequence;

/// Computes and applies command batches against the routing engine's running configuration.
pub struct PolicyReconciler {
    view: ConfigView,
    constants: Arc<AllowListConstants>,
}

impl PolicyReconciler {
    /// Construct a reconciler over the given engine executor and process-wide constants.
    pub fn new(engine: Arc<dyn EngineExecutor>, constants: Arc<AllowListConstants>) -> Self {
        Self {
            view: ConfigView::new(engine),
            constants,
        }
    }

    /// Create or update the allow-list entry identified by `(id, community)` so that its declared
    /// prefixes are reflected in the engine's running configuration. Idempotent: re-applying
    /// identical intent produces an empty command batch and does not trigger a soft-reload.
    pub async fn apply(
        &mut self,
        id: u32,
        community: CommunityValue,
        v4_prefixes: Vec<String>,
        v6_prefixes: Vec<String>,
    ) -> Result<(), ReconcileError> {
        let key = DeploymentKey::new(id, community.clone());
        let names = names::synthesize(&key);

        self.view.refresh().await?;

        let mut batch = Vec::new();

        let v4_active = self.update_prefix_list(
            &mut batch,
            Family::V4,
            &names.pl_v4,
            &v4_prefixes,
            &self.constants.default_pl_rules.v4.clone(),
        );
        let v6_active = self.update_prefix_list(
            &mut batch,
            Family::V6,
            &names.pl_v6,
            &v6_prefixes,
            &self.constants.default_pl_rules.v6.clone(),
        );

        self.update_community(&mut batch, &names.community, &community);

        if v4_active {
            self.update_route_map_entry(&mut batch, Family::V4, &names.rm_v4, &names.pl_v4, &names.community)?;
        }
        if v6_active {
            self.update_route_map_entry(&mut batch, Family::V6, &names.rm_v6, &names.pl_v6, &names.community)?;
        }

        self.push_and_reload(id, batch).await
    }

    /// Remove the allow-list entry identified by `(id, community)`. Symmetric to [`Self::apply`]:
    /// route-map references are removed before the prefix-list/community-list objects they name.
    pub async fn retract(&mut self, id: u32, community: CommunityValue) -> Result<(), ReconcileError> {
        let key = DeploymentKey::new(id, community.clone());
        let names = names::synthesize(&key);

        self.view.refresh().await?;
        let lines: Vec<String> = self.view.lines().map(str::to_string).collect();

        let mut batch = Vec::new();

        for (family, rm_name, pl_name) in [
            (Family::V4, &names.rm_v4, &names.pl_v4),
            (Family::V6, &names.rm_v6, &names.pl_v6),
        ] {
            let entries = parser::route_map_entries(&lines, family, rm_name);
            if let Some((seq, _)) = entries.iter().find(|(_, e)| &e.pl_ref == pl_name) {
                batch.push(format!("no route-map {rm_name} permit {seq}"));
            }
        }

        for (family, pl_name) in [(Family::V4, &names.pl_v4), (Family::V6, &names.pl_v6)] {
            let (exists, _) = parser::prefix_list_state(&lines, family, pl_name, &[], &[]);
            if exists {
                batch.push(format!("no {} prefix-list {pl_name}", family.keyword()));
            }
        }

        if let CommunityValue::Value(name) = &names.community {
            let (exists, _) = parser::community_state(&lines, name);
            if exists {
                batch.push(format!("no bgp community-list standard {name}"));
            }
        }

        self.push_and_reload(id, batch).await
    }

    /// Emit commands to bring prefix-list `name` (family `family`) in line with `constants ++
    /// prefixes`. Returns whether this family carries any policy at all (constants or declared
    /// prefixes non-empty); when it does not, the caller skips the corresponding route-map entry.
    fn update_prefix_list(
        &self,
        batch: &mut Vec<String>,
        family: Family,
        name: &str,
        prefixes: &[String],
        constants: &[String],
    ) -> bool {
        if constants.is_empty() && prefixes.is_empty() {
            return false;
        }

        let lines: Vec<String> = self.view.lines().map(str::to_string).collect();
        let (exists, correct) = parser::prefix_list_state(&lines, family, name, prefixes, constants);
        if correct {
            return true;
        }

        if exists {
            batch.push(format!("no {} prefix-list {name}", family.keyword()));
        }

        let kw = family.keyword();
        for (i, prefix) in constants.iter().chain(prefixes.iter()).enumerate() {
            let Some(len) = prefix_len(family, prefix) else {
                log::warn!("skipping malformed {kw} prefix `{prefix}` for prefix-list {name}");
                continue;
            };
            let seq = 10 * (i as u32 + 1);
            batch.push(format!("{kw} prefix-list {name} seq {seq} permit {prefix} ge {}", len + 1));
        }
        true
    }

    /// Bring community-list `name` in line with `value` (the raw BGP community text). A
    /// non-existent list is created directly; a list with the wrong value is dropped and recreated.
    /// Nothing is emitted for an unqualified entry (`value` is [`CommunityValue::Empty`]).
    fn update_community(&self, batch: &mut Vec<String>, name: &CommunityValue, value: &CommunityValue) {
        let (CommunityValue::Value(name), CommunityValue::Value(value)) = (name, value) else {
            return;
        };

        let lines: Vec<String> = self.view.lines().map(str::to_string).collect();
        let (exists, current) = parser::community_state(&lines, name);
        if current.as_deref() == Some(value.as_str()) {
            return;
        }
        if exists {
            batch.push(format!("no bgp community-list standard {name}"));
        }
        batch.push(format!("bgp community-list standard {name} permit {value}"));
    }

    fn update_route_map_entry(
        &self,
        batch: &mut Vec<String>,
        family: Family,
        rm_name: &str,
        pl_name: &str,
        community: &CommunityValue,
    ) -> Result<(), ReconcileError> {
        let lines: Vec<String> = self.view.lines().map(str::to_string).collect();
        let entries = parser::route_map_entries(&lines, family, rm_name);

        let community_ref = community.clone();
        if entries
            .values()
            .any(|e| e.pl_ref == pl_name && e.community_ref == community_ref)
        {
            return Ok(());
        }

        let used: HashSet<u16> = entries.keys().copied().collect();
        let has_community = !community.is_empty();
        let seq = sequence::next_seq(&used, has_community)?;

        batch.push(format!("route-map {rm_name} permit {seq}"));
        batch.push(format!(" match {} address prefix-list {pl_name}", family.keyword()));
        if let CommunityValue::Value(name) = community {
            batch.push(format!(" match community {name}"));
        }
        Ok(())
    }

    async fn push_and_reload(&mut self, id: u32, batch: Vec<String>) -> Result<(), ReconcileError> {
        if batch.is_empty() {
            return Ok(());
        }
        let ok = self.view.push(&batch).await?;
        if !ok {
            log::error!("[allow-list {id}] engine rejected command batch, will reconverge on next event");
            return Ok(());
        }
        if let Err(e) = self.view.run_command(&["-c", "clear bgp * soft in"]).await {
            log::error!("[allow-list {id}] soft-reload failed: {e}");
        }
        Ok(())
    }
}

fn prefix_len(family: Family, prefix: &str) -> Option<u8> {
    match family {
        Family::V4 => prefix_len_v4(prefix),
        Family::V6 => prefix_len_v6(prefix),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::constants::DefaultPlRules;
    use crate::engine::InMemoryEngine;
    use crate::error::SequenceError;

    fn test_constants() -> Arc<AllowListConstants> {
        Arc::new(AllowListConstants {
            enabled: true,
            default_pl_rules: DefaultPlRules {
                v4: vec!["192.0.2.0/24".to_string()],
                v6: vec![],
            },
            engine_binary: "vtysh".to_string(),
        })
    }

    // Walks S1 through S6 against one shared engine, as a single converging session.
    #[test(tokio::test)]
    async fn scenarios_s1_through_s6() {
        let engine = Arc::new(InMemoryEngine::new(vec![]));
        let mut r = PolicyReconciler::new(engine.clone(), test_constants());

        // S1: basic create, no community.
        r.apply(5, CommunityValue::Empty, vec!["10.1.0.0/24".to_string()], vec![])
            .await
            .unwrap();
        let s1 = engine.snapshot();
        assert!(s1.iter().any(|l| l == "ip prefix-list PL_ALLOW_LIST_DEPLOYMENT_ID_5_COMMUNITY_empty_V4 seq 10 permit 192.0.2.0/24 ge 25"));
        assert!(s1.iter().any(|l| l == "ip prefix-list PL_ALLOW_LIST_DEPLOYMENT_ID_5_COMMUNITY_empty_V4 seq 20 permit 10.1.0.0/24 ge 25"));
        assert!(s1.iter().any(|l| l == "route-map ALLOW_LIST_DEPLOYMENT_ID_5_V4 permit 30000"));
        assert!(s1.iter().any(|l| l == " match ip address prefix-list PL_ALLOW_LIST_DEPLOYMENT_ID_5_COMMUNITY_empty_V4"));
        assert!(!s1.iter().any(|l| l.contains("match community")));
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 1);

        // S2: a second, independent deployment qualified by a community.
        r.apply(
            7,
            CommunityValue::Value("65000:1".to_string()),
            vec!["192.168.0.0/16".to_string()],
            vec![],
        )
        .await
        .unwrap();
        let s2 = engine.snapshot();
        assert!(s2.iter().any(|l| l == "route-map ALLOW_LIST_DEPLOYMENT_ID_7_V4 permit 10"));
        assert!(s2
            .iter()
            .any(|l| l == "bgp community-list standard COMMUNITY_ALLOW_LIST_DEPLOYMENT_ID_7_COMMUNITY_65000:1 permit 65000:1"));
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 2);

        // S3: idempotent re-apply of S2 must produce an empty batch (no further push/reload).
        r.apply(
            7,
            CommunityValue::Value("65000:1".to_string()),
            vec!["192.168.0.0/16".to_string()],
            vec![],
        )
        .await
        .unwrap();
        assert_eq!(engine.snapshot(), s2);
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 2);

        // S4: widening the declared prefixes for deployment 5 replaces the prefix-list, not the
        // route-map.
        r.apply(
            5,
            CommunityValue::Empty,
            vec!["10.1.0.0/24".to_string(), "10.2.0.0/24".to_string()],
            vec![],
        )
        .await
        .unwrap();
        let s4 = engine.snapshot();
        assert!(s4.iter().any(|l| l == "ip prefix-list PL_ALLOW_LIST_DEPLOYMENT_ID_5_COMMUNITY_empty_V4 seq 30 permit 10.2.0.0/24 ge 25"));
        assert!(s4.iter().any(|l| l == "route-map ALLOW_LIST_DEPLOYMENT_ID_5_V4 permit 30000"));
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 3);

        // S5: retract deployment 7's community entry.
        r.retract(7, CommunityValue::Value("65000:1".to_string())).await.unwrap();
        let s5 = engine.snapshot();
        assert!(!s5.iter().any(|l| l.starts_with("route-map ALLOW_LIST_DEPLOYMENT_ID_7_V4")));
        assert!(!s5.iter().any(|l| l.starts_with("ip prefix-list PL_ALLOW_LIST_DEPLOYMENT_ID_7")));
        assert!(!s5.iter().any(|l| l.starts_with("bgp community-list standard COMMUNITY_ALLOW_LIST_DEPLOYMENT_ID_7")));
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 4);
        // deployment 5's state is untouched by deployment 7's retract.
        assert!(s5.iter().any(|l| l == "route-map ALLOW_LIST_DEPLOYMENT_ID_5_V4 permit 30000"));

        // S6: a fresh community-qualified entry for deployment 7 reuses the freed sequence slot.
        r.apply(
            7,
            CommunityValue::Value("65000:2".to_string()),
            vec!["198.51.100.0/24".to_string()],
            vec![],
        )
        .await
        .unwrap();
        let s6 = engine.snapshot();
        assert!(s6.iter().any(|l| l == "route-map ALLOW_LIST_DEPLOYMENT_ID_7_V4 permit 10"));
    }

    #[test(tokio::test)]
    async fn retract_of_unknown_identity_is_a_no_op() {
        let engine = Arc::new(InMemoryEngine::new(vec![]));
        let mut r = PolicyReconciler::new(engine.clone(), test_constants());
        r.retract(999, CommunityValue::Empty).await.unwrap();
        assert!(engine.snapshot().is_empty());
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 0);
    }

    #[test(tokio::test)]
    async fn apply_with_only_constants_skips_inactive_family() {
        // v6 has neither constants nor declared prefixes: no v6 prefix-list or route-map appears.
        let engine = Arc::new(InMemoryEngine::new(vec![]));
        let mut r = PolicyReconciler::new(engine.clone(), test_constants());
        r.apply(1, CommunityValue::Empty, vec!["203.0.113.0/24".to_string()], vec![])
            .await
            .unwrap();
        let lines = engine.snapshot();
        assert!(!lines.iter().any(|l| l.contains("_V6")));
    }

    // A community-qualified route-map entry that finds its band fully occupied by unrelated
    // entries must abort the whole apply before pushing anything: no partial mutation.
    #[test(tokio::test)]
    async fn sequence_exhaustion_aborts_before_any_push() {
        let id = 42;
        let community = CommunityValue::Value("65000:9".to_string());
        let key = DeploymentKey::new(id, community.clone());
        let names = names::synthesize(&key);

        let mut initial = Vec::new();
        for seq in (10..=29990).step_by(10) {
            initial.push(format!("route-map {} permit {seq}", names.rm_v4));
            initial.push(" match ip address prefix-list OTHER_PL".to_string());
        }

        let engine = Arc::new(InMemoryEngine::new(initial.clone()));
        let mut r = PolicyReconciler::new(engine.clone(), test_constants());
        let err = r
            .apply(id, community, vec!["198.51.100.0/24".to_string()], vec![])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Sequence(SequenceError::SequenceSpaceExhausted("community"))
        ));

        // no prefix-list, community-list or route-map command reached the engine.
        assert_eq!(engine.snapshot(), initial);
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 0);
    }

    // A rejected push must not trigger the peer soft-reload; the caller reconverges on the next
    // event instead.
    #[test(tokio::test)]
    async fn failed_push_suppresses_soft_reload() {
        let engine = Arc::new(InMemoryEngine::new(vec![]));
        engine.fail_next_push();
        let mut r = PolicyReconciler::new(engine.clone(), test_constants());
        r.apply(5, CommunityValue::Empty, vec!["10.1.0.0/24".to_string()], vec![])
            .await
            .unwrap();
        assert!(engine.snapshot().is_empty());
        assert_eq!(engine.reload_count.load(Ordering::SeqCst), 0);
    }
}
