//! Extraction of structured facts from the cached running-configuration line sequence.
//!
//! The running configuration is parsed as lines, not queried structurally — this is load-bearing
//! and cannot be eliminated here. Keep this module and [`crate::names`]'s templates in one place so
//! they evolve together; a future engine with structural query APIs would replace only this module.

use std::collections::{BTreeMap, HashSet};

use crate::model::{CommunityValue, Family, RouteMapEntry, RESERVED_SEQ};

/// `(exists, correct)` for one prefix-list: `exists` is true iff any line in the cached
/// configuration starts with the prefix-list's `seq` marker. `correct` requires the constant
/// entries to appear first, in order, followed by exactly the declared allow entries in any order
/// — both sets must be fully covered (see DESIGN.md, Open Question 2).
pub fn prefix_list_state(
    lines: &[String],
    family: Family,
    name: &str,
    expected_allow: &[String],
    expected_constants: &[String],
) -> (bool, bool) {
    let marker = format!("{} prefix-list {} seq ", family.keyword(), name);
    let permits: Vec<String> = lines
        .iter()
        .filter(|l| l.starts_with(&marker))
        .filter_map(|l| extract_permit_cidr(l))
        .collect();

    if permits.is_empty() && !lines.iter().any(|l| l.starts_with(&marker)) {
        return (false, false);
    }

    let mut idx = 0;
    for c in expected_constants {
        if permits.get(idx) == Some(c) {
            idx += 1;
        } else {
            return (true, false);
        }
    }
    let remaining: HashSet<&String> = permits[idx..].iter().collect();
    let allow_set: HashSet<&String> = expected_allow.iter().collect();
    (true, remaining == allow_set)
}

/// Extract the CIDR text from a `... permit <cidr> ge <n>` prefix-list line.
fn extract_permit_cidr(line: &str) -> Option<String> {
    let permit_pos = line.find(" permit ")?;
    let rest = &line[permit_pos + " permit ".len()..];
    let cidr = rest.split(" ge ").next()?;
    Some(cidr.trim().to_string())
}

/// `(exists, value)` for a community-list: scans for
/// `bgp community-list standard {name} permit <value>` and returns the first match's value.
pub fn community_state(lines: &[String], name: &str) -> (bool, Option<String>) {
    let marker = format!("bgp community-list standard {name} permit ");
    for line in lines {
        if let Some(value) = line.strip_prefix(&marker) {
            return (true, Some(value.trim().to_string()));
        }
    }
    (false, None)
}

/// Parse all route-map entries for `rm_name`, keyed by sequence number. A section with no
/// prefix-list match clause is logged as incomplete and discarded. `65535` is never returned: it is
/// the engine's reserved default-deny terminator.
pub fn route_map_entries(
    lines: &[String],
    family: Family,
    rm_name: &str,
) -> BTreeMap<u16, RouteMapEntry> {
    let header_marker = format!("route-map {rm_name} permit ");
    let pl_marker = format!("match {} address prefix-list ", family.keyword());
    let community_marker = "match community ";

    let mut result = BTreeMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let Some(seq_str) = line.strip_prefix(&header_marker) else {
            i += 1;
            continue;
        };
        let Ok(seq) = seq_str.trim().parse::<u16>() else {
            i += 1;
            continue;
        };
        i += 1;

        let mut pl_ref = None;
        let mut community_ref = CommunityValue::Empty;
        while i < lines.len() && lines[i].starts_with(' ') {
            let clause = lines[i].trim_start();
            if let Some(pl) = clause.strip_prefix(&pl_marker) {
                pl_ref = Some(pl.trim().to_string());
            } else if let Some(c) = clause.strip_prefix(community_marker) {
                community_ref = CommunityValue::Value(c.trim().to_string());
            }
            i += 1;
        }

        if seq == RESERVED_SEQ {
            continue;
        }

        match pl_ref {
            Some(pl_ref) => {
                result.insert(
                    seq,
                    RouteMapEntry {
                        seq,
                        pl_ref,
                        community_ref,
                    },
                );
            }
            None => {
                log::warn!(
                    "route-map {rm_name} permit {seq} has no prefix-list match clause; discarding"
                );
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn prefix_list_missing() {
        let lines = vec!["ip prefix-list OTHER seq 10 permit 1.0.0.0/8 ge 9".to_string()];
        let (exists, correct) = prefix_list_state(&lines, Family::V4, "X", &[], &[]);
        assert!(!exists);
        assert!(!correct);
    }

    #[test]
    fn prefix_list_correct_requires_constants_first() {
        let lines = vec![
            "ip prefix-list X seq 10 permit 10.0.0.0/8 ge 9".to_string(),
            "ip prefix-list X seq 20 permit 10.1.0.0/24 ge 25".to_string(),
        ];
        let constants = vec!["10.0.0.0/8".to_string()];
        let allow = vec!["10.1.0.0/24".to_string()];
        let (exists, correct) = prefix_list_state(&lines, Family::V4, "X", &allow, &constants);
        assert!(exists);
        assert!(correct);
    }

    #[test]
    fn prefix_list_wrong_when_constant_missing() {
        let lines = vec!["ip prefix-list X seq 10 permit 10.1.0.0/24 ge 25".to_string()];
        let constants = vec!["10.0.0.0/8".to_string()];
        let allow = vec!["10.1.0.0/24".to_string()];
        let (exists, correct) = prefix_list_state(&lines, Family::V4, "X", &allow, &constants);
        assert!(exists);
        assert!(!correct, "constant must be present even when an allow entry matches first");
    }

    #[test]
    fn prefix_list_wrong_when_extra_entry_present() {
        let lines = vec![
            "ip prefix-list X seq 10 permit 10.1.0.0/24 ge 25".to_string(),
            "ip prefix-list X seq 20 permit 10.2.0.0/24 ge 25".to_string(),
        ];
        let allow = vec!["10.1.0.0/24".to_string()];
        let (exists, correct) = prefix_list_state(&lines, Family::V4, "X", &allow, &[]);
        assert!(exists);
        assert!(!correct, "an undeclared extra entry must make the list stale");
    }

    #[test]
    fn community_list_lookup() {
        let lines = vec!["bgp community-list standard C seq 5 permit 65000:1".to_string()];
        let (exists, value) = community_state(&lines, "C");
        assert!(!exists);
        assert_eq!(value, None);

        let lines = vec!["bgp community-list standard C permit 65000:1".to_string()];
        let (exists, value) = community_state(&lines, "C");
        assert!(exists);
        assert_eq!(value, Some("65000:1".to_string()));
    }

    #[test]
    fn route_map_parses_entries_and_skips_reserved() {
        let lines = vec![
            "route-map RM permit 10".to_string(),
            " match ip address prefix-list PLA".to_string(),
            " match community COMMUNITY_A".to_string(),
            "route-map RM permit 30000".to_string(),
            " match ip address prefix-list PLB".to_string(),
            "route-map RM permit 65535".to_string(),
            " match ip address prefix-list DENY_ALL".to_string(),
        ];
        let entries = route_map_entries(&lines, Family::V4, "RM");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&10].pl_ref, "PLA");
        assert_eq!(entries[&10].community_ref, CommunityValue::Value("COMMUNITY_A".into()));
        assert_eq!(entries[&30000].pl_ref, "PLB");
        assert_eq!(entries[&30000].community_ref, CommunityValue::Empty);
        assert!(!entries.contains_key(&RESERVED_SEQ));
    }

    #[test]
    fn route_map_discards_section_without_prefix_list() {
        let lines = vec![
            "route-map RM permit 10".to_string(),
            " match community ONLY".to_string(),
        ];
        let entries = route_map_entries(&lines, Family::V4, "RM");
        assert!(entries.is_empty());
    }

    #[test]
    fn route_map_ignores_other_family() {
        let lines = vec![
            "route-map RM permit 10".to_string(),
            " match ipv6 address prefix-list PLV6".to_string(),
        ];
        let entries = route_map_entries(&lines, Family::V4, "RM");
        assert!(entries.is_empty());
    }
}
