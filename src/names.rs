//! Pure derivation of the stable engine object names for a deployment/community identity.
//!
//! Keep this module and [`crate::parser`]'s match strings in sync: identity flows through these
//! template-generated strings, which couples naming to parsing by design (see DESIGN.md).

use crate::model::{CommunityValue, DeploymentKey, SynthesizedNames};

/// Name prefixes owned exclusively by this reconciler. Other subsystems must not write names that
/// collide with these.
pub const PL_PREFIX: &str = "PL_ALLOW_LIST_";
pub const RM_PREFIX: &str = "ALLOW_LIST_DEPLOYMENT_ID_";
pub const COMMUNITY_PREFIX: &str = "COMMUNITY_ALLOW_LIST_DEPLOYMENT_ID_";

/// Derive the five stable names for a `(deployment_id, community)` identity. Deterministic: the
/// same key always produces the same names, and performs no I/O.
pub fn synthesize(key: &DeploymentKey) -> SynthesizedNames {
    let id = key.id;
    let c = key.community.as_name_fragment();
    SynthesizedNames {
        pl_v4: format!("{PL_PREFIX}DEPLOYMENT_ID_{id}_COMMUNITY_{c}_V4"),
        pl_v6: format!("{PL_PREFIX}DEPLOYMENT_ID_{id}_COMMUNITY_{c}_V6"),
        rm_v4: format!("{RM_PREFIX}{id}_V4"),
        rm_v6: format!("{RM_PREFIX}{id}_V6"),
        community: match &key.community {
            CommunityValue::Empty => CommunityValue::Empty,
            CommunityValue::Value(v) => {
                CommunityValue::Value(format!("{COMMUNITY_PREFIX}{id}_COMMUNITY_{v}"))
            }
        },
    }
}
