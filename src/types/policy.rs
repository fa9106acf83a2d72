//! Operator policy lists.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::target::TargetId;

/// Which policy list a target was named in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyList {
    Whitelist,
    Blacklist,
    Pinned,
    Frozen,
}

impl fmt::Display for PolicyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyList::Whitelist => "whitelist",
            PolicyList::Blacklist => "blacklist",
            PolicyList::Pinned => "pinned",
            PolicyList::Frozen => "frozen",
        };
        f.write_str(name)
    }
}

/// The four operator lists, disjoint by intent.
///
/// An empty whitelist means "no whitelist": every unlisted target is eligible.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyLists {
    pub whitelist: BTreeSet<TargetId>,
    pub blacklist: BTreeSet<TargetId>,
    /// Target → minimum allocation floor.
    pub pinned: BTreeMap<TargetId, f64>,
    pub frozen: BTreeSet<TargetId>,
}

impl PolicyLists {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a whitelisted target.
    pub fn whitelist(mut self, id: impl Into<TargetId>) -> Self {
        self.whitelist.insert(id.into());
        self
    }

    /// Builder: add a blacklisted target.
    pub fn blacklist(mut self, id: impl Into<TargetId>) -> Self {
        self.blacklist.insert(id.into());
        self
    }

    /// Builder: pin a target with a minimum allocation.
    pub fn pin(mut self, id: impl Into<TargetId>, floor: f64) -> Self {
        self.pinned.insert(id.into(), floor);
        self
    }

    /// Builder: freeze a target at its current allocation.
    pub fn freeze(mut self, id: impl Into<TargetId>) -> Self {
        self.frozen.insert(id.into());
        self
    }

    pub fn has_whitelist(&self) -> bool {
        !self.whitelist.is_empty()
    }

    /// Lists naming this target, in declaration order.
    pub fn lists_for(&self, id: &TargetId) -> Vec<PolicyList> {
        let mut lists = Vec::new();
        if self.whitelist.contains(id) {
            lists.push(PolicyList::Whitelist);
        }
        if self.blacklist.contains(id) {
            lists.push(PolicyList::Blacklist);
        }
        if self.pinned.contains_key(id) {
            lists.push(PolicyList::Pinned);
        }
        if self.frozen.contains(id) {
            lists.push(PolicyList::Frozen);
        }
        lists
    }

    /// Every id named by any list, ordered.
    pub fn all_ids(&self) -> BTreeSet<&TargetId> {
        self.whitelist
            .iter()
            .chain(self.blacklist.iter())
            .chain(self.pinned.keys())
            .chain(self.frozen.iter())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_for_multiple() {
        let policy = PolicyLists::new().whitelist("QmA").pin("QmA", 10.0).freeze("QmB");
        assert_eq!(
            policy.lists_for(&TargetId::new("QmA")),
            vec![PolicyList::Whitelist, PolicyList::Pinned]
        );
        assert_eq!(policy.lists_for(&TargetId::new("QmB")), vec![PolicyList::Frozen]);
        assert!(policy.lists_for(&TargetId::new("QmC")).is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let json = r#"{"blacklist":["QmX"],"pinned":{"QmY":300.0}}"#;
        let policy: PolicyLists = serde_json::from_str(json).unwrap();
        assert!(!policy.has_whitelist());
        assert!(policy.blacklist.contains(&TargetId::new("QmX")));
        assert_eq!(policy.pinned.get(&TargetId::new("QmY")), Some(&300.0));
    }
}
