use meshcall_core::{ConnectionId, Participant};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    pub joined: Vec<Participant>,
    pub left: Vec<Participant>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Members other than `local`, in broadcast order.
pub fn remote_members(members: &[Participant], local: &ConnectionId) -> Vec<Participant> {
    members
        .iter()
        .filter(|p| &p.connection_id != local)
        .cloned()
        .collect()
}

/// Compares two views of the remote members by connection id.
pub fn diff_members(previous: &[Participant], current: &[Participant]) -> MembershipDiff {
    let before: HashSet<&ConnectionId> = previous.iter().map(|p| &p.connection_id).collect();
    let after: HashSet<&ConnectionId> = current.iter().map(|p| &p.connection_id).collect();

    MembershipDiff {
        joined: current
            .iter()
            .filter(|p| !before.contains(&p.connection_id))
            .cloned()
            .collect(),
        left: previous
            .iter()
            .filter(|p| !after.contains(&p.connection_id))
            .cloned()
            .collect(),
    }
}
