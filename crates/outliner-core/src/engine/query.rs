use crate::core::models::ids::ItemId;
use crate::core::models::item::ItemKind;
use crate::core::models::tree::OutlinerTree;

/// Maps a clicked row to the item that actually receives the action.
///
/// Reference rows forward to their referent; every other item is its own target. Returns
/// `None` for unknown ids and for proxies whose referent is gone.
pub fn resolve_target(tree: &OutlinerTree, item_id: &str) -> Option<ItemId> {
    let item = tree.find(item_id)?;
    if item.kind != ItemKind::ReferenceProxy {
        return Some(item.id.clone());
    }
    let referent = tree.find(item.referent.as_deref()?)?;
    (referent.kind != ItemKind::ReferenceProxy).then(|| referent.id.clone())
}

/// Whether every live member of a group is selected.
///
/// Computed on demand from the members. Member ids that no longer resolve are skipped, so a
/// stale entry left behind by a removal does not pin the group to "not selected". A group with
/// no live members is not fully selected.
pub fn is_group_fully_selected(tree: &OutlinerTree, group_id: &str) -> bool {
    let Some(group) = tree.find(group_id).filter(|g| g.kind == ItemKind::Group) else {
        return false;
    };
    let mut live = group
        .member_ids
        .iter()
        .filter_map(|member| tree.find(member))
        .peekable();
    live.peek().is_some() && live.all(|item| item.is_selected)
}

/// AND over the domains of a chain, `None` when the chain has no domains.
pub fn chain_state_from_domains(tree: &OutlinerTree, chain_id: &str) -> Option<bool> {
    let domains = tree.domains_of(chain_id);
    if domains.is_empty() {
        return None;
    }
    Some(
        domains
            .iter()
            .all(|d| tree.find(d).is_some_and(|item| item.is_selected)),
    )
}
