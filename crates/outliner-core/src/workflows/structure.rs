use super::error::StructureError;
use crate::core::models::ids::ItemId;
use crate::core::models::item::{ItemKind, OutlinerItem, ResidueRange};
use crate::core::models::tree::{OutlinerTree, TreeError};
use crate::core::scene::handle::LiveObject;
use crate::core::scene::traits::SceneObjects;
use crate::engine::selection::refresh_derived_flags;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ImportedChain {
    pub label: String,
    pub range: ResidueRange,
    /// Scene object carrying the chain's geometry, if the loader split it out.
    #[serde(default)]
    pub object: Option<String>,
}

/// A structure as handed over by the loader: one protein and its chains.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ImportedStructure {
    pub id: ItemId,
    #[serde(default)]
    pub name: Option<String>,
    /// Scene object of the whole molecule. Defaults to the protein id.
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub chains: Vec<ImportedChain>,
}

impl ImportedStructure {
    pub fn chain_id(&self, label: &str) -> ItemId {
        ItemId::new(format!("{}_chain_{}", self.id, label))
    }
}

/// Adds a protein and its chains to the tree, binding them to their scene objects.
///
/// Objects named by the structure but absent from the scene are created.
#[instrument(skip_all, name = "import_structure", fields(protein = %structure.id))]
pub fn import_structure<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    structure: &ImportedStructure,
) -> Result<ItemId, StructureError> {
    let chain_ids: Vec<ItemId> = structure
        .chains
        .iter()
        .map(|c| structure.chain_id(&c.label))
        .collect();
    let mut seen = HashSet::new();
    for id in std::iter::once(&structure.id).chain(&chain_ids) {
        if !seen.insert(id) {
            error!(%id, "Structure lists the same chain twice.");
            return Err(TreeError::DuplicateId(id.clone()).into());
        }
        if let Err(e) = tree.ensure_id_available(id) {
            error!(%id, error = %e, "Refusing to import over an existing or deleted item.");
            return Err(e.into());
        }
    }

    let protein_object = ensure_object(
        scene,
        structure.object.as_deref().unwrap_or(structure.id.as_str()),
    );
    let name = structure
        .name
        .clone()
        .unwrap_or_else(|| structure.id.to_string());
    tree.add(
        OutlinerItem::protein(structure.id.clone(), name).with_object(protein_object.name()),
    )?;

    for (chain, chain_id) in structure.chains.iter().zip(chain_ids) {
        let mut item = OutlinerItem::chain(
            chain_id,
            structure.id.clone(),
            format!("Chain {}", chain.label),
            chain.range,
        );
        if let Some(object) = &chain.object {
            item = item.with_object(ensure_object(scene, object).name());
        }
        tree.add(item)?;
    }

    info!(
        chains = structure.chains.len(),
        "Imported structure into the outliner."
    );
    Ok(structure.id.clone())
}

/// Creates a domain covering `range` of a chain and spawns its scene object.
///
/// The range must lie within the chain and must not overlap any existing domain of it. The new
/// domain takes the chain's current selection and visibility.
#[instrument(skip(tree, scene), name = "create_domain")]
pub fn create_domain<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    chain_id: &str,
    range: ResidueRange,
    name: Option<&str>,
) -> Result<ItemId, StructureError> {
    let chain = expect_kind(tree, chain_id, ItemKind::Chain)?;
    let chain_range = chain
        .range
        .ok_or_else(|| StructureError::MissingRange(chain.id.clone()))?;
    if !chain_range.covers(&range) {
        return Err(StructureError::OutOfChainBounds {
            range,
            chain: chain.id.clone(),
            chain_range,
        });
    }
    let (selected, visible) = (chain.is_selected, chain.is_visible);

    let siblings = tree.domains_of(chain_id);
    for sibling in &siblings {
        if tree
            .find(sibling)
            .and_then(|d| d.range)
            .is_some_and(|r| r.overlaps(&range))
        {
            return Err(StructureError::Overlap {
                range,
                domain: sibling.clone(),
            });
        }
    }

    let anchor = siblings
        .iter()
        .filter(|d| {
            tree.find(d)
                .and_then(|item| item.range)
                .is_some_and(|r| r.start < range.start)
        })
        .next_back()
        .cloned()
        .unwrap_or_else(|| ItemId::from(chain_id));

    let domain = build_domain(tree, scene, chain_id, range, name, selected, visible)?;
    let id = domain.id.clone();
    tree.insert_after(&anchor, domain)?;
    refresh_derived_flags(tree);

    info!(domain = %id, %range, "Created domain.");
    Ok(id)
}

/// Splits a chain or a domain so that residue `at` starts the second part.
///
/// A chain without domains gains two domains covering it. A chain with domains delegates to the
/// domain containing `at`. A domain is replaced in place by its two halves, which inherit its
/// flags and its group memberships.
#[instrument(skip(tree, scene), name = "split")]
pub fn split<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    target: &str,
    at: i32,
) -> Result<(ItemId, ItemId), StructureError> {
    let item = tree
        .find(target)
        .ok_or_else(|| StructureError::NotFound(ItemId::from(target)))?;
    let range = item
        .range
        .ok_or_else(|| StructureError::MissingRange(item.id.clone()))?;

    match item.kind {
        ItemKind::Chain => {
            let domains = tree.domains_of(target);
            if domains.is_empty() {
                let (left, right) = range
                    .split_at(at)
                    .ok_or(StructureError::InvalidSplit { at, range })?;
                let first = create_domain(tree, scene, target, left, None)?;
                let second = create_domain(tree, scene, target, right, None)?;
                return Ok((first, second));
            }
            let containing = domains.into_iter().find(|d| {
                tree.find(d)
                    .and_then(|item| item.range)
                    .is_some_and(|r| r.contains(at))
            });
            match containing {
                Some(domain) => split_domain(tree, scene, &domain, at),
                None => Err(StructureError::InvalidSplit { at, range }),
            }
        }
        ItemKind::Domain => split_domain(tree, scene, target, at),
        found => Err(StructureError::WrongKind {
            id: item.id.clone(),
            expected: ItemKind::Domain,
            found,
        }),
    }
}

fn split_domain<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    domain_id: &str,
    at: i32,
) -> Result<(ItemId, ItemId), StructureError> {
    let domain = expect_kind(tree, domain_id, ItemKind::Domain)?.clone();
    let range = domain
        .range
        .ok_or_else(|| StructureError::MissingRange(domain.id.clone()))?;
    let (left, right) = range
        .split_at(at)
        .ok_or(StructureError::InvalidSplit { at, range })?;
    let chain_id = domain
        .parent_id
        .clone()
        .ok_or_else(|| StructureError::NotFound(domain.id.clone()))?;
    let position = tree
        .position_of(domain_id)
        .ok_or_else(|| StructureError::NotFound(domain.id.clone()))?;

    let (selected, visible) = (domain.is_selected, domain.is_visible);
    let first = build_domain(tree, scene, &chain_id, left, None, selected, visible)?;
    let second = build_domain(tree, scene, &chain_id, right, None, selected, visible)?;
    let ids = (first.id.clone(), second.id.clone());

    tree.remove(domain_id);
    release_object(scene, &domain);
    tree.insert_at(position, first)?;
    tree.insert_at(position + 1, second)?;

    replace_in_groups(tree, &[domain.id.clone()], &[ids.0.clone(), ids.1.clone()]);
    refresh_derived_flags(tree);

    info!(domain = %domain.id, at, first = %ids.0, second = %ids.1, "Split domain.");
    Ok(ids)
}

/// Merges two adjacent domains of the same chain into one.
///
/// The merged domain takes the place of the earlier one. It is selected only if both parts
/// were, and visible if either was.
#[instrument(skip(tree, scene), name = "merge_domains")]
pub fn merge_domains<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    a: &str,
    b: &str,
) -> Result<ItemId, StructureError> {
    if a == b {
        return Err(StructureError::SameItem(ItemId::from(a)));
    }
    let first = expect_kind(tree, a, ItemKind::Domain)?.clone();
    let second = expect_kind(tree, b, ItemKind::Domain)?.clone();
    if first.parent_id != second.parent_id {
        return Err(StructureError::DifferentChains {
            a: first.id,
            b: second.id,
        });
    }
    let (range_a, range_b) = match (first.range, second.range) {
        (Some(ra), Some(rb)) => (ra, rb),
        (None, _) => return Err(StructureError::MissingRange(first.id)),
        (_, None) => return Err(StructureError::MissingRange(second.id)),
    };
    if !range_a.is_adjacent_to(&range_b) {
        return Err(StructureError::NotAdjacent {
            a: first.id,
            b: second.id,
        });
    }
    let chain_id = first
        .parent_id
        .clone()
        .ok_or_else(|| StructureError::NotFound(first.id.clone()))?;
    let position = [a, b]
        .iter()
        .filter_map(|id| tree.position_of(id))
        .min()
        .ok_or_else(|| StructureError::NotFound(first.id.clone()))?;

    let merged = build_domain(
        tree,
        scene,
        &chain_id,
        range_a.union(&range_b),
        None,
        first.is_selected && second.is_selected,
        first.is_visible || second.is_visible,
    )?;
    let merged_id = merged.id.clone();

    for part in [&first, &second] {
        tree.remove(&part.id);
        release_object(scene, part);
    }
    tree.insert_at(position, merged)?;

    replace_in_groups(
        tree,
        &[first.id.clone(), second.id.clone()],
        std::slice::from_ref(&merged_id),
    );
    refresh_derived_flags(tree);

    info!(a, b, merged = %merged_id, "Merged domains.");
    Ok(merged_id)
}

/// Creates a plain group over existing proteins, chains or domains.
#[instrument(skip(tree), name = "create_group")]
pub fn create_group(
    tree: &mut OutlinerTree,
    name: &str,
    members: &[ItemId],
) -> Result<ItemId, StructureError> {
    let members = validate_members(tree, members)?;
    let id = tree.allocate_id("group");
    tree.add(OutlinerItem::group(id.clone(), name, members))?;
    tree.rebuild_group_view(&id);
    refresh_derived_flags(tree);

    info!(group = %id, "Created group.");
    Ok(id)
}

/// Creates a puppet: a group driven by a spawned controller object named `{name}_controller`.
#[instrument(skip(tree, scene), name = "create_puppet")]
pub fn create_puppet<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    name: &str,
    members: &[ItemId],
) -> Result<ItemId, StructureError> {
    let members = validate_members(tree, members)?;
    let id = tree.allocate_id("puppet");
    let controller = scene.spawn_object(&format!("{name}_controller"));
    tree.add(OutlinerItem::group(id.clone(), name, members).with_object(controller.name()))?;
    tree.rebuild_group_view(&id);
    refresh_derived_flags(tree);

    info!(puppet = %id, controller = controller.name(), "Created puppet.");
    Ok(id)
}

/// # Return
///
/// The number of members actually added; ids already in the group are skipped.
#[instrument(skip(tree), name = "add_members")]
pub fn add_members(
    tree: &mut OutlinerTree,
    group_id: &str,
    members: &[ItemId],
) -> Result<usize, StructureError> {
    expect_kind(tree, group_id, ItemKind::Group)?;
    let members = validate_members(tree, members)?;
    let mut added = 0;
    if let Some(group) = tree.find_mut(group_id) {
        for member in members {
            if !group.member_ids.contains(&member) {
                group.member_ids.push(member);
                added += 1;
            }
        }
    }
    tree.rebuild_group_view(group_id);
    refresh_derived_flags(tree);
    Ok(added)
}

/// Removes members from a group. A puppet left without members is deleted with its controller.
///
/// # Return
///
/// The number of members actually removed.
#[instrument(skip(tree, scene), name = "remove_members")]
pub fn remove_members<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    group_id: &str,
    members: &[ItemId],
) -> Result<usize, StructureError> {
    expect_kind(tree, group_id, ItemKind::Group)?;
    let doomed: HashSet<&ItemId> = members.iter().collect();
    let removed = prune_group(tree, scene, group_id, |member| doomed.contains(member));
    refresh_derived_flags(tree);
    Ok(removed)
}

/// Deletes a group and its reference rows, leaving the members alone. A puppet's controller
/// object is removed from the scene.
#[instrument(skip(tree, scene), name = "delete_group")]
pub fn delete_group<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    group_id: &str,
) -> Result<Vec<ItemId>, StructureError> {
    expect_kind(tree, group_id, ItemKind::Group)?;
    let mut removed = Vec::new();
    for proxy in tree.proxies_of(group_id) {
        if tree.remove(&proxy).is_some() {
            removed.push(proxy);
        }
    }
    if let Some(removal) = tree.remove(group_id) {
        release_object(scene, &removal.item);
        removed.push(removal.item.id);
    }
    info!(group_id, rows = removed.len(), "Deleted group.");
    Ok(removed)
}

/// Deletes an item together with its structural descendants and their scene objects.
///
/// Deleting a group deletes the group; deleting a reference row removes its referent from the
/// group. Groups that listed a deleted item drop it, and puppets left empty are deleted.
///
/// # Return
///
/// Every removed row id, descendants first.
#[instrument(skip(tree, scene), name = "delete_item")]
pub fn delete_item<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    item_id: &str,
) -> Result<Vec<ItemId>, StructureError> {
    let item = tree
        .find(item_id)
        .ok_or_else(|| StructureError::NotFound(ItemId::from(item_id)))?;
    match item.kind {
        ItemKind::Group => return delete_group(tree, scene, item_id),
        ItemKind::ReferenceProxy => {
            let (Some(group), Some(referent)) = (item.parent_id.clone(), item.referent.clone())
            else {
                return Err(StructureError::NotFound(item.id.clone()));
            };
            remove_members(tree, scene, &group, &[referent])?;
            return Ok(vec![ItemId::from(item_id)]);
        }
        _ => {}
    }

    let mut doomed = Vec::new();
    collect_subtree(tree, item_id, &mut doomed);

    let mut removed = Vec::new();
    let mut affected_groups: Vec<ItemId> = Vec::new();
    for id in doomed {
        let Some(removal) = tree.remove(&id) else {
            continue;
        };
        release_object(scene, &removal.item);
        for group in removal.referencing_groups {
            if !affected_groups.contains(&group) {
                affected_groups.push(group);
            }
        }
        removed.push(id);
    }

    let gone: HashSet<&ItemId> = removed.iter().collect();
    for group in &affected_groups {
        prune_group(tree, scene, group, |member| gone.contains(member));
    }
    refresh_derived_flags(tree);

    info!(
        item_id,
        removed = removed.len(),
        groups = affected_groups.len(),
        "Deleted item."
    );
    Ok(removed)
}

/// Renames an item. Reference rows pick up the new name immediately.
pub fn rename(tree: &mut OutlinerTree, item_id: &str, name: &str) -> Result<(), StructureError> {
    if !tree.rename(item_id, name) {
        return Err(StructureError::NotFound(ItemId::from(item_id)));
    }
    tree.mirror_references();
    Ok(())
}

fn expect_kind<'t>(
    tree: &'t OutlinerTree,
    id: &str,
    expected: ItemKind,
) -> Result<&'t OutlinerItem, StructureError> {
    let item = tree
        .find(id)
        .ok_or_else(|| StructureError::NotFound(ItemId::from(id)))?;
    if item.kind != expected {
        return Err(StructureError::WrongKind {
            id: item.id.clone(),
            expected,
            found: item.kind,
        });
    }
    Ok(item)
}

fn validate_members(
    tree: &OutlinerTree,
    members: &[ItemId],
) -> Result<Vec<ItemId>, StructureError> {
    if members.is_empty() {
        return Err(StructureError::EmptyGroup);
    }
    let mut unique = Vec::with_capacity(members.len());
    for member in members {
        let item = tree
            .find(member)
            .ok_or_else(|| StructureError::NotFound(member.clone()))?;
        if !item.kind.can_join_group() {
            return Err(StructureError::NotGroupable(member.clone()));
        }
        if !unique.contains(member) {
            unique.push(member.clone());
        }
    }
    Ok(unique)
}

/// Builds a domain row and spawns its object, without inserting the row.
fn build_domain<S: SceneObjects + ?Sized>(
    tree: &mut OutlinerTree,
    scene: &mut S,
    chain_id: &str,
    range: ResidueRange,
    name: Option<&str>,
    selected: bool,
    visible: bool,
) -> Result<OutlinerItem, StructureError> {
    let chain = expect_kind(tree, chain_id, ItemKind::Chain)?;
    let protein = chain.parent_id.clone().unwrap_or_else(|| chain.id.clone());
    let label = chain_label(&protein, &chain.id);
    let object_name = format!("{protein}_{label}_{}_{}", range.start, range.end);
    let display_name = name
        .map(str::to_string)
        .unwrap_or_else(|| format!("{label} {range}"));

    let object = scene.spawn_object(&object_name);
    scene.set_object_selected(&object, selected);
    scene.set_object_hidden(&object, !visible);
    debug!(object = object.name(), "Spawned domain object.");

    let id = tree.allocate_id("domain");
    Ok(OutlinerItem::domain(id, chain_id, display_name, range)
        .with_object(object.name())
        .with_selected(selected)
        .with_visible(visible))
}

fn chain_label<'a>(protein: &str, chain_id: &'a str) -> &'a str {
    chain_id
        .strip_prefix(protein)
        .and_then(|rest| rest.strip_prefix("_chain_"))
        .unwrap_or(chain_id)
}

fn ensure_object<S: SceneObjects + ?Sized>(scene: &mut S, name: &str) -> LiveObject {
    match scene.resolve(name) {
        Some(live) => live,
        None => scene.spawn_object(name),
    }
}

fn release_object<S: SceneObjects + ?Sized>(scene: &mut S, item: &OutlinerItem) {
    let Some(handle) = &item.bound_object else {
        return;
    };
    match handle.resolve(scene) {
        Some(live) => {
            scene.remove_object(&live);
        }
        None => debug!(item = %item.id, object = %handle, "Object already gone."),
    }
}

/// Post-order walk of structural children, so removal never orphans a row.
fn collect_subtree(tree: &OutlinerTree, id: &str, out: &mut Vec<ItemId>) {
    let children: Vec<ItemId> = tree
        .children_of(id)
        .into_iter()
        .map(|child| child.id.clone())
        .collect();
    for child in children {
        collect_subtree(tree, &child, out);
    }
    out.push(ItemId::from(id));
}

/// Drops matching members from a group, deleting a puppet left empty.
fn prune_group<S, F>(tree: &mut OutlinerTree, scene: &mut S, group_id: &str, doomed: F) -> usize
where
    S: SceneObjects + ?Sized,
    F: Fn(&ItemId) -> bool,
{
    let Some(group) = tree.find_mut(group_id) else {
        return 0;
    };
    let before = group.member_ids.len();
    group.member_ids.retain(|member| !doomed(member));
    let removed = before - group.member_ids.len();
    let orphaned_puppet = group.member_ids.is_empty() && group.is_puppet();

    if orphaned_puppet {
        warn!(group_id, "Puppet has no members left; deleting it.");
        if let Err(e) = delete_group(tree, scene, group_id) {
            warn!(group_id, error = %e, "Failed to delete empty puppet.");
        }
    } else {
        tree.rebuild_group_view(group_id);
    }
    removed
}

/// Substitutes `new` for the first occurrence of any `old` id in every group listing one.
fn replace_in_groups(tree: &mut OutlinerTree, old: &[ItemId], new: &[ItemId]) {
    let mut groups = Vec::new();
    for id in old {
        for group in tree.groups_containing(id) {
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
    }

    for group_id in groups {
        let Some(group) = tree.find_mut(&group_id) else {
            continue;
        };
        let mut members = Vec::with_capacity(group.member_ids.len() + new.len());
        let mut substituted = false;
        for member in group.member_ids.drain(..) {
            if !old.contains(&member) {
                if !members.contains(&member) {
                    members.push(member);
                }
            } else if !substituted {
                substituted = true;
                for replacement in new {
                    if !members.contains(replacement) {
                        members.push(replacement.clone());
                    }
                }
            }
        }
        group.member_ids = members;
        tree.rebuild_group_view(&group_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::memory::InMemoryScene;
    use crate::testing::*;

    fn imported_1abc() -> ImportedStructure {
        ImportedStructure {
            id: ItemId::from("1ABC"),
            name: Some("Actin".into()),
            object: None,
            chains: vec![
                ImportedChain {
                    label: "A".into(),
                    range: ResidueRange::new(1, 200),
                    object: None,
                },
                ImportedChain {
                    label: "B".into(),
                    range: ResidueRange::new(1, 80),
                    object: Some("1ABC_B".into()),
                },
            ],
        }
    }

    fn domain_ranges(tree: &OutlinerTree, chain: &str) -> Vec<ResidueRange> {
        tree.domains_of(chain)
            .iter()
            .filter_map(|d| tree.find(d).and_then(|i| i.range))
            .collect()
    }

    #[test]
    fn import_builds_protein_and_chains() {
        let mut tree = OutlinerTree::new();
        let mut scene = InMemoryScene::new();

        let id = import_structure(&mut tree, &mut scene, &imported_1abc()).unwrap();

        assert_eq!(id, "1ABC");
        assert_eq!(tree.chains_of("1ABC"), vec![
            ItemId::from("1ABC_chain_A"),
            ItemId::from("1ABC_chain_B")
        ]);
        assert_eq!(tree.find("1ABC").unwrap().object_name(), Some("1ABC"));
        assert_eq!(tree.find("1ABC_chain_B").unwrap().object_name(), Some("1ABC_B"));
        assert!(tree.find("1ABC_chain_A").unwrap().bound_object.is_none());
        assert!(scene.contains("1ABC") && scene.contains("1ABC_B"));
    }

    #[test]
    fn import_refuses_existing_ids_without_side_effects() {
        let mut tree = OutlinerTree::new();
        let mut scene = InMemoryScene::new();
        import_structure(&mut tree, &mut scene, &imported_1abc()).unwrap();
        let rows = tree.len();

        let result = import_structure(&mut tree, &mut scene, &imported_1abc());

        assert!(matches!(
            result,
            Err(StructureError::Tree(TreeError::DuplicateId(_)))
        ));
        assert_eq!(tree.len(), rows);
    }

    #[test]
    fn deleted_structure_ids_stay_retired() {
        let mut tree = OutlinerTree::new();
        let mut scene = InMemoryScene::new();
        import_structure(&mut tree, &mut scene, &imported_1abc()).unwrap();
        delete_item(&mut tree, &mut scene, "1ABC").unwrap();

        let result = import_structure(&mut tree, &mut scene, &imported_1abc());

        assert!(matches!(
            result,
            Err(StructureError::Tree(TreeError::RetiredId(_)))
        ));
        assert!(tree.is_empty());

        let mut renamed = imported_1abc();
        renamed.id = ItemId::from("1ABC_v2");
        assert!(import_structure(&mut tree, &mut scene, &renamed).is_ok());
    }

    #[test]
    fn import_rejects_repeated_chain_labels() {
        let mut tree = OutlinerTree::new();
        let mut scene = InMemoryScene::new();
        let mut structure = imported_1abc();
        structure.chains[1].label = "A".into();

        let result = import_structure(&mut tree, &mut scene, &structure);

        assert!(matches!(
            result,
            Err(StructureError::Tree(TreeError::DuplicateId(_)))
        ));
        assert!(tree.is_empty());
    }

    #[test]
    fn create_domain_validates_bounds_and_overlap() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();

        assert!(matches!(
            create_domain(&mut tree, &mut scene, "D", ResidueRange::new(100, 130), None),
            Err(StructureError::OutOfChainBounds { .. })
        ));
        assert!(matches!(
            create_domain(&mut tree, &mut scene, "A", ResidueRange::new(90, 110), None),
            Err(StructureError::Overlap { .. })
        ));
        assert!(matches!(
            create_domain(&mut tree, &mut scene, "D1", ResidueRange::new(1, 10), None),
            Err(StructureError::WrongKind { .. })
        ));
    }

    #[test]
    fn create_domain_spawns_named_object_and_keeps_chain_state() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        tree.find_mut("D").unwrap().is_selected = true;

        let id =
            create_domain(&mut tree, &mut scene, "D", ResidueRange::new(10, 40), Some("Hinge"))
                .unwrap();

        let domain = tree.find(&id).unwrap();
        assert_eq!(domain.display_name, "Hinge");
        assert_eq!(domain.object_name(), Some("1ATN_D_10_40"));
        assert!(domain.is_selected);
        assert!(tree.find("D").unwrap().is_selected);
        assert!(scene.state("1ATN_D_10_40").unwrap().selected);
        assert_eq!(tree.position_of(&id), Some(tree.position_of("D").unwrap() + 1));
    }

    #[test]
    fn splitting_a_bare_chain_creates_two_covering_domains() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();

        let (first, second) = split(&mut tree, &mut scene, "D", 61).unwrap();

        assert_eq!(tree.domains_of("D"), vec![first, second]);
        assert_eq!(domain_ranges(&tree, "D"), vec![
            ResidueRange::new(1, 60),
            ResidueRange::new(61, 120)
        ]);
        assert!(scene.contains("1ATN_D_1_60"));
        assert!(scene.contains("1ATN_D_61_120"));
    }

    #[test]
    fn split_rejects_boundary_residues() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();

        assert!(matches!(
            split(&mut tree, &mut scene, "D1", 1),
            Err(StructureError::InvalidSplit { at: 1, .. })
        ));
        assert!(matches!(
            split(&mut tree, &mut scene, "D1", 101),
            Err(StructureError::InvalidSplit { .. })
        ));
        assert!(matches!(
            split(&mut tree, &mut scene, "A", 101),
            Err(StructureError::InvalidSplit { .. })
        ));
        assert!(tree.contains("D1"));
    }

    #[test]
    fn splitting_a_domain_replaces_it_in_place() {
        let mut tree = scenario_tree();
        with_group(&mut tree);
        let mut scene = scenario_scene();
        tree.find_mut("D2").unwrap().is_selected = true;
        let position = tree.position_of("D2").unwrap();

        let (first, second) = split(&mut tree, &mut scene, "A", 151).unwrap();

        assert!(!tree.contains("D2"));
        assert!(!scene.contains(D2_OBJECT));
        assert_eq!(tree.position_of(&first), Some(position));
        assert_eq!(tree.position_of(&second), Some(position + 1));
        assert_eq!(domain_ranges(&tree, "A"), vec![
            ResidueRange::new(1, 100),
            ResidueRange::new(101, 150),
            ResidueRange::new(151, 200)
        ]);
        assert!(tree.find(&first).unwrap().is_selected);
        assert!(scene.state("1ATN_A_151_200").unwrap().selected);

        let group = tree.find("G1").unwrap();
        assert_eq!(group.member_ids, vec![ItemId::from("A"), first, second]);
        assert_eq!(tree.proxies_of("G1").len(), 3);
    }

    #[test]
    fn merge_requires_adjacent_domains_of_one_chain() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        create_domain(&mut tree, &mut scene, "D", ResidueRange::new(1, 50), None).unwrap();
        let far = create_domain(&mut tree, &mut scene, "D", ResidueRange::new(60, 90), None)
            .unwrap();

        assert!(matches!(
            merge_domains(&mut tree, &mut scene, "D1", &far),
            Err(StructureError::DifferentChains { .. })
        ));
        let near = tree.domains_of("D")[0].clone();
        assert!(matches!(
            merge_domains(&mut tree, &mut scene, &near, &far),
            Err(StructureError::NotAdjacent { .. })
        ));
        assert!(matches!(
            merge_domains(&mut tree, &mut scene, "D1", "D1"),
            Err(StructureError::SameItem(_))
        ));
    }

    #[test]
    fn merge_combines_flags_and_memberships() {
        let mut tree = scenario_tree();
        with_group(&mut tree);
        let mut scene = scenario_scene();
        tree.find_mut("D1").unwrap().is_selected = true;
        tree.find_mut("D1").unwrap().is_visible = false;

        let merged = merge_domains(&mut tree, &mut scene, "D2", "D1").unwrap();

        let item = tree.find(&merged).unwrap();
        assert_eq!(item.range, Some(ResidueRange::new(1, 200)));
        assert!(!item.is_selected);
        assert!(item.is_visible);
        assert_eq!(tree.domains_of("A"), vec![merged.clone()]);
        assert!(scene.contains("1ATN_A_1_200"));
        assert!(!scene.contains(D1_OBJECT) && !scene.contains(D2_OBJECT));
        assert_eq!(tree.find("G1").unwrap().member_ids, vec![
            ItemId::from("A"),
            merged
        ]);
    }

    #[test]
    fn groups_accept_only_structural_members() {
        let mut tree = scenario_tree();
        let group = create_group(&mut tree, "Pair", &["D1".into(), "D1".into(), "D".into()])
            .unwrap();

        assert_eq!(tree.find(&group).unwrap().member_ids.len(), 2);
        assert!(matches!(
            create_group(&mut tree, "Nested", &[group.clone()]),
            Err(StructureError::NotGroupable(_))
        ));
        assert!(matches!(
            create_group(&mut tree, "Empty", &[]),
            Err(StructureError::EmptyGroup)
        ));
        assert_eq!(add_members(&mut tree, &group, &["D1".into(), "D2".into()]).unwrap(), 1);
        assert_eq!(tree.proxies_of(&group).len(), 3);
    }

    #[test]
    fn puppet_spawns_and_releases_its_controller() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();

        let puppet = create_puppet(&mut tree, &mut scene, "Arm", &["D1".into()]).unwrap();
        assert!(tree.find(&puppet).unwrap().is_puppet());
        assert!(scene.contains("Arm_controller"));

        let removed = delete_group(&mut tree, &mut scene, &puppet).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!scene.contains("Arm_controller"));
        assert!(tree.contains("D1"));
    }

    #[test]
    fn deleting_a_chain_removes_descendants_and_prunes_groups() {
        let mut tree = scenario_tree();
        with_group(&mut tree);
        let mut scene = scenario_scene();
        let puppet = create_puppet(&mut tree, &mut scene, "Arm", &["D1".into()]).unwrap();

        let removed = delete_item(&mut tree, &mut scene, "A").unwrap();

        assert_eq!(removed, vec![
            ItemId::from("D1"),
            ItemId::from("D2"),
            ItemId::from("A")
        ]);
        assert!(!scene.contains(D1_OBJECT) && !scene.contains(D2_OBJECT));
        assert!(tree.find("G1").unwrap().member_ids.is_empty());
        assert!(tree.proxies_of("G1").is_empty());
        assert!(!tree.contains(&puppet));
        assert!(!scene.contains("Arm_controller"));
        assert!(tree.contains("D"));
    }

    #[test]
    fn deleting_a_reference_row_only_leaves_the_group() {
        let mut tree = scenario_tree();
        with_group(&mut tree);
        let mut scene = scenario_scene();

        delete_item(&mut tree, &mut scene, "G1_ref_D2").unwrap();

        assert!(tree.contains("D2"));
        assert_eq!(tree.find("G1").unwrap().member_ids, vec![ItemId::from("A")]);
        assert!(!tree.contains("G1_ref_D2"));
    }

    #[test]
    fn removed_ids_are_never_reissued() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        let first = create_domain(&mut tree, &mut scene, "D", ResidueRange::new(1, 10), None)
            .unwrap();
        delete_item(&mut tree, &mut scene, &first).unwrap();

        let second = create_domain(&mut tree, &mut scene, "D", ResidueRange::new(1, 10), None)
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rename_reaches_reference_rows() {
        let mut tree = scenario_tree();
        with_group(&mut tree);

        rename(&mut tree, "D2", "C-terminal").unwrap();

        assert_eq!(tree.find("G1_ref_D2").unwrap().display_name, "C-terminal");
        assert!(matches!(
            rename(&mut tree, "ghost", "x"),
            Err(StructureError::NotFound(_))
        ));
    }
}
