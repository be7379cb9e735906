use super::ids::{ItemId, ItemKey};
use super::item::{ItemKind, OutlinerItem};
use slotmap::SlotMap;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Duplicate item id: '{0}'")]
    DuplicateId(ItemId),

    #[error("Item id '{0}' belonged to a deleted item and cannot be reused")]
    RetiredId(ItemId),

    #[error("Item '{id}' cannot be placed under {parent:?}: {reason}")]
    InvalidParent {
        id: ItemId,
        parent: Option<ItemId>,
        reason: &'static str,
    },

    #[error("Anchor item not found: '{0}'")]
    AnchorNotFound(ItemId),
}

/// Result of [`OutlinerTree::remove`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub item: OutlinerItem,
    /// Groups whose `member_ids` still list the removed item. Pruning them is up to the caller.
    pub referencing_groups: Vec<ItemId>,
}

/// The ordered collection of outliner rows.
///
/// Items live in a slot map keyed by [`ItemKey`]; `order` holds the display order and `index`
/// maps the public string ids to keys. The tree enforces structural parentage and id
/// uniqueness but carries no selection policy.
#[derive(Debug, Clone, Default)]
pub struct OutlinerTree {
    /// Primary storage for items.
    items: SlotMap<ItemKey, OutlinerItem>,
    /// Display order of the rendered outliner.
    order: Vec<ItemKey>,
    /// Lookup map from public id to storage key.
    index: HashMap<ItemId, ItemKey>,
    /// Every id that has ever been removed. Only reference rows may carry one of these again.
    retired: HashSet<ItemId>,
    /// Counter behind [`OutlinerTree::allocate_id`].
    id_counter: u64,
}

impl OutlinerTree {
    /// Creates a new, empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows, reference rows included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the tree holds no rows.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Checks whether an item with the given id is currently present.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `true` if the id resolves to a live item.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Checks whether an id belonged to an item that has since been removed.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `true` if the id was retired by a removal.
    pub fn is_retired(&self, id: &str) -> bool {
        self.retired.contains(id)
    }

    /// Checks that a new non-reference item could take `id`.
    ///
    /// # Arguments
    ///
    /// * `id` - The candidate id.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateId`] if the id is in use and [`TreeError::RetiredId`] if it
    /// belonged to a removed item.
    pub fn ensure_id_available(&self, id: &str) -> Result<(), TreeError> {
        if self.contains(id) {
            return Err(TreeError::DuplicateId(ItemId::from(id)));
        }
        if self.is_retired(id) {
            return Err(TreeError::RetiredId(ItemId::from(id)));
        }
        Ok(())
    }

    /// Retrieves an immutable reference to an item by its id.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(&OutlinerItem)` if the item exists, otherwise `None` (typically a stale id
    /// from a previous UI frame).
    pub fn find(&self, id: &str) -> Option<&OutlinerItem> {
        self.index.get(id).and_then(|&key| self.items.get(key))
    }

    /// Retrieves a mutable reference to an item by its id.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(&mut OutlinerItem)` if the item exists, otherwise `None`.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut OutlinerItem> {
        let key = *self.index.get(id)?;
        self.items.get_mut(key)
    }

    /// Retrieves the kind of an item.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(ItemKind)` if the item exists, otherwise `None`.
    pub fn kind_of(&self, id: &str) -> Option<ItemKind> {
        self.find(id).map(|item| item.kind)
    }

    /// Returns an iterator over all items in display order.
    ///
    /// # Return
    ///
    /// An iterator yielding `&OutlinerItem` from the top row down.
    pub fn iter(&self) -> impl Iterator<Item = &OutlinerItem> {
        self.order.iter().filter_map(|&key| self.items.get(key))
    }

    /// Returns the ids of all items in display order.
    pub fn ids(&self) -> Vec<ItemId> {
        self.iter().map(|item| item.id.clone()).collect()
    }

    /// Returns the ids of all items of one kind in display order.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind to filter by.
    pub fn ids_of_kind(&self, kind: ItemKind) -> Vec<ItemId> {
        self.iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Retrieves the display position of an item.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// Returns `Some(index)` into the display order if the item exists, otherwise `None`.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        let key = *self.index.get(id)?;
        self.order.iter().position(|&k| k == key)
    }

    /// Retrieves the items directly under a parent.
    ///
    /// # Arguments
    ///
    /// * `parent_id` - The id of the parent row.
    ///
    /// # Return
    ///
    /// The items whose `parent_id` equals `parent_id`, in display order. Empty for unknown ids.
    pub fn children_of(&self, parent_id: &str) -> Vec<&OutlinerItem> {
        self.iter()
            .filter(|item| item.parent_id.as_deref() == Some(parent_id))
            .collect()
    }

    fn child_ids_of_kind(&self, parent_id: &str, kind: ItemKind) -> Vec<ItemId> {
        self.children_of(parent_id)
            .into_iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Returns the chain ids of a protein in display order.
    ///
    /// # Arguments
    ///
    /// * `protein_id` - The protein to list.
    pub fn chains_of(&self, protein_id: &str) -> Vec<ItemId> {
        self.child_ids_of_kind(protein_id, ItemKind::Chain)
    }

    /// Returns the domain ids of a chain in display order.
    ///
    /// # Arguments
    ///
    /// * `chain_id` - The chain to list.
    pub fn domains_of(&self, chain_id: &str) -> Vec<ItemId> {
        self.child_ids_of_kind(chain_id, ItemKind::Domain)
    }

    /// Returns the reference row ids shown under a group in display order.
    ///
    /// # Arguments
    ///
    /// * `group_id` - The group to list.
    pub fn proxies_of(&self, group_id: &str) -> Vec<ItemId> {
        self.child_ids_of_kind(group_id, ItemKind::ReferenceProxy)
    }

    /// Finds the groups listing an item among their members.
    ///
    /// # Arguments
    ///
    /// * `member_id` - The member to search for. Need not be live.
    ///
    /// # Return
    ///
    /// The ids of every group whose `member_ids` contain `member_id`, in display order.
    pub fn groups_containing(&self, member_id: &str) -> Vec<ItemId> {
        self.iter()
            .filter(|item| {
                item.kind == ItemKind::Group && item.member_ids.iter().any(|m| m == member_id)
            })
            .map(|item| item.id.clone())
            .collect()
    }

    /// Computes the indentation level of an item in the rendered outliner.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to look up.
    ///
    /// # Return
    ///
    /// The number of structural ancestors; `0` for roots and unknown ids.
    pub fn depth_of(&self, id: &str) -> usize {
        let mut depth = 0;
        let mut current = self.find(id).and_then(|item| item.parent_id.clone());
        while let Some(parent) = current {
            depth += 1;
            current = self.find(&parent).and_then(|item| item.parent_id.clone());
        }
        depth
    }

    /// Appends an item at the end of the display order.
    ///
    /// # Arguments
    ///
    /// * `item` - The item to insert.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateId`] if the id is already present, which always indicates a
    /// bug in id generation, [`TreeError::RetiredId`] if a non-reference item reuses the id of a
    /// removed one, and [`TreeError::InvalidParent`] if the parent is missing or of the wrong
    /// kind.
    pub fn add(&mut self, item: OutlinerItem) -> Result<(), TreeError> {
        self.validate(&item)?;
        let position = self.order.len();
        self.insert_unchecked(position, item);
        Ok(())
    }

    /// Inserts an item directly after `anchor` in display order.
    ///
    /// # Arguments
    ///
    /// * `anchor` - The id of the row the new item follows.
    /// * `item` - The item to insert.
    ///
    /// # Errors
    ///
    /// Same as [`OutlinerTree::add`], plus [`TreeError::AnchorNotFound`].
    pub fn insert_after(&mut self, anchor: &str, item: OutlinerItem) -> Result<(), TreeError> {
        let position = self
            .position_of(anchor)
            .ok_or_else(|| TreeError::AnchorNotFound(ItemId::from(anchor)))?;
        self.validate(&item)?;
        self.insert_unchecked(position + 1, item);
        Ok(())
    }

    /// Inserts an item at `position` in display order, clamped to the end.
    ///
    /// # Arguments
    ///
    /// * `position` - The display index the item will occupy.
    /// * `item` - The item to insert.
    ///
    /// # Errors
    ///
    /// Same as [`OutlinerTree::add`].
    pub fn insert_at(&mut self, position: usize, item: OutlinerItem) -> Result<(), TreeError> {
        self.validate(&item)?;
        self.insert_unchecked(position.min(self.order.len()), item);
        Ok(())
    }

    fn validate(&self, item: &OutlinerItem) -> Result<(), TreeError> {
        if self.index.contains_key(item.id.as_str()) {
            error!(id = %item.id, "Refusing to insert an item with a duplicate id.");
            return Err(TreeError::DuplicateId(item.id.clone()));
        }
        // Reference rows are regenerated under their deterministic ids on every view rebuild.
        if !item.is_proxy() && self.retired.contains(&item.id) {
            error!(id = %item.id, "Refusing to reuse the id of a removed item.");
            return Err(TreeError::RetiredId(item.id.clone()));
        }

        let invalid = |reason| TreeError::InvalidParent {
            id: item.id.clone(),
            parent: item.parent_id.clone(),
            reason,
        };

        match (item.kind.structural_parent(), &item.parent_id) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(invalid("root items cannot have a parent")),
            (Some(_), None) => Err(invalid("a parent is required")),
            (Some(expected), Some(parent)) => match self.kind_of(parent) {
                Some(kind) if kind == expected => Ok(()),
                Some(_) => Err(invalid("parent has the wrong kind")),
                None => Err(invalid("parent does not exist")),
            },
        }
    }

    fn insert_unchecked(&mut self, position: usize, item: OutlinerItem) -> ItemKey {
        let id = item.id.clone();
        let key = self.items.insert(item);
        self.order.insert(position, key);
        self.index.insert(id, key);
        key
    }

    fn detach(&mut self, key: ItemKey) -> Option<OutlinerItem> {
        let item = self.items.remove(key)?;
        self.order.retain(|&k| k != key);
        self.index.remove(item.id.as_str());
        self.retired.insert(item.id.clone());
        Some(item)
    }

    /// Removes a single item.
    ///
    /// Children are not touched; callers removing a subtree remove it bottom-up. Group
    /// memberships are not pruned either: the returned [`Removal`] names the groups that still
    /// reference the item so the caller can apply its own cascade policy. The id is retired and
    /// will not be accepted again for a non-reference item.
    ///
    /// # Arguments
    ///
    /// * `id` - The item id to remove.
    ///
    /// # Return
    ///
    /// Returns `None` if no item has that id.
    pub fn remove(&mut self, id: &str) -> Option<Removal> {
        let Some(&key) = self.index.get(id) else {
            debug!(id, "Ignoring removal of an unknown item.");
            return None;
        };
        let item = self.detach(key)?;
        let referencing_groups = self.groups_containing(id);
        Some(Removal {
            item,
            referencing_groups,
        })
    }

    /// Changes the display name of an item.
    ///
    /// Reference rows pick the new name up on the next [`OutlinerTree::mirror_references`].
    ///
    /// # Arguments
    ///
    /// * `id` - The item to rename.
    /// * `name` - The new display name.
    ///
    /// # Return
    ///
    /// Returns `false` if no item has that id.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        match self.find_mut(id) {
            Some(item) => {
                item.display_name = name.to_string();
                true
            }
            None => {
                debug!(id, "Ignoring rename of an unknown item.");
                false
            }
        }
    }

    /// Produces an id of the form `{prefix}_{n}` that is neither in use nor retired.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The leading part of the id, e.g. `"domain"`.
    ///
    /// # Return
    ///
    /// A fresh [`ItemId`].
    pub fn allocate_id(&mut self, prefix: &str) -> ItemId {
        loop {
            self.id_counter += 1;
            let candidate = ItemId::new(format!("{prefix}_{}", self.id_counter));
            if !self.index.contains_key(candidate.as_str()) && !self.retired.contains(&candidate)
            {
                return candidate;
            }
        }
    }

    /// Regenerates the reference rows shown under a group, one per member, directly after the
    /// group in display order.
    ///
    /// Member ids that no longer resolve to a groupable item are pruned from the group first,
    /// and repeated member ids are collapsed to their first occurrence.
    ///
    /// # Arguments
    ///
    /// * `group_id` - The group whose view is rebuilt.
    ///
    /// # Return
    ///
    /// Returns `false` if `group_id` is not a group.
    pub fn rebuild_group_view(&mut self, group_id: &str) -> bool {
        let Some(group) = self.find(group_id).filter(|g| g.kind == ItemKind::Group) else {
            debug!(group_id, "Cannot rebuild view of a missing group.");
            return false;
        };

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(group.member_ids.len());
        let mut dangling = Vec::new();
        for member in &group.member_ids {
            if !seen.insert(member.clone()) {
                continue;
            }
            if self.find(member).is_some_and(|item| item.kind.can_join_group()) {
                members.push(member.clone());
            } else {
                dangling.push(member.clone());
            }
        }
        if !dangling.is_empty() {
            warn!(group_id, ?dangling, "Pruning dangling group members.");
        }
        if members.len() != group.member_ids.len() {
            if let Some(group) = self.find_mut(group_id) {
                group.member_ids = members.clone();
            }
        }

        let stale: Vec<ItemKey> = self
            .order
            .iter()
            .copied()
            .filter(|&key| {
                self.items.get(key).is_some_and(|item| {
                    item.is_proxy() && item.parent_id.as_deref() == Some(group_id)
                })
            })
            .collect();
        for key in stale {
            self.detach(key);
        }

        let Some(mut position) = self.position_of(group_id).map(|p| p + 1) else {
            return false;
        };
        let Some(group) = self.find(group_id).cloned() else {
            return false;
        };
        for member in &members {
            let Some(referent) = self.find(member) else {
                continue;
            };
            let proxy = OutlinerItem::reference(&group, referent);
            match self.validate(&proxy) {
                Ok(()) => {
                    self.insert_unchecked(position, proxy);
                    position += 1;
                }
                Err(e) => warn!(group_id, error = %e, "Skipping reference row."),
            }
        }
        true
    }

    /// Copies selection, visibility and name from every proxy's referent onto the proxy.
    ///
    /// # Return
    ///
    /// The ids of proxies whose selection or visibility changed.
    pub fn mirror_references(&mut self) -> Vec<ItemId> {
        let updates: Vec<(ItemKey, bool, bool, String)> = self
            .order
            .iter()
            .filter_map(|&key| {
                let proxy = self.items.get(key).filter(|item| item.is_proxy())?;
                let referent = self.find(proxy.referent.as_deref()?)?;
                Some((
                    key,
                    referent.is_selected,
                    referent.is_visible,
                    referent.display_name.clone(),
                ))
            })
            .collect();

        let mut changed = Vec::new();
        for (key, selected, visible, name) in updates {
            if let Some(proxy) = self.items.get_mut(key) {
                if proxy.is_selected != selected || proxy.is_visible != visible {
                    changed.push(proxy.id.clone());
                }
                proxy.is_selected = selected;
                proxy.is_visible = visible;
                proxy.display_name = name;
            }
        }
        changed
    }
}
