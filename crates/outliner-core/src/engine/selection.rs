use super::config::SyncConfig;
use super::guard::SyncLock;
use super::query::{chain_state_from_domains, is_group_fully_selected, resolve_target};
use super::state::{SyncOutcome, note_change};
use crate::core::models::ids::ItemId;
use crate::core::models::item::ItemKind;
use crate::core::models::tree::OutlinerTree;
use crate::core::scene::handle::LiveObject;
use crate::core::scene::traits::SceneObjects;
use tracing::{debug, instrument, trace};

/// Whether a selection change fans out to structural descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cascade {
    #[default]
    Full,
    /// Only the target itself changes. Parents are still recomputed.
    None,
}

/// Propagates selection between the outliner tree and the host scene.
///
/// Outbound passes ([`set_selected`](Self::set_selected), [`toggle`](Self::toggle)) apply a UI
/// action to the tree and push the resulting flags to the bound scene objects. The inbound pass
/// ([`reconcile_from_scene`](Self::reconcile_from_scene)) recomputes every flag from the host's
/// current selection. Every entry point holds the shared [`SyncLock`] for its duration.
#[derive(Debug, Clone, Default)]
pub struct SelectionSyncEngine {
    lock: SyncLock,
    config: SyncConfig,
}

impl SelectionSyncEngine {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            lock: SyncLock::new(),
            config,
        }
    }

    /// Creates an engine sharing `lock` with other engines.
    pub fn with_lock(config: SyncConfig, lock: SyncLock) -> Self {
        Self { lock, config }
    }

    pub fn lock(&self) -> &SyncLock {
        &self.lock
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_syncing(&self) -> bool {
        self.lock.is_held()
    }

    /// Sets the selection of an item with full cascade.
    ///
    /// For a Group the requested `state` is ignored: the group toggles, deselecting every
    /// member when all of them are selected and selecting all of them otherwise.
    pub fn set_selected<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &mut S,
        item_id: &str,
        state: bool,
    ) -> SyncOutcome {
        self.apply_selection(tree, scene, item_id, state, Cascade::Full)
    }

    /// Handles a click on an item's selection checkbox.
    pub fn toggle<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &mut S,
        item_id: &str,
    ) -> SyncOutcome {
        let current = resolve_target(tree, item_id)
            .and_then(|target| tree.find(&target).map(|item| item.is_selected));
        match current {
            Some(current) => self.set_selected(tree, scene, item_id, !current),
            None => {
                debug!(item_id, "Ignoring toggle of an unknown item.");
                SyncOutcome::NotFound
            }
        }
    }

    #[instrument(skip(self, tree, scene))]
    pub fn apply_selection<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &mut S,
        item_id: &str,
        state: bool,
        cascade: Cascade,
    ) -> SyncOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            trace!(item_id, "Selection sync already in progress; rejecting nested call.");
            return SyncOutcome::Rejected;
        };
        let Some(target) = resolve_target(tree, item_id) else {
            debug!(item_id, "Selection target not found.");
            return SyncOutcome::NotFound;
        };

        let mut pass = SelectionPass {
            tree,
            scene,
            config: &self.config,
            changed: Vec::new(),
        };
        pass.select(&target, state, cascade);
        let changed = pass.finish();
        debug!(target = %target, changed = changed.len(), "Selection pass complete.");
        SyncOutcome::Applied { changed }
    }

    /// Rebuilds every selection flag from the host's selected-object set.
    ///
    /// Bound items take their object's state (a vanished object counts as unselected). Chains
    /// with domains then become the AND of their domains, Proteins with chains the AND of their
    /// chains, plain groups the AND of their members, and proxies copy their referents. Puppets
    /// follow their controller object. The scene is only read.
    #[instrument(skip_all)]
    pub fn reconcile_from_scene<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &S,
    ) -> SyncOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            trace!("Selection sync already in progress; rejecting reconciliation.");
            return SyncOutcome::Rejected;
        };

        let snapshot = scene.selected_object_names();
        let mut changed = Vec::new();

        let bound: Vec<(ItemId, bool)> = tree
            .iter()
            .filter(|item| !item.is_proxy())
            .filter_map(|item| {
                let handle = item.bound_object.as_ref()?;
                let selected = handle
                    .resolve(scene)
                    .is_some_and(|live| snapshot.contains(live.name()));
                Some((item.id.clone(), selected))
            })
            .collect();
        for (id, selected) in bound {
            set_local(tree, &id, selected, &mut changed);
        }

        for chain in tree.ids_of_kind(ItemKind::Chain) {
            if let Some(selected) = chain_state_from_domains(tree, &chain) {
                set_local(tree, &chain, selected, &mut changed);
            }
        }

        for protein in tree.ids_of_kind(ItemKind::Protein) {
            let chains = tree.chains_of(&protein);
            if chains.is_empty() {
                continue;
            }
            let selected = chains
                .iter()
                .all(|c| tree.find(c).is_some_and(|item| item.is_selected));
            set_local(tree, &protein, selected, &mut changed);
        }

        recompute_plain_groups(tree, &mut changed);
        for proxy in tree.mirror_references() {
            note_change(&mut changed, &proxy);
        }

        debug!(
            selected_objects = snapshot.len(),
            changed = changed.len(),
            "Selection reconciled from scene."
        );
        SyncOutcome::Applied { changed }
    }
}

struct SelectionPass<'a, S: SceneObjects + ?Sized> {
    tree: &'a mut OutlinerTree,
    scene: &'a mut S,
    config: &'a SyncConfig,
    changed: Vec<ItemId>,
}

impl<S: SceneObjects + ?Sized> SelectionPass<'_, S> {
    fn select(&mut self, id: &ItemId, state: bool, cascade: Cascade) {
        let Some(item) = self.tree.find(id) else {
            return;
        };
        let kind = item.kind;
        let parent = item.parent_id.clone();
        let referent = item.referent.clone();

        match kind {
            ItemKind::Protein => {
                self.set_flag(id, state);
                if cascade == Cascade::Full {
                    for chain in self.tree.chains_of(id) {
                        self.select_chain(&chain, state, cascade);
                    }
                }
            }
            ItemKind::Chain => self.select_chain(id, state, cascade),
            ItemKind::Domain => {
                self.set_flag(id, state);
                if let Some(chain) = parent {
                    self.recompute_chain(&chain);
                }
            }
            ItemKind::Group => self.toggle_group(id),
            ItemKind::ReferenceProxy => {
                if let Some(referent) = referent.filter(|r| {
                    self.tree
                        .kind_of(r)
                        .is_some_and(|k| k != ItemKind::ReferenceProxy)
                }) {
                    self.select(&referent, state, cascade);
                }
            }
        }
    }

    fn select_chain(&mut self, chain: &ItemId, state: bool, cascade: Cascade) {
        let domains = self.tree.domains_of(chain);
        if domains.is_empty() {
            self.set_flag(chain, state);
            return;
        }
        match cascade {
            Cascade::Full => {
                for domain in &domains {
                    self.set_flag(domain, state);
                }
                self.set_flag(chain, state);
            }
            Cascade::None => self.recompute_chain(chain),
        }
    }

    fn recompute_chain(&mut self, chain: &ItemId) {
        if let Some(selected) = chain_state_from_domains(self.tree, chain) {
            self.set_flag(chain, selected);
        }
    }

    fn toggle_group(&mut self, group_id: &ItemId) {
        let Some(group) = self.tree.find(group_id) else {
            return;
        };
        let is_puppet = group.is_puppet();
        let members: Vec<ItemId> = group
            .member_ids
            .iter()
            .filter(|m| self.tree.contains(m))
            .cloned()
            .collect();
        if members.is_empty() {
            debug!(group = %group_id, "Group has no live members; nothing to toggle.");
            return;
        }

        let target = !members
            .iter()
            .all(|m| self.tree.find(m).is_some_and(|item| item.is_selected));
        trace!(group = %group_id, target, members = members.len(), "Toggling group.");
        for member in &members {
            self.select(member, target, Cascade::Full);
        }
        if is_puppet {
            self.set_flag(group_id, target);
        }
    }

    /// Writes one flag and pushes it to the bound object.
    fn set_flag(&mut self, id: &ItemId, state: bool) {
        let Some(item) = self.tree.find_mut(id) else {
            return;
        };
        if item.is_selected != state {
            item.is_selected = state;
            note_change(&mut self.changed, id);
        }
        let Some(handle) = item.bound_object.clone() else {
            return;
        };
        match handle.resolve(&*self.scene) {
            Some(live) => self.sync_object(&live, state),
            None => debug!(item = %id, object = %handle, "Bound object no longer exists."),
        }
    }

    fn sync_object(&mut self, live: &LiveObject, state: bool) {
        if self.scene.is_object_selected(live) != state {
            self.scene.set_object_selected(live, state);
        }
        if state && self.config.activate_sole_selection && self.scene.active_object().is_none() {
            let selected = self.scene.selected_object_names();
            if selected.len() == 1 && selected.contains(live.name()) {
                self.scene.set_active_object(Some(live));
            }
        }
    }

    fn finish(mut self) -> Vec<ItemId> {
        recompute_plain_groups(self.tree, &mut self.changed);
        for proxy in self.tree.mirror_references() {
            note_change(&mut self.changed, &proxy);
        }
        self.changed
    }
}

/// Recomputes the flags that derive from other items after a structural change.
///
/// Chains with domains take the AND of their domains, plain groups the AND of their members
/// and proxies copy their referents. The scene is not touched.
pub fn refresh_derived_flags(tree: &mut OutlinerTree) -> Vec<ItemId> {
    let mut changed = Vec::new();
    for chain in tree.ids_of_kind(ItemKind::Chain) {
        if let Some(selected) = chain_state_from_domains(tree, &chain) {
            set_local(tree, &chain, selected, &mut changed);
        }
    }
    recompute_plain_groups(tree, &mut changed);
    for proxy in tree.mirror_references() {
        note_change(&mut changed, &proxy);
    }
    changed
}

fn set_local(tree: &mut OutlinerTree, id: &ItemId, state: bool, changed: &mut Vec<ItemId>) {
    if let Some(item) = tree.find_mut(id) {
        if item.is_selected != state {
            item.is_selected = state;
            note_change(changed, id);
        }
    }
}

fn recompute_plain_groups(tree: &mut OutlinerTree, changed: &mut Vec<ItemId>) {
    let groups: Vec<ItemId> = tree
        .iter()
        .filter(|item| item.kind == ItemKind::Group && !item.is_puppet())
        .map(|item| item.id.clone())
        .collect();
    for group in groups {
        let selected = is_group_fully_selected(tree, &group);
        set_local(tree, &group, selected, changed);
    }
}
