use super::guard::SyncLock;
use super::query::resolve_target;
use super::state::{ReconcileRun, SyncOutcome, note_change};
use crate::core::models::ids::ItemId;
use crate::core::models::tree::OutlinerTree;
use crate::core::scene::traits::SceneObjects;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace};

/// Propagates visibility between the outliner tree and the host scene.
///
/// Visibility never cascades: hiding a chain leaves its domains as they are.
#[derive(Debug, Clone, Default)]
pub struct VisibilitySyncEngine {
    lock: SyncLock,
}

impl VisibilitySyncEngine {
    pub fn new(lock: SyncLock) -> Self {
        Self { lock }
    }

    pub fn lock(&self) -> &SyncLock {
        &self.lock
    }

    #[instrument(skip(self, tree, scene))]
    pub fn set_visible<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &mut S,
        item_id: &str,
        state: bool,
    ) -> SyncOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            trace!(item_id, "Sync already in progress; rejecting visibility change.");
            return SyncOutcome::Rejected;
        };
        let Some(target) = resolve_target(tree, item_id) else {
            debug!(item_id, "Visibility target not found.");
            return SyncOutcome::NotFound;
        };
        let Some(item) = tree.find_mut(&target) else {
            return SyncOutcome::NotFound;
        };

        let mut changed = Vec::new();
        if item.is_visible != state {
            item.is_visible = state;
            note_change(&mut changed, &target);
        }
        if let Some(handle) = item.bound_object.clone() {
            match handle.resolve(&*scene) {
                Some(live) => {
                    if scene.is_object_hidden(&live) == state {
                        scene.set_object_hidden(&live, !state);
                    }
                }
                None => debug!(item = %target, object = %handle, "Bound object no longer exists."),
            }
        }

        for proxy in tree.mirror_references() {
            note_change(&mut changed, &proxy);
        }
        SyncOutcome::Applied { changed }
    }

    /// Handles a click on an item's eye icon.
    pub fn toggle_visible<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &mut S,
        item_id: &str,
    ) -> SyncOutcome {
        let current = resolve_target(tree, item_id)
            .and_then(|target| tree.find(&target).map(|item| item.is_visible));
        match current {
            Some(current) => self.set_visible(tree, scene, item_id, !current),
            None => {
                debug!(item_id, "Ignoring visibility toggle of an unknown item.");
                SyncOutcome::NotFound
            }
        }
    }

    /// Corrects the visibility flags of bound items whose object's hidden state disagrees.
    ///
    /// Does nothing unless at least `min_interval` has passed since `last_run`. Items whose
    /// object has vanished keep their flag. The scene is only read.
    pub fn reconcile_from_scene_throttled<S: SceneObjects + ?Sized>(
        &self,
        tree: &mut OutlinerTree,
        scene: &S,
        now: Instant,
        last_run: Option<Instant>,
        min_interval: Duration,
    ) -> ReconcileRun {
        if let Some(last) = last_run {
            if now.saturating_duration_since(last) < min_interval {
                trace!("Visibility reconciliation throttled.");
                return ReconcileRun::Throttled;
            }
        }
        let Some(_guard) = self.lock.try_acquire() else {
            trace!("Sync already in progress; rejecting visibility reconciliation.");
            return ReconcileRun::Rejected;
        };

        let corrections: Vec<(ItemId, bool)> = tree
            .iter()
            .filter(|item| !item.is_proxy())
            .filter_map(|item| {
                let live = item.bound_object.as_ref()?.resolve(scene)?;
                let visible = !scene.is_object_hidden(&live);
                (visible != item.is_visible).then(|| (item.id.clone(), visible))
            })
            .collect();

        let mut changed = Vec::new();
        for (id, visible) in corrections {
            if let Some(item) = tree.find_mut(&id) {
                item.is_visible = visible;
                note_change(&mut changed, &id);
            }
        }
        for proxy in tree.mirror_references() {
            note_change(&mut changed, &proxy);
        }

        debug!(changed = changed.len(), "Visibility reconciled from scene.");
        ReconcileRun::Completed { changed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn visible(tree: &OutlinerTree, id: &str) -> bool {
        tree.find(id).unwrap().is_visible
    }

    #[test]
    fn hiding_an_item_hides_only_its_own_object() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        let engine = VisibilitySyncEngine::default();

        let outcome = engine.set_visible(&mut tree, &mut scene, "1ATN", false);

        assert_eq!(outcome.changed(), &[ItemId::from("1ATN")]);
        assert!(!visible(&tree, "1ATN"));
        assert!(visible(&tree, "A"));
        assert!(visible(&tree, "D1"));
        assert!(scene.state(PROTEIN_OBJECT).unwrap().hidden);
        assert!(!scene.state(D1_OBJECT).unwrap().hidden);
    }

    #[test]
    fn proxy_click_hides_referent_and_remirrors() {
        let mut tree = scenario_tree();
        with_group(&mut tree);
        let mut scene = scenario_scene();
        let engine = VisibilitySyncEngine::default();

        let outcome = engine.toggle_visible(&mut tree, &mut scene, "G1_ref_D2");

        assert!(!visible(&tree, "D2"));
        assert!(!visible(&tree, "G1_ref_D2"));
        assert!(scene.state(D2_OBJECT).unwrap().hidden);
        assert_eq!(
            outcome.changed(),
            &[ItemId::from("D2"), ItemId::from("G1_ref_D2")]
        );
    }

    #[test]
    fn hiding_an_item_whose_object_was_deleted_updates_only_the_flag() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        assert!(scene.external_delete(D1_OBJECT));
        let engine = VisibilitySyncEngine::default();

        let outcome = engine.set_visible(&mut tree, &mut scene, "D1", false);

        assert_eq!(
            outcome,
            SyncOutcome::Applied {
                changed: vec![ItemId::from("D1")]
            }
        );
        assert!(!visible(&tree, "D1"));
        assert!(!scene.contains(D1_OBJECT));

        let outcome = engine.toggle_visible(&mut tree, &mut scene, "D1");
        assert!(outcome.is_applied());
        assert!(visible(&tree, "D1"));
        assert!(!engine.lock().is_held());
    }

    #[test]
    fn unknown_and_rejected_calls_touch_nothing() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        let engine = VisibilitySyncEngine::default();

        assert_eq!(
            engine.set_visible(&mut tree, &mut scene, "ghost", false),
            SyncOutcome::NotFound
        );

        let _held = engine.lock().try_acquire().unwrap();
        assert_eq!(
            engine.set_visible(&mut tree, &mut scene, "D1", false),
            SyncOutcome::Rejected
        );
        assert!(visible(&tree, "D1"));
    }

    #[test]
    fn throttled_reconcile_respects_min_interval() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        scene.external_hide(D1_OBJECT, true);
        let engine = VisibilitySyncEngine::default();
        let interval = Duration::from_millis(100);
        let start = Instant::now();

        let run = engine.reconcile_from_scene_throttled(
            &mut tree,
            &scene,
            start + Duration::from_millis(50),
            Some(start),
            interval,
        );
        assert_eq!(run, ReconcileRun::Throttled);
        assert!(visible(&tree, "D1"));

        let run = engine.reconcile_from_scene_throttled(
            &mut tree,
            &scene,
            start + Duration::from_millis(150),
            Some(start),
            interval,
        );
        assert_eq!(
            run,
            ReconcileRun::Completed {
                changed: vec![ItemId::from("D1")]
            }
        );
        assert!(!visible(&tree, "D1"));
    }

    #[test]
    fn first_reconcile_is_never_throttled() {
        let mut tree = scenario_tree();
        let scene = scenario_scene();
        let engine = VisibilitySyncEngine::default();

        let run = engine.reconcile_from_scene_throttled(
            &mut tree,
            &scene,
            Instant::now(),
            None,
            Duration::from_secs(10),
        );
        assert!(run.ran());
        assert!(!run.changed_any());
    }

    #[test]
    fn vanished_objects_keep_their_visibility_flag() {
        let mut tree = scenario_tree();
        let mut scene = scenario_scene();
        scene.external_delete(D2_OBJECT);
        let engine = VisibilitySyncEngine::default();

        let run = engine.reconcile_from_scene_throttled(
            &mut tree,
            &scene,
            Instant::now(),
            None,
            Duration::ZERO,
        );
        assert!(!run.changed_any());
        assert!(visible(&tree, "D2"));
    }
}
