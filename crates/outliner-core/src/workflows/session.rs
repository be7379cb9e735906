use super::error::{PoseError, StructureError};
use super::pose::{PoseApplication, PoseLibrary};
use super::structure::{self, ImportedStructure};
use crate::core::models::ids::ItemId;
use crate::core::models::item::ResidueRange;
use crate::core::models::tree::OutlinerTree;
use crate::core::scene::traits::{SceneEventSource, SceneObjects};
use crate::engine::config::SyncConfig;
use crate::engine::events::{EventReporter, SyncEvent};
use crate::engine::guard::SyncLock;
use crate::engine::selection::SelectionSyncEngine;
use crate::engine::state::SyncOutcome;
use crate::engine::visibility::VisibilitySyncEngine;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, trace};

/// One outliner bound to one host scene.
///
/// Owns the tree, both sync engines (sharing a single re-entrancy lock), the visibility
/// throttle clock and the last selection snapshot seen from the host.
pub struct OutlinerSession {
    tree: OutlinerTree,
    config: SyncConfig,
    selection: SelectionSyncEngine,
    visibility: VisibilitySyncEngine,
    last_visibility_run: Option<Instant>,
    last_snapshot: Option<HashSet<String>>,
    poses: PoseLibrary,
    reporter: EventReporter<'static>,
}

impl OutlinerSession {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_tree(OutlinerTree::new(), config)
    }

    pub fn with_tree(tree: OutlinerTree, config: SyncConfig) -> Self {
        let lock = SyncLock::new();
        Self {
            tree,
            selection: SelectionSyncEngine::with_lock(config.clone(), lock.clone()),
            visibility: VisibilitySyncEngine::new(lock),
            config,
            last_visibility_run: None,
            last_snapshot: None,
            poses: PoseLibrary::new(),
            reporter: EventReporter::new(),
        }
    }

    pub fn set_reporter(&mut self, reporter: EventReporter<'static>) {
        self.reporter = reporter;
    }

    pub fn tree(&self) -> &OutlinerTree {
        &self.tree
    }

    pub fn poses(&self) -> &PoseLibrary {
        &self.poses
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn selection_engine(&self) -> &SelectionSyncEngine {
        &self.selection
    }

    pub fn visibility_engine(&self) -> &VisibilitySyncEngine {
        &self.visibility
    }

    /// Click on a selection checkbox.
    pub fn click_select<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        item_id: &str,
    ) -> SyncOutcome {
        let outcome = self.selection.toggle(&mut self.tree, scene, item_id);
        if outcome.is_applied() {
            // Matches the host's echo of this change.
            self.last_snapshot = Some(scene.selected_object_names());
        }
        if outcome.needs_redraw() {
            self.reporter.report(SyncEvent::SelectionChanged {
                items: outcome.changed().len(),
            });
            self.reporter.report(SyncEvent::RedrawRequested);
        }
        outcome
    }

    /// Click on a visibility (eye) icon.
    pub fn click_visibility<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        item_id: &str,
    ) -> SyncOutcome {
        let outcome = self
            .visibility
            .toggle_visible(&mut self.tree, scene, item_id);
        if outcome.needs_redraw() {
            self.reporter.report(SyncEvent::VisibilityChanged {
                items: outcome.changed().len(),
            });
            self.reporter.report(SyncEvent::RedrawRequested);
        }
        outcome
    }

    /// Host notification that the scene graph changed.
    ///
    /// Selection is reconciled only when the set of selected objects differs from the last one
    /// seen (unless configured otherwise); visibility is reconciled at most once per
    /// `visibility_min_interval`.
    ///
    /// # Return
    ///
    /// Returns `true` if the outliner needs a redraw.
    pub fn on_scene_changed<S: SceneObjects + ?Sized>(&mut self, scene: &S, now: Instant) -> bool {
        let mut redraw = false;

        let snapshot = scene.selected_object_names();
        let snapshot_changed = self.last_snapshot.as_ref() != Some(&snapshot);
        if snapshot_changed || self.config.reconcile_on_unchanged_snapshot {
            let outcome = self.selection.reconcile_from_scene(&mut self.tree, scene);
            if outcome.is_applied() {
                self.last_snapshot = Some(snapshot);
            }
            if outcome.needs_redraw() {
                self.reporter.report(SyncEvent::SelectionChanged {
                    items: outcome.changed().len(),
                });
                redraw = true;
            }
        } else {
            trace!("Selection snapshot unchanged; skipping reconciliation.");
        }

        let run = self.visibility.reconcile_from_scene_throttled(
            &mut self.tree,
            scene,
            now,
            self.last_visibility_run,
            self.config.visibility_min_interval,
        );
        if run.ran() {
            self.last_visibility_run = Some(now);
        }
        if run.changed_any() {
            self.reporter.report(SyncEvent::VisibilityChanged {
                items: run.changed().len(),
            });
            redraw = true;
        }

        if redraw {
            self.reporter.report(SyncEvent::RedrawRequested);
        }
        redraw
    }

    pub fn import_structure<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        structure: &ImportedStructure,
    ) -> Result<ItemId, StructureError> {
        let result = structure::import_structure(&mut self.tree, scene, structure);
        self.structure_changed(result)
    }

    pub fn create_domain<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        chain_id: &str,
        range: ResidueRange,
        name: Option<&str>,
    ) -> Result<ItemId, StructureError> {
        let result = structure::create_domain(&mut self.tree, scene, chain_id, range, name);
        self.structure_changed(result)
    }

    pub fn split<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        target: &str,
        at: i32,
    ) -> Result<(ItemId, ItemId), StructureError> {
        let result = structure::split(&mut self.tree, scene, target, at);
        self.structure_changed(result)
    }

    pub fn merge_domains<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        a: &str,
        b: &str,
    ) -> Result<ItemId, StructureError> {
        let result = structure::merge_domains(&mut self.tree, scene, a, b);
        self.structure_changed(result)
    }

    pub fn create_group(
        &mut self,
        name: &str,
        members: &[ItemId],
    ) -> Result<ItemId, StructureError> {
        let result = structure::create_group(&mut self.tree, name, members);
        self.structure_changed(result)
    }

    pub fn create_puppet<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        name: &str,
        members: &[ItemId],
    ) -> Result<ItemId, StructureError> {
        let result = structure::create_puppet(&mut self.tree, scene, name, members);
        self.structure_changed(result)
    }

    pub fn add_members(
        &mut self,
        group_id: &str,
        members: &[ItemId],
    ) -> Result<usize, StructureError> {
        let result = structure::add_members(&mut self.tree, group_id, members);
        self.structure_changed(result)
    }

    pub fn remove_members<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        group_id: &str,
        members: &[ItemId],
    ) -> Result<usize, StructureError> {
        let result = structure::remove_members(&mut self.tree, scene, group_id, members);
        self.structure_changed(result)
    }

    pub fn delete_item<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        item_id: &str,
    ) -> Result<Vec<ItemId>, StructureError> {
        let result = structure::delete_item(&mut self.tree, scene, item_id);
        self.structure_changed(result)
    }

    pub fn rename(&mut self, item_id: &str, name: &str) -> Result<(), StructureError> {
        let result = structure::rename(&mut self.tree, item_id, name);
        self.structure_changed(result)
    }

    pub fn create_pose<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &S,
        name: &str,
        group_ids: &[ItemId],
    ) -> Result<usize, PoseError> {
        let result = self.poses.create(&self.tree, scene, name, group_ids);
        self.pose_changed(result)
    }

    pub fn capture_pose<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &S,
        index: usize,
    ) -> Result<usize, PoseError> {
        let result = self.poses.capture(&self.tree, scene, index);
        self.pose_changed(result)
    }

    /// Moves objects only; selection and visibility are not reconciled.
    pub fn apply_pose<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        index: usize,
    ) -> Result<PoseApplication, PoseError> {
        let result = self.poses.apply(scene, index);
        if let Ok(application) = &result {
            if !application.missing.is_empty() {
                self.reporter.report(SyncEvent::Message(format!(
                    "Applied {} of {} pose transforms; missing: {}",
                    application.applied,
                    application.applied + application.missing.len(),
                    application.missing.join(", ")
                )));
            }
        }
        self.pose_changed(result)
    }

    pub fn rename_pose(&mut self, index: usize, name: &str) -> Result<String, PoseError> {
        let result = self.poses.rename(index, name);
        self.pose_changed(result)
    }

    pub fn delete_pose(&mut self, index: usize) -> Result<(), PoseError> {
        let result = self.poses.delete(index).map(|_| ());
        self.pose_changed(result)
    }

    fn pose_changed<T>(&self, result: Result<T, PoseError>) -> Result<T, PoseError> {
        match &result {
            Ok(_) => {
                self.reporter.report(SyncEvent::PosesChanged);
                self.reporter.report(SyncEvent::RedrawRequested);
            }
            Err(e) => {
                debug!(error = %e, "Pose action refused.");
                self.reporter.report(SyncEvent::Message(e.to_string()));
            }
        }
        result
    }

    fn structure_changed<T>(
        &self,
        result: Result<T, StructureError>,
    ) -> Result<T, StructureError> {
        match &result {
            Ok(_) => {
                self.reporter.report(SyncEvent::StructureChanged);
                self.reporter.report(SyncEvent::RedrawRequested);
            }
            Err(e) => {
                debug!(error = %e, "Structural action refused.");
                self.reporter.report(SyncEvent::Message(e.to_string()));
            }
        }
        result
    }
}

/// Subscribes a shared session to a host's change notifications.
///
/// The callback holds only a weak reference, so dropping the session silences it. A
/// notification arriving while the session is already borrowed (the host firing synchronously
/// from inside one of our own scene writes) is dropped.
pub fn register_with<E, C>(session: &Rc<RefCell<OutlinerSession>>, source: &mut E, clock: C)
where
    E: SceneEventSource + ?Sized,
    C: Fn() -> Instant + 'static,
{
    let weak = Rc::downgrade(session);
    source.register_change_callback(Box::new(move |scene: &mut dyn SceneObjects| {
        let Some(session) = weak.upgrade() else {
            return;
        };
        match session.try_borrow_mut() {
            Ok(mut session) => {
                session.on_scene_changed(&*scene, clock());
            }
            Err(_) => trace!("Session busy; dropping nested scene notification."),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::memory::InMemoryScene;
    use crate::testing::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn recording_session() -> (OutlinerSession, Rc<RefCell<Vec<SyncEvent>>>) {
        let mut session = OutlinerSession::with_tree(scenario_tree(), SyncConfig::default());
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.set_reporter(EventReporter::with_callback(Box::new(move |event: SyncEvent| {
            sink.borrow_mut().push(event);
        })));
        (session, events)
    }

    #[test]
    fn click_select_reports_change_and_redraw() {
        let (mut session, events) = recording_session();
        let mut scene = scenario_scene();

        session.click_select(&mut scene, "A");

        assert_eq!(events.borrow().as_slice(), &[
            SyncEvent::SelectionChanged { items: 3 },
            SyncEvent::RedrawRequested
        ]);
    }

    #[test]
    fn echo_of_own_selection_change_is_skipped() {
        let (mut session, events) = recording_session();
        let mut scene = scenario_scene();
        let now = Instant::now();
        session.click_select(&mut scene, "D1");
        events.borrow_mut().clear();

        let redraw = session.on_scene_changed(&scene, now);

        assert!(!redraw);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn external_selection_is_reconciled_once() {
        let (mut session, _events) = recording_session();
        let mut scene = scenario_scene();
        let now = Instant::now();
        scene.external_select([D1_OBJECT, D2_OBJECT]);

        assert!(session.on_scene_changed(&scene, now));
        assert!(session.tree().find("A").unwrap().is_selected);
        assert!(!session.on_scene_changed(&scene, now + Duration::from_secs(1)));
    }

    #[test]
    fn visibility_reconciliation_is_throttled_between_notifications() {
        let (mut session, _events) = recording_session();
        let mut scene = scenario_scene();
        let start = Instant::now();
        session.on_scene_changed(&scene, start);

        scene.external_hide(D1_OBJECT, true);
        assert!(!session.on_scene_changed(&scene, start + Duration::from_millis(40)));
        assert!(session.tree().find("D1").unwrap().is_visible);

        assert!(session.on_scene_changed(&scene, start + Duration::from_millis(120)));
        assert!(!session.tree().find("D1").unwrap().is_visible);
    }

    #[test]
    fn refused_structural_action_reports_reason() {
        let (mut session, events) = recording_session();
        let mut scene = scenario_scene();

        let result = session.merge_domains(&mut scene, "D1", "D");

        assert!(result.is_err());
        assert!(matches!(
            events.borrow().as_slice(),
            [SyncEvent::Message(reason)] if reason.contains("expected a Domain")
        ));
    }

    #[test]
    fn pose_actions_report_changes_and_missing_objects() {
        let (mut session, events) = recording_session();
        let mut scene = scenario_scene();
        let group = session.create_group("Core", &["A".into()]).unwrap();
        events.borrow_mut().clear();

        let index = session.create_pose(&scene, "Rest", &[group]).unwrap();
        assert_eq!(session.poses().len(), 1);
        assert_eq!(events.borrow().as_slice(), &[
            SyncEvent::PosesChanged,
            SyncEvent::RedrawRequested
        ]);
        events.borrow_mut().clear();

        scene.external_delete(D2_OBJECT);
        let applied = session.apply_pose(&mut scene, index).unwrap();
        assert_eq!(applied.applied, 1);
        assert!(matches!(
            events.borrow().first(),
            Some(SyncEvent::Message(reason)) if reason.contains(D2_OBJECT)
        ));
        events.borrow_mut().clear();

        assert!(session.delete_pose(3).is_err());
        assert_eq!(events.borrow().as_slice(), &[SyncEvent::Message(
            "No pose at index 3 (the library holds 1)".into()
        )]);
    }

    #[test]
    fn registered_session_follows_host_notifications() {
        let session = Rc::new(RefCell::new(OutlinerSession::with_tree(
            scenario_tree(),
            SyncConfig::default(),
        )));
        let mut scene = scenario_scene();
        let start = Instant::now();
        let clock = Rc::new(Cell::new(start));
        let source = Rc::clone(&clock);
        register_with(&session, &mut scene, move || source.get());

        scene.external_select([CHAIN_D_OBJECT]);
        scene.external_hide(PROTEIN_OBJECT, true);
        assert!(scene.flush_events());

        let state = session.borrow();
        assert!(state.tree().find("D").unwrap().is_selected);
        assert!(!state.tree().find("1ATN").unwrap().is_visible);
    }

    #[test]
    fn notification_during_a_borrow_is_dropped() {
        let session = Rc::new(RefCell::new(OutlinerSession::with_tree(
            scenario_tree(),
            SyncConfig::default(),
        )));
        let mut scene = scenario_scene();
        register_with(&session, &mut scene, Instant::now);

        scene.external_select([D1_OBJECT]);
        {
            let _busy = session.borrow_mut();
            assert!(scene.flush_events());
        }
        assert!(!session.borrow().tree().find("D1").unwrap().is_selected);
    }

    #[test]
    fn dropped_session_silences_its_callback() {
        let session = Rc::new(RefCell::new(OutlinerSession::new(SyncConfig::default())));
        let mut scene = InMemoryScene::with_objects(["x"]);
        register_with(&session, &mut scene, Instant::now);
        drop(session);

        scene.external_select(["x"]);
        assert!(scene.flush_events());
    }
}
