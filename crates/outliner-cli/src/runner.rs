use crate::config::{Action, Scenario};
use crate::error::Result;
use protein_outliner::core::models::item::{ItemKind, ResidueRange};
use protein_outliner::core::models::tree::OutlinerTree;
use protein_outliner::core::scene::memory::InMemoryScene;
use protein_outliner::core::scene::transform::Transform;
use protein_outliner::engine::config::SyncConfig;
use protein_outliner::engine::events::{EventReporter, SyncEvent};
use protein_outliner::engine::query::chain_state_from_domains;
use protein_outliner::engine::state::SyncOutcome;
use protein_outliner::workflows::error::{PoseError, StructureError};
use protein_outliner::workflows::session::{OutlinerSession, register_with};
use nalgebra::Vector3;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Instant;
use tracing::{info, warn};

/// What happened to one scripted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    /// The action had no effect (unknown target or busy engine).
    Ignored(String),
    /// A structural action was refused.
    Refused(String),
    /// An `expect` action did not hold.
    Failed(String),
}

/// A session wired to an in-memory host, driven by scenario actions.
pub struct Replay {
    scene: InMemoryScene,
    session: Rc<RefCell<OutlinerSession>>,
    clock: Rc<Cell<Instant>>,
    redraws: Rc<Cell<usize>>,
}

impl Replay {
    pub fn new(config: SyncConfig, scenario: &Scenario) -> Result<Self> {
        let mut scene = InMemoryScene::with_objects(scenario.scene.objects.iter().cloned());
        let redraws = Rc::new(Cell::new(0));
        let clock = Rc::new(Cell::new(Instant::now()));

        let mut session = OutlinerSession::new(config);
        let counter = Rc::clone(&redraws);
        session.set_reporter(EventReporter::with_callback(Box::new(move |event: SyncEvent| {
            match event {
                SyncEvent::RedrawRequested => counter.set(counter.get() + 1),
                SyncEvent::Message(reason) => warn!("{}", reason),
                _ => {}
            }
        })));
        for structure in &scenario.structure {
            session.import_structure(&mut scene, structure)?;
        }

        let session = Rc::new(RefCell::new(session));
        let now = Rc::clone(&clock);
        register_with(&session, &mut scene, move || now.get());
        scene.flush_events();

        Ok(Self {
            scene,
            session,
            clock,
            redraws,
        })
    }

    pub fn tree(&self) -> Ref<'_, OutlinerTree> {
        Ref::map(self.session.borrow(), |session| session.tree())
    }

    pub fn scene(&self) -> &InMemoryScene {
        &self.scene
    }

    pub fn redraws(&self) -> usize {
        self.redraws.get()
    }

    /// Applies one action, then delivers the host's pending change notification.
    pub fn apply(&mut self, action: &Action) -> StepOutcome {
        let outcome = self.dispatch(action);
        self.scene.flush_events();
        outcome
    }

    fn dispatch(&mut self, action: &Action) -> StepOutcome {
        let scene = &mut self.scene;
        let mut session = self.session.borrow_mut();
        match action {
            Action::Select { item } => sync_step(session.click_select(scene, item)),
            Action::ToggleVisibility { item } => {
                sync_step(session.click_visibility(scene, item))
            }
            Action::SceneSelect { objects } => {
                scene.external_select(objects.iter().map(String::as_str));
                StepOutcome::Applied
            }
            Action::SceneHide { object, hidden } => {
                host_step(scene.external_hide(object, *hidden), object)
            }
            Action::SceneDelete { object } => host_step(scene.external_delete(object), object),
            Action::SceneMove {
                object,
                location,
                rotation,
                scale,
            } => {
                let transform = Transform::at(Vector3::from(*location))
                    .with_rotation(Vector3::from(*rotation))
                    .with_scale(Vector3::from(*scale));
                host_step(scene.external_move(object, transform), object)
            }
            Action::CreateDomain {
                chain,
                start,
                end,
                name,
            } => structure_step(session.create_domain(
                scene,
                chain,
                ResidueRange::new(*start, *end),
                name.as_deref(),
            )),
            Action::Split { item, at } => structure_step(session.split(scene, item, *at)),
            Action::Merge { a, b } => structure_step(session.merge_domains(scene, a, b)),
            Action::CreateGroup { name, members } => {
                structure_step(session.create_group(name, members))
            }
            Action::CreatePuppet { name, members } => {
                structure_step(session.create_puppet(scene, name, members))
            }
            Action::AddMembers { group, members } => {
                structure_step(session.add_members(group, members))
            }
            Action::RemoveMembers { group, members } => {
                structure_step(session.remove_members(scene, group, members))
            }
            Action::Delete { item } => structure_step(session.delete_item(scene, item)),
            Action::Rename { item, name } => structure_step(session.rename(item, name)),
            Action::CreatePose { name, groups } => {
                pose_step(session.create_pose(&*scene, name, groups))
            }
            Action::ApplyPose { pose } => match session.apply_pose(scene, *pose) {
                Ok(application) if !application.missing.is_empty() => StepOutcome::Ignored(
                    format!("missing objects: {}", application.missing.join(", ")),
                ),
                other => pose_step(other),
            },
            Action::CapturePose { pose } => pose_step(session.capture_pose(&*scene, *pose)),
            Action::RenamePose { pose, name } => pose_step(session.rename_pose(*pose, name)),
            Action::DeletePose { pose } => pose_step(session.delete_pose(*pose)),
            Action::Advance { .. } => {
                if let Some(step) = action.advance_by() {
                    self.clock.set(self.clock.get() + step);
                }
                StepOutcome::Applied
            }
            Action::Expect {
                item,
                selected,
                visible,
            } => expect_step(session.tree(), item, *selected, *visible),
            Action::ExpectLocation { object, location } => {
                expect_location_step(scene, object, *location)
            }
        }
    }

    /// Replays every action of a scenario, calling `on_step` after each one.
    pub fn run_all<F>(&mut self, actions: &[Action], mut on_step: F)
    where
        F: FnMut(usize, &Action, &StepOutcome, &Self),
    {
        for (index, action) in actions.iter().enumerate() {
            let outcome = self.apply(action);
            info!(step = index + 1, ?action, ?outcome, "Applied scenario action.");
            on_step(index, action, &outcome, self);
        }
    }
}

fn sync_step(outcome: SyncOutcome) -> StepOutcome {
    match outcome {
        SyncOutcome::Applied { .. } => StepOutcome::Applied,
        SyncOutcome::NotFound => StepOutcome::Ignored("item not found".to_string()),
        SyncOutcome::Rejected => StepOutcome::Ignored("sync already in progress".to_string()),
    }
}

fn host_step(found: bool, object: &str) -> StepOutcome {
    if found {
        StepOutcome::Applied
    } else {
        StepOutcome::Ignored(format!("no scene object named '{}'", object))
    }
}

fn structure_step<T>(result: std::result::Result<T, StructureError>) -> StepOutcome {
    match result {
        Ok(_) => StepOutcome::Applied,
        Err(e) => StepOutcome::Refused(e.to_string()),
    }
}

fn pose_step<T>(result: std::result::Result<T, PoseError>) -> StepOutcome {
    match result {
        Ok(_) => StepOutcome::Applied,
        Err(e) => StepOutcome::Refused(e.to_string()),
    }
}

fn expect_location_step(scene: &InMemoryScene, object: &str, location: [f64; 3]) -> StepOutcome {
    let Some(state) = scene.state(object) else {
        return StepOutcome::Failed(format!("expected object '{}' to exist", object));
    };
    let expected = Transform::at(Vector3::from(location));
    if (state.transform.location - expected.location).amax() <= 1e-6 {
        StepOutcome::Applied
    } else {
        StepOutcome::Failed(format!(
            "'{}': expected location {:?} (found {})",
            object, location, state.transform
        ))
    }
}

fn expect_step(
    tree: &OutlinerTree,
    id: &str,
    selected: Option<bool>,
    visible: Option<bool>,
) -> StepOutcome {
    let Some(item) = tree.find(id) else {
        return StepOutcome::Failed(format!("expected item '{}' to exist", id));
    };
    let mut problems = Vec::new();
    if let Some(expected) = selected.filter(|&s| s != item.is_selected) {
        problems.push(format!("selected={} (found {})", expected, item.is_selected));
    }
    if let Some(expected) = visible.filter(|&v| v != item.is_visible) {
        problems.push(format!("visible={} (found {})", expected, item.is_visible));
    }
    if problems.is_empty() {
        StepOutcome::Applied
    } else {
        StepOutcome::Failed(format!("'{}': expected {}", id, problems.join(", ")))
    }
}

/// Chain/domain consistency and reference-row mirroring, as human-readable violations.
pub fn invariant_violations(tree: &OutlinerTree) -> Vec<String> {
    let mut violations = Vec::new();

    for chain in tree.ids_of_kind(ItemKind::Chain) {
        let Some(expected) = chain_state_from_domains(tree, &chain) else {
            continue;
        };
        if let Some(item) = tree.find(&chain) {
            if item.is_selected != expected {
                violations.push(format!(
                    "chain '{}' is selected={} but its domains say {}",
                    chain, item.is_selected, expected
                ));
            }
        }
    }

    for proxy in tree.iter().filter(|item| item.is_proxy()) {
        let referent = proxy.referent.as_deref().and_then(|id| tree.find(id));
        match referent {
            Some(referent) => {
                if proxy.is_selected != referent.is_selected
                    || proxy.is_visible != referent.is_visible
                {
                    violations.push(format!(
                        "reference '{}' does not mirror '{}'",
                        proxy.id, referent.id
                    ));
                }
            }
            None => violations.push(format!("reference '{}' has no referent", proxy.id)),
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(toml_text: &str) -> Scenario {
        toml::from_str(toml_text).unwrap()
    }

    const BASE: &str = r#"
[[structure]]
id = "1ATN"
chains = [
    { label = "A", range = { start = 1, end = 200 } },
    { label = "D", range = { start = 1, end = 120 }, object = "1ATN_D" },
]
"#;

    fn replay_of(extra: &str) -> (Replay, Vec<Action>) {
        let mut scenario = scenario(&format!("{BASE}{extra}"));
        let config = scenario.sync_config(&[]).unwrap();
        let replay = Replay::new(config, &scenario).unwrap();
        (replay, scenario.actions)
    }

    #[test]
    fn import_creates_rows_and_objects() {
        let (replay, _) = replay_of("");

        assert_eq!(replay.tree().len(), 3);
        assert!(replay.scene().contains("1ATN"));
        assert!(replay.scene().contains("1ATN_D"));
    }

    #[test]
    fn split_then_select_keeps_invariants() {
        let (mut replay, actions) = replay_of(
            r#"
[[actions]]
type = "split"
item = "1ATN_chain_A"
at = 101

[[actions]]
type = "select"
item = "domain_1"

[[actions]]
type = "expect"
item = "1ATN_chain_A"
selected = false

[[actions]]
type = "select"
item = "domain_2"

[[actions]]
type = "expect"
item = "1ATN_chain_A"
selected = true
"#,
        );

        let mut outcomes = Vec::new();
        replay.run_all(&actions, |_, _, outcome, replay| {
            outcomes.push(outcome.clone());
            assert!(invariant_violations(&replay.tree()).is_empty());
        });

        assert!(outcomes.iter().all(|o| *o == StepOutcome::Applied), "{outcomes:?}");
        assert!(replay.scene().state("1ATN_A_1_100").unwrap().selected);
    }

    #[test]
    fn external_selection_reaches_the_tree_after_flush() {
        let (mut replay, actions) = replay_of(
            r#"
[[actions]]
type = "scene-select"
objects = ["1ATN_D"]

[[actions]]
type = "expect"
item = "1ATN_chain_D"
selected = true
"#,
        );

        let before = replay.redraws();
        let outcomes: Vec<StepOutcome> = actions.iter().map(|a| replay.apply(a)).collect();

        assert_eq!(outcomes, vec![StepOutcome::Applied, StepOutcome::Applied]);
        assert!(replay.redraws() > before);
    }

    #[test]
    fn visibility_follows_the_host_once_the_clock_advances() {
        let (mut replay, actions) = replay_of(
            r#"
[[actions]]
type = "advance"
ms = 500

[[actions]]
type = "scene-hide"
object = "1ATN_D"

[[actions]]
type = "expect"
item = "1ATN_chain_D"
visible = false
"#,
        );

        let outcomes: Vec<StepOutcome> = actions.iter().map(|a| replay.apply(a)).collect();
        assert_eq!(outcomes[2], StepOutcome::Applied);
    }

    #[test]
    fn applied_pose_moves_the_controller_back() {
        let (mut replay, actions) = replay_of(
            r#"
[[actions]]
type = "create-puppet"
name = "Arm"
members = ["1ATN_chain_D"]

[[actions]]
type = "scene-move"
object = "Arm_controller"
location = [4.0, 0.0, 0.0]

[[actions]]
type = "create-pose"
name = "Out"
groups = ["puppet_1"]

[[actions]]
type = "scene-move"
object = "Arm_controller"
location = [0.0, 0.0, 0.0]

[[actions]]
type = "apply-pose"
pose = 0

[[actions]]
type = "expect-location"
object = "Arm_controller"
location = [4.0, 0.0, 0.0]

[[actions]]
type = "rename-pose"
pose = 0
name = "Reach"

[[actions]]
type = "delete-pose"
pose = 0
"#,
        );

        let outcomes: Vec<StepOutcome> = actions.iter().map(|a| replay.apply(a)).collect();

        assert!(outcomes.iter().all(|o| *o == StepOutcome::Applied), "{outcomes:?}");
        assert!(replay.session.borrow().poses().is_empty());
    }

    #[test]
    fn pose_refusals_and_missing_objects_are_reported() {
        let (mut replay, _) = replay_of("");

        let refused = replay.apply(&Action::CreatePose {
            name: "Nothing".into(),
            groups: vec!["1ATN".into()],
        });
        assert!(matches!(refused, StepOutcome::Refused(reason) if reason.contains("not a group")));

        replay.apply(&Action::CreateGroup {
            name: "Tail".into(),
            members: vec!["1ATN_chain_D".into()],
        });
        replay.apply(&Action::CreatePose {
            name: String::new(),
            groups: vec!["group_1".into()],
        });
        replay.apply(&Action::SceneDelete { object: "1ATN_D".into() });

        let missing = replay.apply(&Action::ApplyPose { pose: 0 });
        assert!(matches!(missing, StepOutcome::Ignored(reason) if reason.contains("1ATN_D")));

        let failed = replay.apply(&Action::ExpectLocation {
            object: "1ATN_D".into(),
            location: [0.0; 3],
        });
        assert!(matches!(failed, StepOutcome::Failed(_)));
    }

    #[test]
    fn refusals_and_failed_expectations_are_reported() {
        let (mut replay, _) = replay_of("");

        let refused = replay.apply(&Action::Merge {
            a: "1ATN_chain_A".into(),
            b: "1ATN_chain_D".into(),
        });
        assert!(matches!(refused, StepOutcome::Refused(reason) if reason.contains("Chain")));

        let ignored = replay.apply(&Action::Select { item: "ghost".into() });
        assert!(matches!(ignored, StepOutcome::Ignored(_)));

        let failed = replay.apply(&Action::Expect {
            item: "1ATN".into(),
            selected: Some(true),
            visible: None,
        });
        assert!(matches!(failed, StepOutcome::Failed(_)));
    }
}
