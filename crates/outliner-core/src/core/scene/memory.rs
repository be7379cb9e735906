use super::handle::LiveObject;
use super::traits::{SceneChangeCallback, SceneEventSource, SceneObjects};
use super::transform::Transform;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObjectState {
    pub selected: bool,
    pub hidden: bool,
    pub transform: Transform,
}

/// A self-contained host scene.
///
/// Every mutation, whether it comes from the outliner through [`SceneObjects`] or from the
/// `external_*` methods standing in for the host's own UI, marks the scene dirty. Like a host
/// that batches its dependency-graph notifications, registered callbacks only run when
/// [`InMemoryScene::flush_events`] is called.
#[derive(Default)]
pub struct InMemoryScene {
    objects: BTreeMap<String, ObjectState>,
    active: Option<String>,
    dirty: bool,
    callbacks: Vec<SceneChangeCallback>,
}

impl InMemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        let mut scene = Self::new();
        for name in names {
            scene.add_object(name);
        }
        scene.dirty = false;
        scene
    }

    /// Adds an object, keeping the state of an existing one with the same name.
    pub fn add_object(&mut self, name: impl Into<String>) {
        self.objects.entry(name.into()).or_default();
        self.dirty = true;
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.contains_key(name)
    }

    pub fn state(&self, name: &str) -> Option<ObjectState> {
        self.objects.get(name).copied()
    }

    pub fn object_names(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replaces the whole selection, as a viewport box-select or a native outliner click does.
    ///
    /// Unknown names are ignored.
    pub fn external_select<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: HashSet<&str> = names.into_iter().collect();
        for (name, state) in &mut self.objects {
            state.selected = wanted.contains(name.as_str());
        }
        if let Some(active) = &self.active {
            if !wanted.contains(active.as_str()) {
                self.active = None;
            }
        }
        self.dirty = true;
    }

    /// Toggles the hidden flag of one object, as the eye icon of the host outliner does.
    pub fn external_hide(&mut self, name: &str, hidden: bool) -> bool {
        match self.objects.get_mut(name) {
            Some(state) => {
                state.hidden = hidden;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Moves an object, as dragging it in the viewport does.
    pub fn external_move(&mut self, name: &str, transform: Transform) -> bool {
        match self.objects.get_mut(name) {
            Some(state) => {
                state.transform = transform;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Deletes an object behind the outliner's back.
    pub fn external_delete(&mut self, name: &str) -> bool {
        let removed = self.objects.remove(name).is_some();
        if removed {
            if self.active.as_deref() == Some(name) {
                self.active = None;
            }
            self.dirty = true;
        }
        removed
    }

    /// Delivers one change notification to every registered callback if the scene changed
    /// since the last flush.
    ///
    /// # Return
    ///
    /// Returns `true` if callbacks were invoked.
    pub fn flush_events(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;

        let mut callbacks = std::mem::take(&mut self.callbacks);
        trace!(listeners = callbacks.len(), "Delivering scene change notification.");
        for callback in &mut callbacks {
            callback(self);
        }
        // Keep callbacks registered while the notification was being delivered.
        callbacks.append(&mut self.callbacks);
        self.callbacks = callbacks;
        true
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.objects.contains_key(name) {
            return name.to_string();
        }
        (1..)
            .map(|n| format!("{name}.{n:03}"))
            .find(|candidate| !self.objects.contains_key(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

impl fmt::Debug for InMemoryScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryScene")
            .field("objects", &self.objects)
            .field("active", &self.active)
            .field("dirty", &self.dirty)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl SceneObjects for InMemoryScene {
    fn resolve(&self, name: &str) -> Option<LiveObject> {
        self.objects.get_key_value(name).map(|(n, _)| LiveObject::new(n.clone()))
    }

    fn selected_object_names(&self) -> HashSet<String> {
        self.objects
            .iter()
            .filter(|(_, state)| state.selected)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn is_object_selected(&self, object: &LiveObject) -> bool {
        self.objects
            .get(object.name())
            .is_some_and(|state| state.selected)
    }

    fn set_object_selected(&mut self, object: &LiveObject, selected: bool) {
        if let Some(state) = self.objects.get_mut(object.name()) {
            if state.selected != selected {
                state.selected = selected;
                self.dirty = true;
            }
        }
    }

    fn is_object_hidden(&self, object: &LiveObject) -> bool {
        self.objects
            .get(object.name())
            .is_some_and(|state| state.hidden)
    }

    fn set_object_hidden(&mut self, object: &LiveObject, hidden: bool) {
        if let Some(state) = self.objects.get_mut(object.name()) {
            if state.hidden != hidden {
                state.hidden = hidden;
                self.dirty = true;
            }
        }
    }

    fn object_transform(&self, object: &LiveObject) -> Transform {
        self.objects
            .get(object.name())
            .map(|state| state.transform)
            .unwrap_or_default()
    }

    fn set_object_transform(&mut self, object: &LiveObject, transform: Transform) {
        if let Some(state) = self.objects.get_mut(object.name()) {
            if state.transform != transform {
                state.transform = transform;
                self.dirty = true;
            }
        }
    }

    fn active_object(&self) -> Option<LiveObject> {
        self.active
            .as_deref()
            .and_then(|name| SceneObjects::resolve(self, name))
    }

    fn set_active_object(&mut self, object: Option<&LiveObject>) {
        let next = object
            .filter(|o| self.objects.contains_key(o.name()))
            .map(|o| o.name().to_string());
        if next != self.active {
            self.active = next;
            self.dirty = true;
        }
    }

    fn spawn_object(&mut self, name: &str) -> LiveObject {
        let actual = self.unique_name(name);
        self.objects.insert(actual.clone(), ObjectState::default());
        self.dirty = true;
        LiveObject::new(actual)
    }

    fn remove_object(&mut self, object: &LiveObject) -> bool {
        self.external_delete(object.name())
    }
}

impl SceneEventSource for InMemoryScene {
    fn register_change_callback(&mut self, callback: SceneChangeCallback) {
        self.callbacks.push(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scene::handle::ObjectHandle;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn handle_resolution_tracks_object_lifetime() {
        let mut scene = InMemoryScene::with_objects(["1ATN", "1ATN_A_1_100"]);
        let handle = ObjectHandle::new("1ATN_A_1_100");

        assert!(handle.resolve(&scene).is_some());
        assert!(scene.external_delete("1ATN_A_1_100"));
        assert!(handle.resolve(&scene).is_none());
    }

    #[test]
    fn external_select_replaces_selection_and_drops_stale_active() {
        let mut scene = InMemoryScene::with_objects(["a", "b", "c"]);
        let a = scene.resolve("a").unwrap();
        scene.set_object_selected(&a, true);
        scene.set_active_object(Some(&a));

        scene.external_select(["b", "c", "missing"]);

        let selected = scene.selected_object_names();
        assert_eq!(selected.len(), 2);
        assert!(selected.contains("b") && selected.contains("c"));
        assert!(scene.active_object().is_none());
    }

    #[test]
    fn spawn_object_avoids_name_collisions() {
        let mut scene = InMemoryScene::with_objects(["Puppet_controller"]);
        let first = scene.spawn_object("Puppet_controller");
        let second = scene.spawn_object("Puppet_controller");

        assert_eq!(first.name(), "Puppet_controller.001");
        assert_eq!(second.name(), "Puppet_controller.002");
    }

    #[test]
    fn flush_delivers_once_per_batch_of_changes() {
        let mut scene = InMemoryScene::with_objects(["a"]);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        scene.register_change_callback(Box::new(move |_scene: &mut dyn SceneObjects| {
            counter.set(counter.get() + 1);
        }));

        assert!(!scene.flush_events());
        scene.external_hide("a", true);
        scene.external_select(["a"]);
        assert!(scene.flush_events());
        assert!(!scene.flush_events());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn mutations_made_inside_a_callback_wait_for_the_next_flush() {
        let mut scene = InMemoryScene::with_objects(["a"]);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        scene.register_change_callback(Box::new(move |scene: &mut dyn SceneObjects| {
            counter.set(counter.get() + 1);
            if let Some(a) = scene.resolve("a") {
                scene.set_object_hidden(&a, true);
            }
        }));

        scene.external_select(["a"]);
        assert!(scene.flush_events());
        assert!(scene.is_dirty());
        assert!(scene.flush_events());
        // Second delivery wrote the same hidden state, so the scene settles.
        assert!(!scene.is_dirty());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn transforms_default_to_identity_and_mark_changes() {
        let mut scene = InMemoryScene::with_objects(["a"]);
        let a = scene.resolve("a").unwrap();
        assert_eq!(scene.object_transform(&a), Transform::identity());

        let moved = Transform::at(nalgebra::Vector3::new(4.0, 0.0, -2.0));
        scene.set_object_transform(&a, moved);
        assert!(scene.is_dirty());
        assert_eq!(scene.state("a").unwrap().transform, moved);

        scene.flush_events();
        scene.set_object_transform(&a, moved);
        assert!(!scene.is_dirty());
        assert!(!scene.external_move("missing", moved));
    }

    #[test]
    fn setters_on_vanished_objects_are_ignored() {
        let mut scene = InMemoryScene::with_objects(["a"]);
        let a = scene.resolve("a").unwrap();
        scene.external_delete("a");

        scene.set_object_selected(&a, true);
        scene.set_object_hidden(&a, true);
        scene.set_active_object(Some(&a));

        assert!(scene.selected_object_names().is_empty());
        assert!(scene.active_name().is_none());
    }
}
