use super::handle::LiveObject;
use super::transform::Transform;
use std::collections::HashSet;

/// The host scene as seen by the outliner.
///
/// Implementors wrap the host application's object registry. All setters receive a
/// [`LiveObject`] obtained from [`SceneObjects::resolve`] in the same call frame, so an
/// implementation may assume the object existed a moment ago but must still tolerate it
/// having vanished (the call is then a no-op).
pub trait SceneObjects {
    /// Resolves an object by name.
    ///
    /// # Return
    ///
    /// Returns `Some(LiveObject)` if an object of that name currently exists, otherwise `None`.
    fn resolve(&self, name: &str) -> Option<LiveObject>;

    /// Snapshot of the names of every currently selected object.
    fn selected_object_names(&self) -> HashSet<String>;

    fn is_object_selected(&self, object: &LiveObject) -> bool {
        self.selected_object_names().contains(object.name())
    }

    fn set_object_selected(&mut self, object: &LiveObject, selected: bool);

    fn is_object_hidden(&self, object: &LiveObject) -> bool;

    fn set_object_hidden(&mut self, object: &LiveObject, hidden: bool);

    fn active_object(&self) -> Option<LiveObject>;

    /// Sets or clears the active object.
    fn set_active_object(&mut self, object: Option<&LiveObject>);

    /// Current local transform of an object.
    fn object_transform(&self, object: &LiveObject) -> Transform;

    fn set_object_transform(&mut self, object: &LiveObject, transform: Transform);

    /// Asks the host to create an object (a domain mesh or a puppet controller).
    ///
    /// The host may pick a different name when `name` is taken; the returned object carries
    /// the name actually used.
    fn spawn_object(&mut self, name: &str) -> LiveObject;

    /// Deletes an object from the host.
    ///
    /// # Return
    ///
    /// Returns `true` if the object existed and was removed.
    fn remove_object(&mut self, object: &LiveObject) -> bool;
}

/// Callback invoked by the host after each scene graph update.
pub type SceneChangeCallback = Box<dyn FnMut(&mut dyn SceneObjects)>;

/// A host that notifies listeners after its scene graph changes.
pub trait SceneEventSource {
    fn register_change_callback(&mut self, callback: SceneChangeCallback);
}
