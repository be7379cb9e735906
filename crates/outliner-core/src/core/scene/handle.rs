use super::traits::SceneObjects;
use std::fmt;

/// Weak reference to a host scene object, by name.
///
/// Holding a handle says nothing about whether the object still exists: the user may have
/// deleted it from the host at any time. Every mutation goes through [`ObjectHandle::resolve`],
/// which yields a [`LiveObject`] only while the object is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    name: String,
}

impl ObjectHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks the object up in `scene`, returning `None` when it no longer exists.
    pub fn resolve<S: SceneObjects + ?Sized>(&self, scene: &S) -> Option<LiveObject> {
        scene.resolve(&self.name)
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Proof that an object existed in the scene at the moment it was resolved.
///
/// Only scene implementations construct these; engine code obtains them through
/// [`ObjectHandle::resolve`] and passes them straight back to the scene setters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveObject {
    name: String,
}

impl LiveObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.name.clone())
    }
}
