use super::error::PoseError;
use crate::core::models::ids::ItemId;
use crate::core::models::item::ItemKind;
use crate::core::models::tree::OutlinerTree;
use crate::core::scene::traits::SceneObjects;
use crate::core::scene::transform::Transform;
use tracing::{debug, info, instrument, warn};

/// The stored transform of one scene object, captured on behalf of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTransform {
    pub group_id: ItemId,
    pub group_name: String,
    pub object_name: String,
    pub transform: Transform,
}

/// A named arrangement of groups: the transforms of every object the groups cover.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePose {
    pub name: String,
    pub group_ids: Vec<ItemId>,
    pub transforms: Vec<GroupTransform>,
}

impl ScenePose {
    /// Display names of the pose's groups, as captured.
    pub fn group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for t in &self.transforms {
            if !names.contains(&t.group_name.as_str()) {
                names.push(&t.group_name);
            }
        }
        names
    }
}

/// Result of [`PoseLibrary::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoseApplication {
    /// Number of objects moved back to their stored transform.
    pub applied: usize,
    /// Stored objects that no longer exist in the scene.
    pub missing: Vec<String>,
}

/// Scene-level collection of saved poses, with one optional active entry.
///
/// Poses are addressed by their position in the library, which is the order they were
/// created in.
#[derive(Debug, Clone, Default)]
pub struct PoseLibrary {
    poses: Vec<ScenePose>,
    active: Option<usize>,
}

impl PoseLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    pub fn poses(&self) -> &[ScenePose] {
        &self.poses
    }

    pub fn get(&self, index: usize) -> Option<&ScenePose> {
        self.poses.get(index)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active(&self) -> Option<&ScenePose> {
        self.active.and_then(|index| self.poses.get(index))
    }

    pub fn set_active(&mut self, index: usize) -> Result<(), PoseError> {
        self.check_index(index)?;
        self.active = Some(index);
        Ok(())
    }

    /// Saves the current transforms of the given groups as a new pose and makes it active.
    ///
    /// Repeated group ids are collapsed. An empty `name` becomes `"Pose {n}"`.
    ///
    /// # Errors
    ///
    /// Returns [`PoseError::NoGroups`] for an empty group list and
    /// [`PoseError::GroupNotFound`] / [`PoseError::NotAGroup`] for ids that are not groups.
    #[instrument(skip(self, tree, scene), name = "create_pose")]
    pub fn create<S: SceneObjects + ?Sized>(
        &mut self,
        tree: &OutlinerTree,
        scene: &S,
        name: &str,
        group_ids: &[ItemId],
    ) -> Result<usize, PoseError> {
        let mut groups: Vec<ItemId> = Vec::with_capacity(group_ids.len());
        for id in group_ids {
            match tree.kind_of(id) {
                Some(ItemKind::Group) => {
                    if !groups.contains(id) {
                        groups.push(id.clone());
                    }
                }
                Some(found) => {
                    return Err(PoseError::NotAGroup {
                        id: id.clone(),
                        found,
                    });
                }
                None => return Err(PoseError::GroupNotFound(id.clone())),
            }
        }
        if groups.is_empty() {
            return Err(PoseError::NoGroups);
        }

        let name = match name.trim() {
            "" => format!("Pose {}", self.poses.len() + 1),
            trimmed => trimmed.to_string(),
        };
        let transforms = capture_groups(tree, scene, &groups);
        info!(
            pose = %name,
            groups = groups.len(),
            objects = transforms.len(),
            "Created pose."
        );
        self.poses.push(ScenePose {
            name,
            group_ids: groups,
            transforms,
        });
        let index = self.poses.len() - 1;
        self.active = Some(index);
        Ok(index)
    }

    /// Replaces the stored transforms of a pose with the current ones.
    ///
    /// Groups deleted since the pose was created are dropped from it.
    ///
    /// # Return
    ///
    /// The number of object transforms now stored.
    #[instrument(skip(self, tree, scene), name = "capture_pose")]
    pub fn capture<S: SceneObjects + ?Sized>(
        &mut self,
        tree: &OutlinerTree,
        scene: &S,
        index: usize,
    ) -> Result<usize, PoseError> {
        self.check_index(index)?;
        let pose = &mut self.poses[index];

        let (live, gone): (Vec<ItemId>, Vec<ItemId>) = pose
            .group_ids
            .drain(..)
            .partition(|id| tree.kind_of(id) == Some(ItemKind::Group));
        if !gone.is_empty() {
            warn!(pose = %pose.name, ?gone, "Dropping deleted groups from pose.");
        }
        pose.transforms = capture_groups(tree, scene, &live);
        pose.group_ids = live;

        debug!(pose = %pose.name, objects = pose.transforms.len(), "Captured pose.");
        Ok(pose.transforms.len())
    }

    /// Moves every stored object back to its saved transform and makes the pose active.
    ///
    /// Objects that no longer exist are skipped and listed in the result.
    #[instrument(skip(self, scene), name = "apply_pose")]
    pub fn apply<S: SceneObjects + ?Sized>(
        &mut self,
        scene: &mut S,
        index: usize,
    ) -> Result<PoseApplication, PoseError> {
        self.check_index(index)?;
        let pose = &self.poses[index];

        let mut result = PoseApplication::default();
        for stored in &pose.transforms {
            match scene.resolve(&stored.object_name) {
                Some(live) => {
                    scene.set_object_transform(&live, stored.transform);
                    result.applied += 1;
                }
                None => result.missing.push(stored.object_name.clone()),
            }
        }
        if !result.missing.is_empty() {
            warn!(pose = %pose.name, missing = ?result.missing, "Pose objects not found.");
        }
        info!(
            pose = %pose.name,
            applied = result.applied,
            total = pose.transforms.len(),
            "Applied pose."
        );
        self.active = Some(index);
        Ok(result)
    }

    /// # Return
    ///
    /// The previous name.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<String, PoseError> {
        self.check_index(index)?;
        let previous = std::mem::replace(&mut self.poses[index].name, name.to_string());
        debug!(from = %previous, to = name, "Renamed pose.");
        Ok(previous)
    }

    /// Removes a pose. The active entry keeps pointing at the same pose when it survives,
    /// otherwise at the last remaining one.
    pub fn delete(&mut self, index: usize) -> Result<ScenePose, PoseError> {
        self.check_index(index)?;
        let removed = self.poses.remove(index);
        self.active = match self.active {
            _ if self.poses.is_empty() => None,
            Some(active) if active > index => Some(active - 1),
            Some(active) if active >= self.poses.len() => Some(self.poses.len() - 1),
            other => other,
        };
        info!(pose = %removed.name, "Deleted pose.");
        Ok(removed)
    }

    fn check_index(&self, index: usize) -> Result<(), PoseError> {
        if index < self.poses.len() {
            Ok(())
        } else {
            Err(PoseError::InvalidIndex {
                index,
                len: self.poses.len(),
            })
        }
    }
}

/// Objects a group moves: a puppet's controller, then the bound objects of every member and
/// of the members' structural descendants, each listed once.
pub fn group_objects(tree: &OutlinerTree, group_id: &str) -> Vec<String> {
    let Some(group) = tree.find(group_id).filter(|g| g.kind == ItemKind::Group) else {
        return Vec::new();
    };
    let mut objects: Vec<String> = group.object_name().map(str::to_string).into_iter().collect();
    for member in &group.member_ids {
        collect_objects(tree, member, &mut objects);
    }
    objects
}

fn collect_objects(tree: &OutlinerTree, id: &str, out: &mut Vec<String>) {
    let Some(item) = tree.find(id) else {
        return;
    };
    if let Some(name) = item.object_name() {
        if !out.iter().any(|o| o == name) {
            out.push(name.to_string());
        }
    }
    for child in tree.children_of(id) {
        if !child.is_proxy() {
            collect_objects(tree, &child.id, out);
        }
    }
}

fn capture_groups<S: SceneObjects + ?Sized>(
    tree: &OutlinerTree,
    scene: &S,
    groups: &[ItemId],
) -> Vec<GroupTransform> {
    let mut transforms = Vec::new();
    for group_id in groups {
        let group_name = tree
            .find(group_id)
            .map(|g| g.display_name.clone())
            .unwrap_or_else(|| group_id.to_string());
        let objects = group_objects(tree, group_id);
        if objects.is_empty() {
            warn!(group = %group_id, "Group covers no scene objects.");
        }
        for object_name in objects {
            let Some(live) = scene.resolve(&object_name) else {
                debug!(group = %group_id, object = %object_name, "Skipping missing object.");
                continue;
            };
            transforms.push(GroupTransform {
                group_id: group_id.clone(),
                group_name: group_name.clone(),
                object_name,
                transform: scene.object_transform(&live),
            });
        }
    }
    transforms
}
