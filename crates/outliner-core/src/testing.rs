//! Shared fixtures for the in-crate test suites.

use crate::core::models::item::{OutlinerItem, ResidueRange};
use crate::core::models::tree::OutlinerTree;
use crate::core::scene::memory::InMemoryScene;

pub(crate) const PROTEIN_OBJECT: &str = "1ATN";
pub(crate) const D1_OBJECT: &str = "1ATN_A_1_100";
pub(crate) const D2_OBJECT: &str = "1ATN_A_101_200";
pub(crate) const CHAIN_D_OBJECT: &str = "1ATN_D";

/// Protein "1ATN" with Chain "A" (domains D1 = 1-100, D2 = 101-200) and Chain "D" (no domains).
///
/// Chain A is a pure organizational row; its domains carry the scene objects.
pub(crate) fn scenario_tree() -> OutlinerTree {
    let mut tree = OutlinerTree::new();
    tree.add(OutlinerItem::protein("1ATN", "1ATN").with_object(PROTEIN_OBJECT))
        .unwrap();
    tree.add(OutlinerItem::chain("A", "1ATN", "Chain A", ResidueRange::new(1, 200)))
        .unwrap();
    tree.add(
        OutlinerItem::domain("D1", "A", "D1", ResidueRange::new(1, 100)).with_object(D1_OBJECT),
    )
    .unwrap();
    tree.add(
        OutlinerItem::domain("D2", "A", "D2", ResidueRange::new(101, 200))
            .with_object(D2_OBJECT),
    )
    .unwrap();
    tree.add(
        OutlinerItem::chain("D", "1ATN", "Chain D", ResidueRange::new(1, 120))
            .with_object(CHAIN_D_OBJECT),
    )
    .unwrap();
    tree
}

pub(crate) fn scenario_scene() -> InMemoryScene {
    InMemoryScene::with_objects([PROTEIN_OBJECT, D1_OBJECT, D2_OBJECT, CHAIN_D_OBJECT])
}

/// Adds plain group "G1" with members Chain A and Domain D2 and builds its view.
pub(crate) fn with_group(tree: &mut OutlinerTree) {
    tree.add(OutlinerItem::group("G1", "G1", vec!["A".into(), "D2".into()]))
        .unwrap();
    tree.rebuild_group_view("G1");
}
