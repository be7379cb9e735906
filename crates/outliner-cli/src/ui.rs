use crate::runner::StepOutcome;
use protein_outliner::core::models::item::{ItemKind, OutlinerItem};
use protein_outliner::core::models::tree::OutlinerTree;
use std::fmt;

const INDENT: &str = "    ";

/// Renders the tree the way the outliner panel shows it: one row per item, indented by depth,
/// with the selection checkbox and the eye icon in front.
pub fn render_tree(tree: &OutlinerTree) -> String {
    tree.iter()
        .map(|item| render_row(item, tree.depth_of(&item.id)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_row(item: &OutlinerItem, depth: usize) -> String {
    let checkbox = if item.is_selected { "[x]" } else { "[ ]" };
    let eye = if item.is_visible { "👁" } else { "-" };
    let range = match (item.kind, item.range) {
        (ItemKind::Chain | ItemKind::Domain, Some(range)) => format!(" {}", range),
        _ => String::new(),
    };
    let kind = if item.is_puppet() {
        "Puppet".to_string()
    } else {
        item.kind.to_string()
    };
    format!(
        "{}{} {} {} ({}{})  [{}]",
        INDENT.repeat(depth),
        checkbox,
        eye,
        item.display_name,
        kind,
        range,
        item.id
    )
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StepTally {
    pub applied: usize,
    pub ignored: usize,
    pub refused: usize,
    pub failed: usize,
}

impl StepTally {
    pub fn record(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Applied => self.applied += 1,
            StepOutcome::Ignored(_) => self.ignored += 1,
            StepOutcome::Refused(_) => self.refused += 1,
            StepOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.applied + self.ignored + self.refused + self.failed
    }
}

impl fmt::Display for StepTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} step(s): {} applied, {} ignored, {} refused, {} failed",
            self.total(),
            self.applied,
            self.ignored,
            self.refused,
            self.failed
        )
    }
}

/// One-line note for a step that did not simply apply.
pub fn describe_outcome(step: usize, outcome: &StepOutcome) -> Option<String> {
    match outcome {
        StepOutcome::Applied => None,
        StepOutcome::Ignored(reason) => Some(format!("  step {}: ignored ({})", step, reason)),
        StepOutcome::Refused(reason) => Some(format!("  step {}: refused: {}", step, reason)),
        StepOutcome::Failed(reason) => Some(format!("  step {}: ✗ {}", step, reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protein_outliner::core::models::item::ResidueRange;

    #[test]
    fn rows_are_indented_by_depth_and_show_flags() {
        let mut tree = OutlinerTree::new();
        tree.add(OutlinerItem::protein("1ATN", "Actin")).unwrap();
        tree.add(
            OutlinerItem::chain("A", "1ATN", "Chain A", ResidueRange::new(1, 200))
                .with_selected(true)
                .with_visible(false),
        )
        .unwrap();

        let rendered = render_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "[ ] 👁 Actin (Protein)  [1ATN]");
        assert_eq!(lines[1], "    [x] - Chain A (Chain 1-200)  [A]");
    }

    #[test]
    fn tally_counts_each_outcome() {
        let mut tally = StepTally::default();
        tally.record(&StepOutcome::Applied);
        tally.record(&StepOutcome::Refused("no".into()));
        tally.record(&StepOutcome::Applied);

        assert_eq!(tally.total(), 3);
        assert_eq!(
            tally.to_string(),
            "3 step(s): 2 applied, 0 ignored, 1 refused, 0 failed"
        );
        assert!(describe_outcome(1, &StepOutcome::Applied).is_none());
    }
}
