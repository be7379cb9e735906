use crate::cli::CheckArgs;
use crate::config::Scenario;
use crate::error::{CliError, Result};
use crate::runner::{Replay, StepOutcome, invariant_violations};
use crate::ui::StepTally;
use tracing::{error, info};

pub fn run(args: CheckArgs) -> Result<()> {
    let mut scenario = Scenario::from_file(&args.scenario.scenario)?;
    let config = scenario.sync_config(&args.scenario.set_values)?;
    let actions = std::mem::take(&mut scenario.actions);

    let mut replay = Replay::new(config, &scenario)?;
    let mut problems = invariant_violations(&replay.tree())
        .into_iter()
        .map(|v| format!("after import: {}", v))
        .collect::<Vec<_>>();

    let mut tally = StepTally::default();
    replay.run_all(&actions, |index, _action, outcome, replay| {
        tally.record(outcome);
        if let StepOutcome::Failed(reason) = outcome {
            problems.push(format!("step {}: {}", index + 1, reason));
        }
        for violation in invariant_violations(&replay.tree()) {
            problems.push(format!("step {}: {}", index + 1, violation));
        }
    });

    if problems.is_empty() {
        info!("{}", tally);
        println!("✓ All steps hold the outliner invariants ({}).", tally);
        return Ok(());
    }

    for problem in &problems {
        error!("{}", problem);
        println!("✗ {}", problem);
    }
    Err(CliError::Check(problems.len()))
}
