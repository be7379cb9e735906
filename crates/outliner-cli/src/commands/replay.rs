use crate::cli::ReplayArgs;
use crate::config::Scenario;
use crate::error::Result;
use crate::runner::Replay;
use crate::ui::{self, StepTally};
use tracing::info;

pub fn run(args: ReplayArgs) -> Result<()> {
    let mut scenario = Scenario::from_file(&args.scenario.scenario)?;
    let config = scenario.sync_config(&args.scenario.set_values)?;
    let actions = std::mem::take(&mut scenario.actions);

    info!(
        structures = scenario.structure.len(),
        actions = actions.len(),
        "Building session from scenario."
    );
    let mut replay = Replay::new(config, &scenario)?;

    let mut tally = StepTally::default();
    replay.run_all(&actions, |index, action, outcome, replay| {
        tally.record(outcome);
        if let Some(note) = ui::describe_outcome(index + 1, outcome) {
            println!("{}", note);
        }
        if args.every_step {
            println!("--- after step {}: {:?}", index + 1, action);
            println!("{}\n", ui::render_tree(&replay.tree()));
        }
    });

    if !args.every_step {
        println!("{}\n", ui::render_tree(&replay.tree()));
    }
    println!("{}", tally);
    println!("Redraws requested: {}", replay.redraws());
    Ok(())
}
