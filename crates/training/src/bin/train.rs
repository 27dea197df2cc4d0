use clap::Parser;
use training::util::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = TrainArgs::parse();
    let outcome = run_train(args)?;
    log::info!("experiment saved in {}", outcome.experiment.root.display());
    Ok(())
}
