use clap::Parser;
use training::{RunArgs, RunConfig};

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    let cfg = RunConfig::resolve(RunArgs::parse())?;
    training::run(&cfg)?;
    Ok(())
}
