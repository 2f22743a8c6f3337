use clap::Parser;
use training::pack::{run_pack, PackArgs};

fn main() -> anyhow::Result<()> {
    training::init_tracing();
    run_pack(&PackArgs::parse())?;
    Ok(())
}
