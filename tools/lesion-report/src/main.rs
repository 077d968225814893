use clap::Parser;
use lesion_report::cli::Cli;

fn main() -> anyhow::Result<()> {
    lesion_report::runner::run(Cli::parse())
}
