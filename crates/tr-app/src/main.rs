use clap::Parser;

use tr_app::cli::Cli;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    tr_app::pipeline::run(&cli)
}
