use clap::Parser;
use dmap_cli::Cli;
use miette::Result;

fn main() -> Result<()> {
    let args = Cli::parse();

    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .parse_default_env()
        .init();
    log::debug!("dmap {}", dmap_cli::VERSION);

    let stdout = std::io::stdout();
    dmap_cli::run(&args, &mut stdout.lock()).map_err(|e| miette::miette!("{:#}", e))
}
