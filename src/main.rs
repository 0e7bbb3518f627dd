use clap::Parser;
use phprefix::{
    PrefixError,
    cli::{Cli, Commands},
    infra::logging,
};

fn main() {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = cli.context();
    logging::init(ctx.verbose);

    let result = match cli.command {
        Commands::Prefix(args) => phprefix::prefix_run(args, &ctx),
        Commands::Symbols(args) => phprefix::symbols_run(args, &ctx),
        Commands::Autoload(args) => phprefix::autoload_run(args, &ctx),
        Commands::Init(args) => phprefix::infra::config_init(args, &ctx),
        Commands::Completions(args) => phprefix::completion::run(args, &ctx),
    };

    if let Err(err) = result {
        std::process::exit(report(err));
    }
}

/// Print a failure to stderr and pick the exit code.
fn report(err: anyhow::Error) -> i32 {
    match err.downcast::<PrefixError>() {
        Ok(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
        Err(other) => {
            eprintln!("Error: {other:#}");
            1
        }
    }
}
