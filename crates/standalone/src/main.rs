use clap::{Parser, Subcommand};
use tokio::runtime::Builder;

use trackwrite_standalone::subcommands::{start, version};

use std::panic;
use std::process;

#[derive(Subcommand, Debug)]
enum Subcommands {
    Start(start::StartArgs),
    /// Print the version of trackwrite
    Version,
}

#[derive(Parser, Debug)]
#[command(author, version, long_about=None, about=r#"
Mirror row store writes into a document index.

Example usage:
  trackwrite start --listen-addr 0.0.0.0:3000 --partitions 5
"#)]
struct Args {
    #[clap(subcommand)]
    command: Subcommands,
}

async fn async_main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Subcommands::Start(args) => start::exec(args).await,
        Subcommands::Version => version::exec(),
    }
}

fn main() -> anyhow::Result<()> {
    // take_hook() returns the default hook in case when a custom one is not set
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(1);
    }));

    // Create a multi-threaded run loop
    Builder::new_multi_thread().enable_all().build()?.block_on(async_main())
}
