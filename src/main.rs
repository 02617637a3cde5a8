use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use apicontract::cli::commands::{self, EXIT_CONFIG, EXIT_FAILED, EXIT_PASSED};
use apicontract::cli::{Cli, Command, RunArgs};
use apicontract::error::ConfigError;
use apicontract::logging;
use apicontract::runner::CancelHandle;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match dispatch(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILED)
            }
        }
    }
}

async fn dispatch(command: Command) -> Result<u8> {
    match command {
        Command::Run(args) => run(args).await,
        Command::Schemas(args) => {
            let all_ok = commands::list_schemas(&args, &mut io::stdout().lock())?;
            Ok(if all_ok { EXIT_PASSED } else { EXIT_FAILED })
        }
        Command::History(args) => {
            commands::show_history(&args, &mut io::stdout().lock())?;
            Ok(EXIT_PASSED)
        }
    }
}

async fn run(args: RunArgs) -> Result<u8> {
    let plan = args.plan()?;
    let transport = commands::transport_for(&plan)?;

    let cancel = CancelHandle::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; abandoning remaining scenarios");
                cancel.cancel();
            }
        })
    };

    let result = commands::run_plan(plan, transport, &cancel).await;
    interrupt.abort();

    let summary = result?;
    Ok(commands::exit_code(&summary))
}
