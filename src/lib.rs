pub mod cli;
pub mod diagnosis;
pub mod monitor;
pub mod probes;
pub mod report;
pub mod settings;
pub mod snapshot;
pub mod stimulus;
pub mod store;
pub mod utils;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::Cli;
use report::{ConsoleReporter, JsonReporter, Reporter};

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    utils::logging::init(cli.log_level());

    log::debug!("pastewatch {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("failed to start runtime: {err}");
            return ExitCode::from(cli::EXIT_FAILURE);
        }
    };

    let code = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("interrupt received, stopping");
                on_interrupt.cancel();
            }
        });

        let mut reporter: Box<dyn Reporter> = if cli.json {
            Box::new(JsonReporter::stdout())
        } else {
            Box::new(ConsoleReporter::stdout())
        };

        match cli::dispatch(&cli, &mut *reporter, cancel).await {
            Ok(code) => code,
            Err(err) => {
                log::error!("{err:#}");
                cli::EXIT_FAILURE
            }
        }
    });

    // A capture abandoned at its deadline may still be blocking a worker.
    runtime.shutdown_timeout(Duration::from_millis(250));
    ExitCode::from(code)
}
