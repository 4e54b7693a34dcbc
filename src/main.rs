use std::env;
use std::io;
use std::process::ExitCode;

use localizei_cashback::FlowConfig;
use localizei_cashback::csv::{read_attempts, write_outcomes};
use localizei_cashback::replay::Replayer;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(LevelFilter::WARN.into()))
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: localizei-cashback <attempts.csv>");
        return ExitCode::from(2);
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let attempts = match read_attempts(path.clone()) {
        Ok(attempts) => attempts,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut replayer = Replayer::new(FlowConfig::default());
    let (attempt_sender, attempt_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in attempts {
            match result {
                Ok(attempt) => {
                    if attempt_sender.send(attempt).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    replayer.run(ReceiverStream::new(attempt_receiver)).await;

    if let Err(e) = write_outcomes(io::stdout().lock(), replayer.outcomes()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
