use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use voltcap::configuration::config::{CliArgs, Command, Config};
use voltcap::controller::{Controller, NoPrompt, OperatorPrompt, StdinPrompt};
use voltcap::fixtures;
use voltcap::network::bind_listener;
use voltcap::replay::FixtureServer;
use voltcap::storage::{verify_fixtures, FileStorage, FixtureStorage};

fn fail(message: String) -> ! {
    error!("{}", message);
    std::process::exit(1);
}

async fn capture(config: Config, storage: Arc<dyn FixtureStorage>) {
    let prompt: Arc<dyn OperatorPrompt> = if config.prompt {
        Arc::new(StdinPrompt)
    } else {
        Arc::new(NoPrompt)
    };
    let controller = Controller::new(config, storage, prompt)
        .unwrap_or_else(|e| fail(format!("Unable to create a controller instance: {}", e)));

    match controller.run().await {
        Ok(summary) => info!(
            "Run {} wrote {} fixture(s)",
            summary.run_id,
            summary.fixtures.len()
        ),
        Err(e) => fail(format!("Capture failed: {}", e)),
    }
}

fn verify(config: &Config, storage: &dyn FixtureStorage) {
    let checks = verify_fixtures(
        storage.root(),
        &config.expected_fixtures(),
        config.buffer_size,
    );
    let failed = checks.iter().filter(|c| !c.is_ok()).count();
    if failed > 0 {
        fail(format!(
            "{} of {} fixture(s) in {} failed verification",
            failed,
            checks.len(),
            storage.root().display()
        ));
    }
    info!("{} fixture(s) verified", checks.len());
}

async fn replay(config: &Config, storage: &dyn FixtureStorage, responses: Vec<String>) {
    let responses = if responses.is_empty() {
        vec![
            fixtures::INVOCATION_RESPONSE_SUCCESS.to_string(),
            fixtures::INVOCATION_RESPONSE_FAIL_CV.to_string(),
            fixtures::INVOCATION_RESPONSE_SELECT.to_string(),
        ]
    } else {
        responses
    };
    let server = FixtureServer::from_storage(storage, &responses)
        .unwrap_or_else(|e| fail(format!("Unable to load fixtures: {}", e)));
    let listener = bind_listener(&config.listen)
        .await
        .unwrap_or_else(|e| fail(format!("Unable to listen on {}: {}", config.listen, e)));

    tokio::select! {
        result = Arc::new(server).serve(listener) => {
            if let Err(e) = result {
                fail(format!("Replay stopped: {}", e));
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    env_logger::Builder::from_default_env()
        .filter_level(args.level_filter())
        .format_target(false)
        .init();

    let config = args
        .load_config()
        .unwrap_or_else(|e| fail(format!("Unable to load configuration: {}", e)));
    info!("Configuration imported successfully");

    let storage: Arc<dyn FixtureStorage> = Arc::new(
        FileStorage::for_config(&config)
            .unwrap_or_else(|e| fail(format!("Unable to open the output directory: {}", e))),
    );

    match args.command() {
        Command::Capture => capture(config, storage).await,
        Command::Verify => verify(&config, storage.as_ref()),
        Command::Replay { responses } => replay(&config, storage.as_ref(), responses).await,
    }
}
