//! Main CLI entrypoint
// (c) 2026 OpenNetty contributors

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser as _;
use tokio_util::sync::CancellationToken;

use crate::cli::args::{CliArgs, Command};
use crate::config::{Document, Manager};
use crate::controller::Controller;
use crate::coordinator::Coordinator;
use crate::service::GatewayRegistry;
use crate::session::Credential;
use crate::worker::{GatewayEndpoint, GatewayWorker};

/// Parses arguments, sets up tracing, and runs the requested subcommand.
pub fn cli() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    let trace_level = if args.debug { "debug" } else { "info" };
    crate::util::setup(trace_level).inspect_err(|e| eprintln!("{e:?}"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(args))
}

async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let document = Manager::load(&args.config)
        .map_err(|e| anyhow::anyhow!("loading {}: {e}", args.config.display()))?
        .validate()?;

    let cancel = CancellationToken::new();
    let (workers, document) = spawn_workers(document, cancel.clone());
    let registry = GatewayRegistry::new(workers.clone());
    let coordinator = Coordinator::spawn(&document.endpoints, &workers, cancel.clone());

    let result = match args.command {
        Command::SwitchOn { endpoint } => run_controller_op(&document, &registry, &endpoint, |c| {
            Box::pin(async move { c.switch_on(&CancellationToken::new()).await.map_err(anyhow::Error::from) })
        })
        .await,
        Command::SwitchOff { endpoint } => run_controller_op(&document, &registry, &endpoint, |c| {
            Box::pin(async move { c.switch_off(&CancellationToken::new()).await.map_err(anyhow::Error::from) })
        })
        .await,
        Command::SetBrightness { endpoint, level } => {
            run_controller_op(&document, &registry, &endpoint, move |c| {
                Box::pin(async move {
                    c.set_brightness(level, &CancellationToken::new()).await.map(|_| ()).map_err(anyhow::Error::from)
                })
            })
            .await
        }
        Command::Observe { seconds } => observe(&coordinator, seconds).await,
    };

    cancel.cancel();
    result.map(|()| ExitCode::SUCCESS)
}

fn spawn_workers(document: Document, cancel: CancellationToken) -> (Vec<Arc<GatewayWorker>>, Document) {
    let mut workers = Vec::with_capacity(document.gateways.len());
    for gateway in &document.gateways {
        let endpoint = GatewayEndpoint {
            name: gateway.name.clone(),
            protocol: gateway.protocol,
            transport: gateway.transport.clone().into_descriptor(),
            credential: gateway.password.map(Credential::OpenPassword),
            open_deadline: Duration::from_secs(5),
        };
        let (worker, _handle) = GatewayWorker::spawn(endpoint, cancel.clone());
        workers.push(worker);
    }
    (workers, document)
}

async fn run_controller_op<'a, F>(
    document: &'a Document,
    registry: &'a GatewayRegistry,
    endpoint_name: &str,
    op: F,
) -> anyhow::Result<()>
where
    F: FnOnce(
        Controller<'a>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send + 'a>>,
{
    let endpoint = document
        .endpoints
        .iter()
        .find(|e| e.name == endpoint_name)
        .ok_or_else(|| anyhow::anyhow!("no such endpoint: {endpoint_name}"))?;
    let controller = Controller::new(endpoint, registry);
    op(controller).await
}

async fn observe(coordinator: &Coordinator, seconds: u64) -> anyhow::Result<()> {
    let mut rx = coordinator.subscribe();
    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            () = &mut deadline => return Ok(()),
            event = rx.recv() => {
                match event {
                    Ok(event) => println!("{event:?}"),
                    Err(_) => return Ok(()),
                }
            }
        }
    }
}
