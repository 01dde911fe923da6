use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use courier::banner::{BannerInfo, SessionSummary, print_banner, print_session_summary};
use courier::commands::{CommandRegistry, CommandResult, SessionInfo};
use courier::config::Settings;
use courier::engine::Courier;
use courier::events::{Event, EventBus};
use courier::job::Origin;
use courier::node::NodeClient;
use courier::node::envelope::PlainEnvelopeBuilder;
use courier::node::http::HttpNodeClient;
use courier::notifier::Notifier;
use courier::notifier::console::ConsoleNotifier;
use courier::notifier::slack::SlackNotifier;
use courier::store::ThreadStore;

#[derive(Parser)]
#[command(
    name = "courier",
    version,
    about = "Carries prompts to an agent node and answers back to their threads."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    settings: Settings,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reconciliation loop with an operator console (default)
    Serve,
    /// Check that the node is reachable and exit
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings;
    courier::telemetry::init(settings.log_json);

    let call_timeout = settings.loop_config().call_timeout;
    let node: Arc<HttpNodeClient> = Arc::new(
        HttpNodeClient::new(
            &settings.node_url,
            Box::new(PlainEnvelopeBuilder::new(settings.identity())),
            settings.inbox_count,
        )
        .with_timeout(call_timeout),
    );

    match cli.command.unwrap_or(Command::Serve) {
        Command::Health => {
            node.health()
                .await
                .with_context(|| format!("node at {} is not healthy", settings.node_url))?;
            println!("node at {} is healthy", settings.node_url);
            Ok(())
        }
        Command::Serve => serve(settings, node).await,
    }
}

/// Counters fed by the event bus for the farewell summary.
#[derive(Default)]
struct Tally {
    dispatched: AtomicUsize,
    delivered: AtomicUsize,
}

/// Print deliveries as they happen and count them.
fn watch_events(events: &EventBus, tally: Arc<Tally>) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(Event::JobDispatched { .. }) => {
                    tally.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Event::AnswerDelivered {
                    job_id,
                    origin,
                    latency_ms,
                }) => {
                    tally.delivered.fetch_add(1, Ordering::Relaxed);
                    println!("\n  ✓ {job_id} answered {origin} after {latency_ms}ms");
                }
                Ok(Event::DeliveryFailed { job_id, reason }) => {
                    println!("\n  ✗ {job_id} delivery failed ({reason}), will retry");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn serve(settings: Settings, node: Arc<HttpNodeClient>) -> anyhow::Result<()> {
    let db = settings
        .db_path()
        .context("failed to prepare the database directory")?;
    let threads = ThreadStore::open(&db)?;
    let known_threads = threads.len();

    let (notifier, delivery): (Arc<dyn Notifier>, &str) = match &settings.slack_token {
        Some(token) if !token.is_empty() => (
            Arc::new(SlackNotifier::new(token).with_timeout(settings.loop_config().call_timeout)),
            "slack",
        ),
        _ => (Arc::new(ConsoleNotifier), "console"),
    };

    print_banner(&BannerInfo {
        node_url: &settings.node_url,
        node_name: &settings.node_name,
        agent: &settings.agent,
        profile: &settings.profile,
        device: &settings.device,
        delivery,
        db: &db,
        threads: known_threads,
    });

    let courier = Courier::new(
        node.clone(),
        notifier,
        threads,
        &settings.agent,
        settings.loop_config(),
    );

    let tally = Arc::new(Tally::default());
    let listener = watch_events(&courier.events, Arc::clone(&tally));

    let cancel = CancellationToken::new();
    let reconciler = Arc::clone(&courier.reconciler);
    let loop_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { reconciler.run(cancel).await }
    });

    let commands = CommandRegistry::new();
    let info = SessionInfo {
        courier: &courier,
        node: node.as_ref(),
        archive_path: settings.archive.as_deref(),
    };

    console(&commands, &info).await?;

    cancel.cancel();
    if let Err(e) = loop_handle.await {
        tracing::error!(error = %e, "reconciliation loop ended abnormally");
    }
    listener.abort();

    if let Err(e) = courier.threads.persist() {
        tracing::warn!(error = %e, "thread bindings could not be saved");
    }
    if let Some(path) = settings.archive.as_deref() {
        write_archive(&courier, path);
    }

    print_session_summary(SessionSummary {
        dispatched: tally.dispatched.load(Ordering::Relaxed),
        delivered: tally.delivered.load(Ordering::Relaxed),
        outstanding: courier.registry.snapshot().await.len(),
    });
    Ok(())
}

fn write_archive(courier: &Courier, path: &Path) {
    match courier.archive.write_snapshot(path) {
        Ok(()) => tracing::info!(path = %path.display(), records = courier.archive.len(), "archive written"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "archive write failed"),
    }
}

/// Read operator input until EOF, Ctrl+C or `/quit`. Plain lines are sent
/// as prompts from the console's own thread.
async fn console(commands: &CommandRegistry, info: &SessionInfo<'_>) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let origin = Origin::new("console", "console");

    loop {
        print!("\ncourier> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            result = lines.next_line() => {
                match result {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        println!();
                        break;
                    }
                    Err(e) => {
                        eprintln!("input error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match commands.dispatch(input, info).await {
            CommandResult::Quit => break,
            CommandResult::Handled | CommandResult::Failed(_) => continue,
            CommandResult::NotACommand => {}
        }

        match info
            .courier
            .dispatcher
            .dispatch_in_thread(input, origin.clone())
            .await
        {
            Ok(job_id) => println!("  → {job_id}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
