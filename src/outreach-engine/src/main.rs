//! Outreach Engine: review generated outreach drafts and follow the campaign
//! pipeline to completion.
//!
//! `serve` runs the development backend, `demo` reviews a locally generated
//! campaign, and `run` drives a campaign on a backend end to end.

mod report;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use outreach_backend::{BackendServer, MAX_REGEN_ROUNDS};
use outreach_core::{AppConfig, Campaign, Stage, StagePipeline, StageStatus};
use outreach_review::{CampaignInputs, Decision};
use outreach_sync::{CampaignSession, HttpBackend, SubmitOutcome};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "outreach-engine")]
#[command(about = "Review outreach drafts and track the campaign pipeline")]
#[command(version)]
struct Cli {
    /// Optional TOML config file; OUTREACH__* environment variables win over it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the development backend and its metrics exporter
    Serve {
        /// HTTP port (overrides config)
        #[arg(long, env = "OUTREACH__SERVER__HTTP_PORT")]
        http_port: Option<u16>,

        /// Metrics port (overrides config)
        #[arg(long, env = "OUTREACH__SERVER__METRICS_PORT")]
        metrics_port: Option<u16>,

        /// Delay per pipeline stage in milliseconds (overrides config)
        #[arg(long, env = "OUTREACH__SERVER__STAGE_DELAY_MS")]
        stage_delay_ms: Option<u64>,
    },
    /// Review a locally generated campaign without a backend
    Demo(ReviewArgs),
    /// Create a campaign on the backend, review it, and wait for it to finish
    Run {
        #[command(flatten)]
        review: ReviewArgs,

        /// Backend base URL (overrides config)
        #[arg(long, env = "OUTREACH__BACKEND__BASE_URL")]
        backend_url: Option<String>,

        /// Give up waiting on the backend after this many seconds
        #[arg(long, default_value_t = 300)]
        wait_secs: u64,
    },
}

#[derive(Args, Debug)]
struct ReviewArgs {
    /// Profile URL of the target
    #[arg(long)]
    url: Option<String>,

    /// Free-text profile; `Company:` and `Role:` lines are picked up
    #[arg(long)]
    text: Option<String>,

    /// Profile file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Decisions such as `email=approve sms=regen linkedin=skip`
    #[arg(long = "decide", value_name = "CHANNEL=DECISION", num_args = 1..)]
    decide: Vec<String>,
}

impl ReviewArgs {
    /// Collect the start inputs. A file's contents stand in for `--text` when
    /// no text was given.
    async fn inputs(&self) -> anyhow::Result<CampaignInputs> {
        let mut text = self.text.clone();
        if text.is_none() {
            if let Some(path) = &self.file {
                text = Some(tokio::fs::read_to_string(path).await?);
            }
        }
        let inputs = CampaignInputs {
            profile_url: self.url.clone(),
            text,
            file: self.file.clone(),
        };
        inputs.ensure_present()?;
        Ok(inputs)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.pretty);

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    match cli.command {
        Command::Serve {
            http_port,
            metrics_port,
            stage_delay_ms,
        } => {
            if let Some(port) = http_port {
                config.server.http_port = port;
            }
            if let Some(port) = metrics_port {
                config.server.metrics_port = port;
            }
            if let Some(delay) = stage_delay_ms {
                config.server.stage_delay_ms = delay;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Demo(review) => {
            config.validate()?;
            demo(config, review).await
        }
        Command::Run {
            review,
            backend_url,
            wait_secs,
        } => {
            if let Some(url) = backend_url {
                config.backend.base_url = url;
            }
            config.validate()?;
            run(config, review, Duration::from_secs(wait_secs)).await
        }
    }
}

fn init_tracing(pretty: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "outreach_engine=info,outreach_sync=info,outreach_backend=info,tower_http=info".into()
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if pretty {
        builder.init();
    } else {
        builder.json().init();
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!(
        http_port = config.server.http_port,
        metrics_port = config.server.metrics_port,
        stage_delay_ms = config.server.stage_delay_ms,
        "Outreach Engine backend starting up"
    );

    let server = BackendServer::new(config)?;
    if let Err(e) = server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    server.start_http().await
}

fn new_session(config: &AppConfig) -> anyhow::Result<CampaignSession> {
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    Ok(CampaignSession::new(backend, config)?)
}

fn record_decisions(session: &mut CampaignSession, tokens: &[String]) -> anyhow::Result<()> {
    for token in tokens {
        let (channel, decision) = session.record_token(token)?;
        info!(channel = %channel, decision = %decision, "Decision recorded");
    }
    Ok(())
}

async fn demo(config: AppConfig, args: ReviewArgs) -> anyhow::Result<()> {
    let mut session = new_session(&config)?;
    let campaign = session.start_demo(&args.inputs().await?)?;
    report::print_drafts(&campaign);

    record_decisions(&mut session, &args.decide)?;
    let (updated, batch) = session.apply_decisions()?;
    info!(campaign_id = %updated.id, decisions = batch.len(), "Decisions applied");

    if session.can_force_complete() {
        session.force_complete()?;
    } else {
        warn!("No decisions applied, campaign left awaiting approval");
    }

    if let Some(campaign) = session.campaign() {
        report::print_drafts(&campaign);
    }
    report::print_stages(&session.stage_snapshot());
    session.teardown();
    Ok(())
}

fn awaiting_review(campaign: &Campaign) -> bool {
    StagePipeline::status_of(campaign, Stage::Approval).status == StageStatus::Running
}

async fn wait_for<F>(
    session: &CampaignSession,
    wait: Duration,
    what: &str,
    predicate: F,
) -> anyhow::Result<Campaign>
where
    F: Fn(&Campaign) -> bool,
{
    tokio::time::timeout(wait, session.wait_until(predicate))
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for {what}"))?
        .ok_or_else(|| anyhow::anyhow!("polling stopped before {what}"))
}

async fn run(config: AppConfig, args: ReviewArgs, wait: Duration) -> anyhow::Result<()> {
    let mut session = new_session(&config)?;
    let request = args.inputs().await?.to_start_request()?;
    let created = session.start_remote(&request).await?;
    info!(campaign_id = %created.id, backend = %config.backend.base_url, "Campaign created");

    let mut ready = wait_for(&session, wait, "drafts", |c| {
        awaiting_review(c) || c.status.is_terminal()
    })
    .await?;
    record_decisions(&mut session, &args.decide)?;

    loop {
        report::print_drafts(&ready);
        if ready.status.is_terminal() {
            report::print_stages(&session.stage_snapshot());
            return Ok(());
        }

        let (applied, batch) = session.apply_decisions()?;
        match session.submit_decisions(&applied.id, &batch).await {
            SubmitOutcome::Submitted => {}
            SubmitOutcome::NothingToSubmit => {
                warn!(campaign_id = %ready.id, "No decisions given, leaving campaign awaiting approval");
                report::print_stages(&session.stage_snapshot());
                return Ok(());
            }
            SubmitOutcome::Failed(e) => {
                report::print_stages(&session.stage_snapshot());
                return Err(e.into());
            }
        }

        if batch.regen.is_empty() || ready.regen_round >= MAX_REGEN_ROUNDS {
            break;
        }
        let round = ready.regen_round;
        ready = wait_for(&session, wait, "regenerated drafts", |c| {
            (awaiting_review(c) && c.regen_round > round) || c.status.is_terminal()
        })
        .await?;
        info!(
            campaign_id = %ready.id,
            round = ready.regen_round,
            max_rounds = MAX_REGEN_ROUNDS,
            "Regenerated drafts ready for review"
        );
        // Follow-up rounds approve what was regenerated.
        for channel in &batch.regen {
            session.record_decision(*channel, Decision::Approve)?;
        }
    }

    let done = wait_for(&session, wait, "the campaign to finish", |c| c.status.is_terminal()).await?;

    report::print_drafts(&done);
    report::print_stages(&session.stage_snapshot());
    info!(campaign_id = %done.id, status = ?done.status, "Campaign finished");
    session.teardown();
    Ok(())
}
