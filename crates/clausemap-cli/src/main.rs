mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use clausemap_core::{
    Alignment, ContractId, ContractStatus, Finding, FindingId, HeatMarker, align, project,
    should_fetch_findings,
};
use clausemap_sync::{ApiClient, CachedClient, ProgressMonitor, QueryCache, watch_until_terminal};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clausemap")]
#[command(about = "Place contract risk findings on the contract text", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Contract service API base URL
    #[arg(
        long,
        global = true,
        env = "CLAUSEMAP_API_BASE",
        default_value = "http://localhost:8080/api"
    )]
    api_base: String,

    /// Bearer token sent to the contract service
    #[arg(long, global = true, env = "CLAUSEMAP_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Align findings from a JSON file onto a local document
    Align {
        #[command(flatten)]
        input: LocalInput,
        /// Print the alignment as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show where findings start along a local document
    Heatmap {
        #[command(flatten)]
        input: LocalInput,
        /// Bar width in cells
        #[arg(long, default_value_t = 60)]
        width: usize,
        #[arg(long)]
        json: bool,
    },
    /// Follow a contract's analysis progress until it finishes
    Watch {
        #[arg(long)]
        contract: ContractId,
    },
    /// Fetch a contract with its findings, waiting for a running analysis first
    View {
        #[arg(long)]
        contract: ContractId,
        #[arg(long, default_value_t = 60)]
        width: usize,
        #[arg(long)]
        json: bool,
    },
    /// Start a fresh analysis of a contract
    Reanalyze {
        #[arg(long)]
        contract: ContractId,
        /// Follow the new job's progress until it finishes
        #[arg(long)]
        follow: bool,
    },
    /// Show reason and suggestion for one finding
    Inspect {
        #[arg(long)]
        finding: FindingId,
    },
}

#[derive(Args)]
struct LocalInput {
    /// Plain-text contract
    #[arg(long)]
    document: PathBuf,
    /// JSON array of `{id, clause, level}` findings
    #[arg(long)]
    findings: PathBuf,
}

#[derive(Serialize)]
struct Report<'a> {
    alignment: &'a Alignment<'a>,
    heatmap: &'a [HeatMarker],
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = || ApiClient::new(cli.api_base.clone()).with_token(cli.token.clone());

    match &cli.command {
        Command::Align { input, json } => {
            let (document, findings) = read_local(input)?;
            let alignment = align(&document, &findings);
            if *json {
                println!("{}", serde_json::to_string_pretty(&alignment)?);
            } else {
                display::print_alignment(&alignment);
            }
        }
        Command::Heatmap { input, width, json } => {
            let (document, findings) = read_local(input)?;
            let markers = project(&document, &findings);
            if *json {
                println!("{}", serde_json::to_string_pretty(&markers)?);
            } else {
                display::print_heatmap(&markers, *width);
            }
        }
        Command::Watch { contract } => watch(client(), *contract).await?,
        Command::View {
            contract,
            width,
            json,
        } => view(client(), *contract, *width, *json).await?,
        Command::Reanalyze { contract, follow } => {
            reanalyze(client(), *contract, *follow).await?
        }
        Command::Inspect { finding } => {
            let detail = client()
                .finding_detail(*finding)
                .await
                .with_context(|| format!("fetching finding {finding}"))?;
            display::print_finding_detail(&detail);
        }
    }

    Ok(())
}

fn read_local(input: &LocalInput) -> anyhow::Result<(String, Vec<Finding>)> {
    let document = read_text(&input.document)?;
    let raw = read_text(&input.findings)?;
    let findings: Vec<Finding> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing findings from {}", input.findings.display()))?;
    info!(findings = findings.len(), chars = document.chars().count(), "loaded local input");
    Ok((document, findings))
}

fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

async fn watch(client: ApiClient, id: ContractId) -> anyhow::Result<()> {
    follow_progress(client, Arc::new(QueryCache::new()), id).await
}

async fn reanalyze(client: ApiClient, id: ContractId, follow: bool) -> anyhow::Result<()> {
    let cache = Arc::new(QueryCache::new());
    let api = CachedClient::new(client.clone(), Arc::clone(&cache));
    let ack = api
        .reanalyze(id)
        .await
        .with_context(|| format!("requesting reanalysis of contract {id}"))?;
    println!("{}", display::reanalysis_line(&ack));

    if follow {
        follow_progress(client, cache, id).await?;
    }
    Ok(())
}

async fn follow_progress(
    client: ApiClient,
    cache: Arc<QueryCache>,
    id: ContractId,
) -> anyhow::Result<()> {
    let mut monitor = ProgressMonitor::new(client, cache);
    let last = watch_until_terminal(monitor.follow(id), |s| {
        println!("{}", display::progress_line(s))
    })
    .await;
    monitor.stop();

    if !last.terminal {
        bail!("progress feed for contract {id} closed before analysis finished");
    }
    Ok(())
}

async fn view(client: ApiClient, id: ContractId, width: usize, json: bool) -> anyhow::Result<()> {
    let cache = Arc::new(QueryCache::new());
    let api = CachedClient::new(client.clone(), Arc::clone(&cache));

    let mut contract = api
        .contract(id)
        .await
        .with_context(|| format!("fetching contract {id}"))?;

    let mut terminal_reached = false;
    if contract.status == ContractStatus::Analyzing {
        let mut monitor = ProgressMonitor::new(client, cache.clone());
        let last = watch_until_terminal(monitor.follow(id), |s| {
            eprintln!("{}", display::progress_line(s))
        })
        .await;
        monitor.stop();
        terminal_reached = last.terminal;

        if terminal_reached {
            // The terminal hook dropped the cached contract; this refetches it.
            contract = api
                .contract(id)
                .await
                .with_context(|| format!("refetching contract {id}"))?;
        }
    }

    if !should_fetch_findings(contract.status, terminal_reached) {
        bail!("contract {id} is still being analyzed and its progress feed closed");
    }
    if contract.status == ContractStatus::Failed {
        eprintln!("analysis of contract {id} failed; showing whatever findings exist");
    }

    let findings = api
        .findings(id)
        .await
        .with_context(|| format!("fetching findings for contract {id}"))?;
    let alignment = align(&contract.content, &findings);
    let markers = project(&contract.content, &findings);

    if json {
        let report = Report {
            alignment: &alignment,
            heatmap: &markers,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display::print_contract_card(&contract);
    display::print_heatmap(&markers, width);
    println!();
    display::print_alignment(&alignment);
    Ok(())
}
