//! rostersync - roster-driven directory and board provisioning
//!
//! Reads the people roster (CSV) and the realm definition (TOML), then
//! converges the remote directory and the collaboration boards onto that
//! desired state with the minimal set of remote operations. A change-volume
//! guard aborts the pass before any account write when the diff is larger
//! than the operator accepted.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;

use error::{CliError, CliResult};

use rostersync_boards::{BoardReconciler, BoardSummary};
use rostersync_reconciler::{run_pass, PassConfig, RunSummary};
use rostersync_rest::{BoardRestConfig, RestBoards, RestConfig, RestDirectory};
use rostersync_source::{build_role_graph, load_definition, load_roster};

/// Converge the directory and boards onto the roster.
#[derive(Parser)]
#[command(name = "rostersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the realm definition file (TOML).
    #[arg(long, value_name = "FILE")]
    definition: PathBuf,

    /// Path to the people roster (CSV).
    #[arg(long, value_name = "FILE")]
    roster: PathBuf,

    /// Plan and log everything, write nothing.
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON run summary on stdout when the pass completes.
    #[arg(long)]
    summary: bool,

    /// Skip the board membership pass even when board credentials are set.
    #[arg(long)]
    skip_boards: bool,

    /// Log filter directive (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    log_filter: String,

    /// Base URL of the identity server's admin API.
    #[arg(long, env = "ROSTERSYNC_IDP_URL", value_name = "URL")]
    idp_url: String,

    /// Admin username for the identity server.
    #[arg(long, env = "ROSTERSYNC_IDP_USERNAME")]
    idp_username: String,

    /// Admin password for the identity server.
    #[arg(long, env = "ROSTERSYNC_IDP_PASSWORD", hide_env_values = true)]
    idp_password: String,

    /// Base URL of the board server. Boards are skipped when unset.
    #[arg(long, env = "BOARDS_BASE_URL", value_name = "URL")]
    boards_url: Option<String>,

    /// Admin username for the board server.
    #[arg(long, env = "BOARDS_USERNAME")]
    boards_username: Option<String>,

    /// Admin password for the board server.
    #[arg(long, env = "BOARDS_PASSWORD", hide_env_values = true)]
    boards_password: Option<String>,
}

/// Combined outcome of both passes, printed with `--summary`.
#[derive(Debug, Serialize)]
struct CombinedSummary {
    directory: RunSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    boards: Option<BoardSummary>,
}

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_filter);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let definition = load_definition(&cli.definition)?;
    let desired = load_roster(&cli.roster)?;
    let table = definition.habilitation_table();
    let graph = build_role_graph(&definition.regions.aliases);

    info!(
        realm = %definition.realm.name,
        client_id = %definition.realm.client_id,
        desired_users = desired.len(),
        dry_run = cli.dry_run,
        "inputs loaded"
    );

    let directory = RestDirectory::connect(&RestConfig {
        base_url: cli.idp_url.clone(),
        realm: definition.realm.name.clone(),
        auth_realm: "master".to_string(),
        username: cli.idp_username.clone(),
        password: cli.idp_password.clone(),
        timeout_secs: 30,
    })
    .await?;

    let config = PassConfig {
        client_id: definition.realm.client_id.clone(),
        settings: definition.client.clone(),
        accepted_changes: definition.realm.accepted_changes,
        dry_run: cli.dry_run,
    };
    let directory_summary = run_pass(&directory, &config, &table, &graph, &desired).await?;

    let board_summary = match board_config(&cli)? {
        Some(board_config) if !cli.skip_boards => {
            let boards = RestBoards::connect(&board_config).await?;
            let admin = definition.admin_identity();
            let reconciler = BoardReconciler::new(&boards, &admin, cli.dry_run);
            Some(reconciler.reconcile(&desired).await?)
        }
        Some(_) => {
            info!("board pass skipped on request");
            None
        }
        None => {
            info!("no board server configured, skipping board pass");
            None
        }
    };

    if cli.summary {
        let combined = CombinedSummary {
            directory: directory_summary,
            boards: board_summary,
        };
        let json = serde_json::to_string_pretty(&combined)
            .map_err(|e| CliError::Config(format!("cannot serialize summary: {e}")))?;
        println!("{json}");
    }

    Ok(())
}

/// Board credentials are all-or-nothing: a partial set is an operator
/// mistake, not a reason to silently skip the pass.
fn board_config(cli: &Cli) -> CliResult<Option<BoardRestConfig>> {
    match (&cli.boards_url, &cli.boards_username, &cli.boards_password) {
        (Some(base_url), Some(username), Some(password)) => Ok(Some(BoardRestConfig {
            base_url: base_url.clone(),
            username: username.clone(),
            password: password.clone(),
            timeout_secs: 30,
        })),
        (None, None, None) => Ok(None),
        _ => {
            warn!("incomplete board credentials");
            Err(CliError::Config(
                "board credentials are all-or-nothing: set BOARDS_BASE_URL, \
                 BOARDS_USERNAME and BOARDS_PASSWORD together or not at all"
                    .to_string(),
            ))
        }
    }
}
