//! services/client/src/bin/compare_bot.rs

use clap::{Parser, Subcommand};
use client_lib::{
    adapters::read_report,
    config::Config,
    error::ClientError,
    view::{render, Dashboard, Tab},
    workflow::{ClientContext, LoginOutcome, WorkflowEvent, INVALID_PDF_MESSAGE},
};
use compare_bot_core::domain::{UploadStatus, ValidationError, WeekNumber};
use compare_bot_core::ports::SessionSource;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Compare Bot - upload weekly reports and read their AI comparisons.
#[derive(Parser, Debug)]
#[command(name = "compare-bot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        client_id: String,
        #[arg(long, env = "COMPARE_BOT_PASSWORD")]
        password: String,
    },
    /// Sign in with the demo account.
    DemoLogin,
    /// Forget the stored session.
    Logout,
    /// Show who is signed in.
    Status,
    /// Upload a PDF report, then show its comparison.
    Upload {
        #[arg(long, value_parser = parse_week)]
        week: WeekNumber,
        path: PathBuf,
    },
    /// Show the comparison for a week, or the latest pair.
    Compare {
        #[arg(long, value_parser = parse_week)]
        week: Option<WeekNumber>,
    },
    /// List uploaded reports, newest week first.
    Reports,
    /// Run the dashboard interactively.
    Shell,
}

fn parse_week(raw: &str) -> Result<WeekNumber, ValidationError> {
    WeekNumber::parse(raw)
}

#[tokio::main]
async fn main() -> Result<ExitCode, ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api_url = %config.api_url, "configuration loaded");

    // --- 2. Build the Client Context & Restore the Session ---
    let (ctx, events) = ClientContext::from_config(&config)?;
    ctx.auth.initialize();

    // --- 3. Run the Command ---
    match cli.command {
        Commands::Login {
            client_id,
            password,
        } => {
            let outcome = ctx.auth.login_with_outcome(&client_id, &password).await;
            Ok(report_login(&ctx, outcome, render::INVALID_CREDENTIALS_MESSAGE))
        }
        Commands::DemoLogin => {
            let outcome = ctx.auth.demo_login().await;
            Ok(report_login(&ctx, outcome, render::DEMO_LOGIN_FAILED_MESSAGE))
        }
        Commands::Logout => {
            ctx.auth.logout();
            println!("Logged out.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status => match ctx.auth.current_session() {
            Some(session) => {
                println!("Signed in as {}", session.client_id);
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!("Not signed in.");
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Upload { week, path } => {
            if !signed_in(&ctx) {
                return Ok(ExitCode::FAILURE);
            }
            upload(ctx, events, week, path).await
        }
        Commands::Compare { week } => {
            if !signed_in(&ctx) {
                return Ok(ExitCode::FAILURE);
            }
            ctx.retrieval.fetch(week).await;
            println!("{}", render::retrieval(&ctx.retrieval.state()));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reports => {
            if !signed_in(&ctx) {
                return Ok(ExitCode::FAILURE);
            }
            let reports = ctx.list_reports().await?;
            println!("{}", render::reports(&reports));
            Ok(ExitCode::SUCCESS)
        }
        Commands::Shell => shell(ctx, events).await,
    }
}

fn report_login(ctx: &ClientContext, outcome: LoginOutcome, failure: &str) -> ExitCode {
    if let LoginOutcome::Transport(reason) = &outcome {
        debug!("login transport failure: {}", reason);
    }
    match ctx.auth.current_session() {
        Some(session) if outcome.is_authenticated() => {
            println!("Signed in as {}", session.client_id);
            ExitCode::SUCCESS
        }
        _ => {
            println!("{failure}");
            ExitCode::FAILURE
        }
    }
}

fn signed_in(ctx: &ClientContext) -> bool {
    if ctx.auth.current_session().is_some() {
        return true;
    }
    println!("Not signed in. Run `compare-bot login` first.");
    false
}

async fn upload(
    ctx: ClientContext,
    mut events: mpsc::UnboundedReceiver<WorkflowEvent>,
    week: WeekNumber,
    path: PathBuf,
) -> Result<ExitCode, ClientError> {
    let file = read_report(&path).await?;
    if !ctx.upload.select_file(file) {
        println!("{INVALID_PDF_MESSAGE}");
        return Ok(ExitCode::FAILURE);
    }
    match ctx.upload.submit(Some(week)).await {
        Some(UploadStatus::Success) => println!("{}", render::UPLOAD_SUCCESS_BANNER),
        Some(UploadStatus::Error(message)) => {
            println!("{message}");
            return Ok(ExitCode::FAILURE);
        }
        Some(UploadStatus::Idle) | None => return Ok(ExitCode::FAILURE),
    }

    // Follow the same path the dashboard takes after an upload.
    let mut dash = Dashboard::new(ctx);
    while let Some(event) = events.recv().await {
        let redirected = matches!(event, WorkflowEvent::UploadSucceeded { .. });
        dash.handle_event(event);
        if redirected {
            break;
        }
    }
    dash.settle().await;
    println!("{}", dash.render());
    Ok(ExitCode::SUCCESS)
}

//=========================================================================================
// Interactive shell
//=========================================================================================

const SHELL_HELP: &str = "\
commands:
  login <client_id> <password>   sign in
  demo                           sign in with the demo account
  tab upload|results             switch tabs
  file <path>                    select a PDF report
  week <n>                       set the week number
  upload                         upload the selected report
  search <n>                     show the comparison for week n
  refresh                        fetch the comparison again
  reports                        list uploaded reports
  logout                         sign out
  quit                           leave the shell";

async fn shell(
    ctx: ClientContext,
    mut events: mpsc::UnboundedReceiver<WorkflowEvent>,
) -> Result<ExitCode, ClientError> {
    let mut retrieval_rx = ctx.retrieval.subscribe();
    let mut upload_rx = ctx.upload.subscribe();
    let mut dash = Dashboard::new(ctx);
    dash.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}\n\n{SHELL_HELP}", dash.render());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !run_shell_command(&mut dash, line.trim()).await {
                    break;
                }
            }
            Some(event) = events.recv() => dash.handle_event(event),
            Ok(()) = retrieval_rx.changed() => {}
            Ok(()) = upload_rx.changed() => {}
        }
        println!("\n{}", dash.render());
    }

    info!("shell closed");
    Ok(ExitCode::SUCCESS)
}

/// Returns false when the shell should exit.
async fn run_shell_command(dash: &mut Dashboard, line: &str) -> bool {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return true;
    };
    let arg = words.next();

    match (command, arg) {
        ("quit" | "exit", _) => return false,
        ("help", _) => println!("{SHELL_HELP}"),
        ("login", Some(client_id)) => {
            let password = words.next().unwrap_or_default();
            dash.login(client_id, password).await;
        }
        ("demo", _) => {
            dash.demo_login().await;
        }
        ("logout", _) => dash.logout(),
        ("tab", Some("upload")) => dash.select_tab(Tab::Upload),
        ("tab", Some("results")) => dash.select_tab(Tab::Results),
        ("file", Some(path)) => match read_report(Path::new(path)).await {
            Ok(file) => {
                dash.select_file(file);
            }
            Err(e) => println!("! {e}"),
        },
        ("week", Some(week)) => dash.set_week_input(week),
        ("upload", _) => dash.submit_upload(),
        ("search", Some(week)) => dash.search(week),
        ("refresh", _) => dash.refresh(),
        ("reports", _) => match dash.context().list_reports().await {
            Ok(reports) => println!("{}", render::reports(&reports)),
            Err(e) => println!("! {e}"),
        },
        _ => println!("unknown command, try `help`"),
    }
    true
}
