//! distcalc CLI: run the orchestrator or a worker agent, and inspect
//! expressions.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use distcalc::agent::Agent;
use distcalc::api;
use distcalc::config::{AgentConfig, Config};
use distcalc::db::{Backend, PgStore, SqliteStore, Store};
use distcalc::engine::Orchestrator;
use distcalc::model::Expression;
use distcalc::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;

#[derive(Parser)]
#[command(name = "distcalc", about = "Distributed arithmetic expression evaluation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the orchestrator HTTP server
    Serve,
    /// Run a worker agent against an orchestrator
    Agent {
        /// Orchestrator base URL (overrides ORCHESTRATOR_URL)
        #[arg(long)]
        orchestrator_url: Option<String>,
        /// Concurrent workers (overrides COMPUTING_POWER)
        #[arg(long)]
        computing_power: Option<usize>,
    },
    /// Expression operations, directly against the store
    Expr {
        #[command(subcommand)]
        action: ExprAction,
    },
}

#[derive(Subcommand)]
enum ExprAction {
    /// Submit an expression for evaluation
    Submit {
        /// Expression text, e.g. "(2+3)*4"
        expression: String,
        /// Owner of the expression
        #[arg(long, default_value = "cli")]
        owner: String,
    },
    /// List an owner's expressions
    List {
        #[arg(long, default_value = "cli")]
        owner: String,
    },
    /// Show an expression and its work items
    Show {
        /// Expression ID (full UUID or prefix)
        id: String,
        #[arg(long, default_value = "cli")]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = Config::from_env()?;
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "distcalc-orchestrator".to_string(),
                log_level: config.log_level.clone(),
            })?;

            let url = config.database_url.expose_secret().to_string();
            match Backend::from_url(&url)? {
                Backend::Sqlite => cmd_serve(SqliteStore::connect(&url).await?, config).await,
                Backend::Postgres => cmd_serve(PgStore::connect(&url).await?, config).await,
            }
        }
        Command::Agent {
            orchestrator_url,
            computing_power,
        } => {
            let mut config = AgentConfig::from_env();
            if let Some(url) = orchestrator_url {
                config.orchestrator_url = url.trim_end_matches('/').to_string();
            }
            if let Some(n) = computing_power {
                config.computing_power = n.max(1);
            }
            cmd_agent(config).await
        }
        Command::Expr { action } => {
            let config = Config::from_env()?;
            let url = config.database_url.expose_secret().to_string();
            match Backend::from_url(&url)? {
                Backend::Sqlite => {
                    cmd_expr(SqliteStore::connect(&url).await?, config, action).await
                }
                Backend::Postgres => cmd_expr(PgStore::connect(&url).await?, config, action).await,
            }
        }
    }
}

async fn cmd_serve<S: Store>(store: S, config: Config) -> anyhow::Result<()> {
    let orchestrator = Arc::new(Orchestrator::new(store, config.timings));
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    api::serve(orchestrator, listener, async {
        tokio::signal::ctrl_c().await.ok();
    })
    .await?;
    Ok(())
}

async fn cmd_agent(config: AgentConfig) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "distcalc-agent".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let agent = Agent::new(config)?;
    agent
        .run(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

async fn cmd_expr<S: Store>(store: S, config: Config, action: ExprAction) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(store, config.timings);

    match action {
        ExprAction::Submit { expression, owner } => {
            let expression = orchestrator.submit(&owner, &expression).await?;
            println!("Submitted: {} (status: {})", expression.id, expression.status);
            if let Some(result) = expression.result {
                println!("Result:    {result}");
            }
        }
        ExprAction::List { owner } => {
            let expressions = orchestrator.list_expressions(&owner).await?;
            if expressions.is_empty() {
                println!("No expressions found.");
                return Ok(());
            }

            println!(
                "{:<8}  {:<8}  {:<16}  {:<30}  CREATED",
                "ID", "STATUS", "RESULT", "EXPRESSION"
            );
            println!("{}", "-".repeat(90));
            for expression in &expressions {
                let short_id = &expression.id.to_string()[..8];
                println!(
                    "{:<8}  {:<8}  {:<16}  {:<30}  {}",
                    short_id,
                    expression.status.to_string(),
                    result_display(expression),
                    truncate(&expression.text, 30),
                    expression.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\n{} expression(s)", expressions.len());
        }
        ExprAction::Show { id, owner } => {
            let expression = find_expression(&orchestrator, &owner, &id).await?;
            let items = orchestrator.store().list_work_items(expression.id).await?;

            println!("ID:         {}", expression.id);
            println!("Owner:      {}", expression.owner_id);
            println!("Expression: {}", expression.text);
            println!("Status:     {}", expression.status);
            println!("Result:     {}", result_display(&expression));
            if let Some(ref error) = expression.error {
                println!("Error:      {error}");
            }
            println!("Created:    {}", expression.created_at);
            println!("Updated:    {}", expression.updated_at);

            if !items.is_empty() {
                println!("---");
                for item in &items {
                    println!(
                        "{}  {} {} {}  {:<8} {}ms  {}",
                        &item.id.to_string()[..8],
                        item.operand1,
                        item.operator,
                        item.operand2,
                        item.state.to_string(),
                        item.operation_time_ms,
                        item.result.map(|r| r.to_string()).unwrap_or("-".to_string())
                    );
                }
            }
        }
    }
    Ok(())
}

/// Resolve a full ID or a unique prefix among the owner's expressions.
async fn find_expression<S: Store>(
    orchestrator: &Orchestrator<S>,
    owner: &str,
    id: &str,
) -> anyhow::Result<Expression> {
    if let Ok(full) = id.parse() {
        return Ok(orchestrator.get_expression(full, owner).await?);
    }

    let expressions = orchestrator.list_expressions(owner).await?;
    let mut matches: Vec<_> = expressions
        .into_iter()
        .filter(|expression| expression.id.to_string().starts_with(id))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no expression matching prefix '{id}'"),
        1 => Ok(matches.remove(0)),
        n => anyhow::bail!("{n} expressions match prefix '{id}', be more specific"),
    }
}

fn result_display(expression: &Expression) -> String {
    expression
        .result
        .map(|r| r.to_string())
        .unwrap_or("-".to_string())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
