//! tally-cli/src/main.rs
//!
//! Command-line front end for the reward engine. Every command prints its
//! result as JSON on stdout; logs go to stderr.

mod collaborators;
mod context;
mod input;

use std::path::PathBuf;
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;
use tally_common::models::RewardQuery;
use tally_core::services::{ClaimRequest, ProgressContext, ProgressRequest};

use crate::context::CliContext;

#[derive(Parser, Debug, Clone)]
#[command(name = "tally")]
#[command(author, version, about = "Tally - task-based rewards, points and tiers")]
pub struct Args {
    /// Keep everything in memory instead of Postgres.
    #[arg(long, default_value = "false")]
    pub in_memory: bool,

    /// Postgres connection URL (overrides TALLY_DATABASE_URL / DATABASE_URL).
    #[arg(long)]
    pub database_url: Option<String>,

    /// Do not run migrations on startup.
    #[arg(long, default_value = "false")]
    pub skip_migrations: bool,

    /// Reject progress without --task on multi-task rewards.
    #[arg(long, default_value = "false")]
    pub require_explicit_task: bool,

    /// Let events reach rewards outside their start/end window.
    #[arg(long, default_value = "false")]
    pub ignore_schedule: bool,

    /// Reward templates (JSON object or array) to create before the command runs.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Apply database migrations and exit.
    Migrate,
    /// Create reward templates from a JSON file.
    RewardCreate { file: PathBuf },
    /// Show one reward template.
    Reward { reward_id: Uuid },
    /// Delete a reward template and its activities.
    RewardDelete { reward_id: Uuid },
    /// List reward templates.
    Rewards {
        #[arg(long)]
        tenant: Option<Uuid>,
        #[arg(long, default_value = "false")]
        active_only: bool,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        per_page: u32,
    },
    /// Record progress on a reward task.
    Progress {
        #[arg(long)]
        reward: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        task: Option<Uuid>,
        #[arg(long, default_value = "1.0")]
        amount: f64,
        #[arg(long)]
        tenant: Option<Uuid>,
        #[arg(long, default_value = "false")]
        requires_verification: bool,
        #[arg(long)]
        note: Option<String>,
    },
    /// Redeem an earned reward.
    Claim {
        #[arg(long)]
        reward: Uuid,
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        voucher: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        issuer: Option<Uuid>,
    },
    /// Approve a pending verification.
    Approve {
        activity_id: Uuid,
        #[arg(long)]
        reviewer: Option<Uuid>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject a pending verification.
    Reject {
        activity_id: Uuid,
        #[arg(long)]
        reviewer: Option<Uuid>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Add (or with a negative delta, remove) points.
    Points {
        #[arg(long)]
        user: Uuid,
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
    },
    /// Show a user's tier.
    Tier { user: Uuid },
    /// Show a user's reward counts.
    Summary {
        user: Uuid,
        #[arg(long)]
        tenant: Option<Uuid>,
    },
    /// List a user's activities, newest first.
    Activities {
        user: Uuid,
        #[arg(long)]
        tenant: Option<Uuid>,
    },
    /// Feed engagement events (JSON object or array) through the triggers.
    Event { file: PathBuf },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let ctx = CliContext::new(&args).await.context("failed to start the reward engine")?;
    let result = run(&ctx, &args).await;
    ctx.finish().await;
    result
}

async fn run(ctx: &CliContext, args: &Args) -> anyhow::Result<()> {
    let engine = &ctx.engine;

    if let Some(seed) = &args.seed {
        let templates = input::load_templates(seed)?;
        info!("Seeding {} reward template(s) from {}", templates.len(), seed.display());
        for t in templates {
            engine.create_reward(t).await?;
        }
    }

    match &args.command {
        Command::Migrate => {
            // migrations already ran while building the context
            let status = if ctx.db.is_some() { "migrated" } else { "in-memory" };
            print_json(&json!({ "status": status }))?;
        }
        Command::RewardCreate { file } => {
            let mut created = Vec::new();
            for t in input::load_templates(file)? {
                created.push(engine.create_reward(t).await?);
            }
            print_json(&created)?;
        }
        Command::Reward { reward_id } => print_json(&engine.get_reward(*reward_id).await?)?,
        Command::RewardDelete { reward_id } => {
            engine.delete_reward(*reward_id).await?;
            print_json(&json!({ "deleted": reward_id }))?;
        }
        Command::Rewards { tenant, active_only, page, per_page } => {
            let query = RewardQuery {
                tenant_id: *tenant,
                active_only: *active_only,
                visible_at: None,
                page: *page,
                per_page: *per_page,
            };
            print_json(&engine.list_rewards(&query).await?)?;
        }
        Command::Progress { reward, user, task, amount, tenant, requires_verification, note } => {
            let req = ProgressRequest {
                context: ProgressContext {
                    requires_verification: *requires_verification,
                    note: note.clone(),
                    ..Default::default()
                },
                ..ProgressRequest::new(*reward, *task, *amount, *user, *tenant)
            };
            let outcome = engine.record_task_progress(&req).await?;
            print_json(&json!({
                "activity": outcome.activity,
                "justEarned": outcome.transition.just_earned,
                "pointsCredited": outcome.transition.credit_points,
            }))?;
        }
        Command::Claim { reward, user, voucher, note, issuer } => {
            let req = ClaimRequest {
                voucher_code: voucher.clone(),
                note: note.clone(),
                issuer_id: *issuer,
            };
            print_json(&engine.claim_reward(*reward, *user, req).await?)?;
        }
        Command::Approve { activity_id, reviewer, note } => {
            print_json(&engine.approve_verification(*activity_id, *reviewer, note.clone()).await?)?;
        }
        Command::Reject { activity_id, reviewer, note } => {
            print_json(&engine.reject_verification(*activity_id, *reviewer, note.clone()).await?)?;
        }
        Command::Points { user, delta } => print_json(&engine.update_user_points(*user, *delta).await?)?,
        Command::Tier { user } => print_json(&engine.get_user_tier_info(*user).await?)?,
        Command::Summary { user, tenant } => print_json(&engine.get_user_summary(*user, *tenant).await?)?,
        Command::Activities { user, tenant } => {
            print_json(&engine.get_user_activities(*user, *tenant).await?)?
        }
        Command::Event { file } => {
            let mut reports = Vec::new();
            for event in input::load_events(file)? {
                reports.push(engine.handle_event(&event).await);
            }
            print_json(&reports)?;
        }
    }
    Ok(())
}
