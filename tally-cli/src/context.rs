//! tally-cli/src/context.rs
//!
//! Builds the reward engine for one CLI invocation: storage backend,
//! effect dispatcher and the logging collaborators.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use tally_core::{Database, EngineConfig, Error, Repositories, RewardEngine};

use crate::collaborators::{LoggingBadgeEvaluator, LoggingNotifier};
use crate::Args;

pub struct CliContext {
    pub engine: RewardEngine,
    pub db: Option<Database>,
    dispatcher: JoinHandle<()>,
}

impl CliContext {
    pub async fn new(args: &Args) -> Result<Self, Error> {
        let mut config = EngineConfig::from_env()?;
        if let Some(url) = &args.database_url {
            config.database_url = url.clone();
        }
        if args.require_explicit_task {
            config.require_explicit_task = true;
        }
        if args.ignore_schedule {
            config.enforce_schedule = false;
        }

        let (repos, db) = if args.in_memory {
            info!("Using in-memory storage; nothing is persisted.");
            (Repositories::in_memory(), None)
        } else {
            let db = Database::new(&config.database_url, config.max_connections).await?;
            if !args.skip_migrations {
                db.migrate().await?;
            }
            (Repositories::postgres(db.pool().clone()), Some(db))
        };

        let (engine, rx) = RewardEngine::new(repos, &config).await?;
        let dispatcher = engine.start_dispatcher(
            rx,
            Arc::new(LoggingNotifier),
            Arc::new(LoggingBadgeEvaluator),
        );

        Ok(Self { engine, db, dispatcher })
    }

    /// Waits for queued notifications and badge work before the process exits.
    pub async fn finish(self) {
        self.engine.shutdown();
        if let Err(e) = self.dispatcher.await {
            tracing::error!("Effect dispatcher ended abnormally: {:?}", e);
        }
    }
}
