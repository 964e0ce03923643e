//! CLI runner - executes commands

use crate::catalog::Catalog;
use crate::cli::commands::{Cli, Commands};
use crate::config::TapConfig;
use crate::engine::{CheckpointPolicy, SyncEngine};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::output::JsonLinesWriter;
use crate::state::{FileStateStore, MemoryStateStore, StateStore};
use crate::streams::{builtin_catalog, CJ_API_URL};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    cancel: CancellationToken,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop `read` at the next page boundary when this token fires
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the CLI command and return the process exit code
    pub async fn run(&self) -> Result<i32> {
        match &self.cli.command {
            Commands::Discover => self.discover(),
            Commands::Check => self.check().await,
            Commands::Read {
                streams,
                full_refresh,
                checkpoint_every,
            } => self.read(streams, *full_refresh, *checkpoint_every).await,
            Commands::Catalog => self.list_streams(),
        }
    }

    /// Load config; inline JSON takes precedence over the file
    fn load_config(&self) -> Result<TapConfig> {
        if let Some(json_str) = &self.cli.config_json {
            return TapConfig::from_json(json_str);
        }
        match &self.cli.config {
            Some(path) => TapConfig::from_file(path),
            None => Err(Error::config(
                "No config given (use --config or --config-json)",
            )),
        }
    }

    /// Built-in streams, adjusted by `--catalog` and the config
    fn load_catalog(&self, config: Option<&TapConfig>, streams: &[String]) -> Result<Catalog> {
        let mut catalog = builtin_catalog()?;
        if let Some(path) = &self.cli.catalog {
            catalog = catalog.merge(Catalog::read_file(path)?)?;
        }
        if let Some(size) = config.and_then(|c| c.page_size) {
            catalog = catalog.with_page_size(size)?;
        }
        if !streams.is_empty() {
            catalog = catalog.select_only(streams)?;
        }
        Ok(catalog)
    }

    fn state_store(&self) -> Arc<dyn StateStore> {
        match &self.cli.state {
            Some(path) => Arc::new(FileStateStore::new(path)),
            None => Arc::new(MemoryStateStore::new()),
        }
    }

    fn build_engine(&self, config: &TapConfig, catalog: Catalog) -> Result<SyncEngine> {
        let base_url = catalog.base_url().unwrap_or(CJ_API_URL).to_string();
        let client = HttpClient::with_auth(config.http_config(&base_url), config.auth())?;

        Ok(SyncEngine::new(client, catalog, self.state_store())?
            .with_config(config.sync_config())
            .with_tap_config(config.template_value().clone())
            .with_start_date(config.start_date()?)
            .with_cancellation(self.cancel.clone()))
    }

    /// Print the catalog document
    fn discover(&self) -> Result<i32> {
        let config = self.load_config().ok();
        let catalog = self.load_catalog(config.as_ref(), &[])?;
        self.output_message(&catalog.to_discovery_json());
        Ok(0)
    }

    /// Validate everything, then fetch the first page of the first stream
    async fn check(&self) -> Result<i32> {
        let config = self.load_config()?;
        let catalog = self.load_catalog(Some(&config), &[])?;
        let engine = self.build_engine(&config, catalog)?;

        let (status, message, code) = match engine.probe().await {
            Ok((stream, records)) => {
                info!(%stream, records, "Connection check succeeded");
                (
                    "SUCCEEDED",
                    format!("Fetched {records} records from '{stream}'"),
                    0,
                )
            }
            Err(e) => {
                error!(error = %e, "Connection check failed");
                ("FAILED", format!("Connection failed: {e}"), 1)
            }
        };

        self.output_message(&json!({
            "type": "CONNECTION_STATUS",
            "connectionStatus": {
                "status": status,
                "message": message
            }
        }));
        Ok(code)
    }

    /// Sync to stdout
    async fn read(
        &self,
        streams: &[String],
        full_refresh: bool,
        checkpoint_every: Option<u64>,
    ) -> Result<i32> {
        let config = self.load_config()?;
        let catalog = self.load_catalog(Some(&config), streams)?;

        let mut sync = config.sync_config().with_full_refresh(full_refresh);
        if let Some(pages) = checkpoint_every {
            if pages == 0 {
                return Err(Error::invalid_value(
                    "checkpoint-every",
                    "must be greater than zero",
                ));
            }
            sync = sync.with_checkpoint(CheckpointPolicy {
                every_pages: pages,
                ..config.checkpoint_policy()
            });
        }

        let engine = self.build_engine(&config, catalog)?.with_config(sync);
        let mut sink = JsonLinesWriter::stdout();
        let report = engine.run(&mut sink).await?;

        for stream in report.streams.iter().filter(|s| s.error.is_some()) {
            error!(
                stream = %stream.stream,
                error = stream.error.as_deref().unwrap_or_default(),
                "Stream did not complete"
            );
        }
        Ok(report.exit_code())
    }

    /// List stream names
    fn list_streams(&self) -> Result<i32> {
        let config = self.load_config().ok();
        let catalog = self.load_catalog(config.as_ref(), &[])?;
        self.output_message(&json!({
            "type": "STREAMS",
            "streams": catalog.names(),
            "selected": catalog.selected().map(|s| s.name.as_str()).collect::<Vec<_>>()
        }));
        Ok(0)
    }

    fn output_message(&self, msg: &Value) {
        println!("{msg}");
    }
}
