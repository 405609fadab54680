//! `consultrec` - CLI for consultation persistence
//!
//! This binary records analyzed consultations to both sinks and lets the
//! user browse and prune the local history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::de::DeserializeOwned;

use consultrec::cli::output::{format_bytes, render_record, render_records, render_stats};
use consultrec::cli::{Cli, Command, ConfigCommand, HistoryCommand, RecordCommand};
use consultrec::sync::{Connectivity, ConnectivityFlag, InterfaceConnectivity, ReqwestTransport};
use consultrec::{
    init_logging, AnalysisResult, Config, ConsultationForm, Coordinator, RecordId, RecordStore,
    RemoteSyncClient, SqliteBlobStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Record(cmd) => handle_record(&config, &cmd),
        Command::History(cmd) => handle_history(&config, cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn open_store(config: &Config) -> Result<RecordStore> {
    let blobs = SqliteBlobStore::open(config.database_path(), config.storage.quota())?;
    Ok(RecordStore::new(blobs, &config.storage))
}

fn connectivity(config: &Config) -> Arc<dyn Connectivity> {
    if config.sync.assume_online {
        Arc::new(ConnectivityFlag::new(true))
    } else {
        Arc::new(InterfaceConnectivity::default())
    }
}

fn handle_record(config: &Config, cmd: &RecordCommand) -> Result<()> {
    let form: ConsultationForm = read_json(&cmd.form)?;
    let result: AnalysisResult = read_json(&cmd.result)?;
    form.validate()?;

    let store = Arc::new(open_store(config)?);
    let transport = Arc::new(ReqwestTransport::new()?);
    let sync = Arc::new(RemoteSyncClient::from_config(
        &config.sync,
        transport,
        connectivity(config),
    )?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let warning = runtime.block_on(async {
        Coordinator::new(store, sync)
            .record_outcome(&form, &result)
            .warning()
            .await
    });

    match warning {
        Some(warning) => eprintln!("{warning}"),
        None => println!("Consultation saved."),
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: HistoryCommand) -> Result<()> {
    let store = open_store(config)?;

    match cmd {
        HistoryCommand::List {
            search,
            limit,
            format,
        } => {
            let mut records = match search.as_deref() {
                Some(query) => store.search(query),
                None => store.list_recent(),
            };
            if let Some(limit) = limit {
                records.truncate(limit);
            }
            println!("{}", render_records(&records, format)?);
        }
        HistoryCommand::Show { id, json } => {
            let record = store
                .get(&RecordId::from(id.as_str()))
                .with_context(|| format!("no consultation with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!("{}", render_record(&record));
            }
        }
        HistoryCommand::Delete { id } => {
            if store.delete(&RecordId::from(id.as_str()))? {
                println!("Deleted consultation {id}.");
            } else {
                println!("No consultation with id {id}; nothing deleted.");
            }
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();
    let endpoint = config.sync.endpoint_url()?;
    let online = connectivity(config).is_online();

    if json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "blob_key": store.key(),
            "total_records": stats.total_records,
            "oldest_record": stats.oldest_record,
            "newest_record": stats.newest_record,
            "stored_bytes": stats.stored_bytes,
            "quota_bytes": stats.quota_bytes,
            "endpoint": endpoint.as_ref().map(ToString::to_string),
            "delivery": config.sync.delivery,
            "online": online,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("consultrec status");
        println!("-----------------");
        println!("Database:      {}", config.database_path().display());
        for line in render_stats(&stats) {
            println!("{line}");
        }
        println!(
            "Endpoint:      {}",
            endpoint.map_or_else(|| "not configured".to_string(), |url| url.to_string())
        );
        println!("Delivery:      {}", config.sync.delivery);
        println!("Online:        {}", if online { "yes" } else { "no" });
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let storage = &config.storage;
                let sync = &config.sync;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Blob key:           {}", storage.blob_key);
                println!(
                    "  Quota:              {}",
                    storage
                        .quota()
                        .map_or_else(|| "unlimited".to_string(), format_bytes)
                );
                println!(
                    "  Eviction:           max({}, {}%)",
                    storage.min_eviction_batch, storage.eviction_percent
                );
                println!();
                println!("[Sync]");
                println!(
                    "  Endpoint:           {}",
                    sync.endpoint.as_deref().unwrap_or("not configured")
                );
                println!("  Attempt timeout:    {}s", sync.attempt_timeout_secs);
                println!(
                    "  Retries:            {} (backoff from {}ms)",
                    sync.max_retries, sync.backoff_base_ms
                );
                println!("  Delivery:           {}", sync.delivery);
                println!("  UTC offset:         {:+}h", sync.utc_offset_hours);
                println!("  Assume online:      {}", sync.assume_online);
                println!(
                    "  Timestamp sample:   {}",
                    sync.payload_format().render_timestamp(chrono::Utc::now())
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
