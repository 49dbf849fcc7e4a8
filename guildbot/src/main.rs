use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use guildbot_cache::Cache;
use guildbot_metrics::PerformanceMonitor;
use guildbot_storage::{ConnectionPool, DataStore, QueryMethod, SqlParam};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod logging;
mod maintenance;

/// Data layer for the guildbot Discord bot.
#[derive(Debug, Parser)]
#[command(name = "guildbot", version, about)]
struct Cli {
    /// Extra configuration file layered over config/default and config/local
    #[arg(short, long, global = true, env = "GUILDBOT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open the database and run periodic maintenance until Ctrl-C
    Run,

    /// Execute one statement and print its output and the performance report
    Query {
        /// SQL text with `?` placeholders
        sql: String,

        /// Positional parameter; JSON literals bind as typed values, anything else as text
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// How to consume the result: all, get or run
        #[arg(short, long, default_value = "all")]
        method: QueryMethod,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        config::Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init_logging(&config.log)?;
    tracing::info!(database_url = %config.database_url, "Configuration loaded");

    let store = build_store(&config).await?;

    match cli.command {
        Command::Run => {
            if let Some(addr) = config.metrics_addr {
                install_prometheus(addr)?;
            }

            maintenance::run(&store, config.maintenance_interval(), async {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %error, "Failed to listen for Ctrl-C");
                }
            })
            .await;
        }
        Command::Query {
            sql,
            params,
            method,
        } => {
            let params: Vec<SqlParam> = params.iter().map(String::as_str).map(parse_param).collect();
            let output = store.query(&sql, &params, method).await?;

            let printed = serde_json::json!({
                "output": output,
                "report": store.report(),
            });
            println!("{}", serde_json::to_string_pretty(&printed)?);
        }
    }

    store.pool().close().await;
    Ok(())
}

async fn build_store(config: &config::Config) -> Result<DataStore> {
    let pool = ConnectionPool::new(&config.database_url, config.pool_config()?)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    let cache = Arc::new(Cache::new(config.cache_config()?));
    let monitor = Arc::new(PerformanceMonitor::new(config.monitor_config()?));

    Ok(DataStore::new(pool, cache, monitor))
}

fn install_prometheus(addr: std::net::SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Prefix("db_query_duration".to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0],
        )?
        .install()
        .context("failed to install Prometheus exporter")?;

    guildbot_metrics::facade::describe_metrics();
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// `5` binds an integer, `1.5` a real, `null` a NULL; anything that is not a JSON
/// scalar binds as text.
fn parse_param(raw: &str) -> SqlParam {
    match serde_json::from_str::<SqlParam>(raw) {
        Ok(SqlParam::Blob(_)) | Err(_) => SqlParam::Text(raw.to_string()),
        Ok(param) => param,
    }
}
