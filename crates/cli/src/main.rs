#![forbid(unsafe_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use lookout_api::ProviderRegistry;
use lookout_core::{ResourceDescriptor, ResourceKind, TtlPolicy};
use lookout_panel::DetailsController;
use lookout_store::TtlCache;
use serde_json::json;
use tracing::{error, info};

mod bridge;

#[derive(Parser, Debug)]
#[command(name = "lookoutctl", version, about = "Lookout resource details CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace for namespaced kinds
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    /// Kubeconfig context (default: current context)
    #[arg(long = "context", global = true, default_value = "")]
    context: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the details panel behind a JSON-lines stdio host
    Serve,
    /// Print the table of supported kinds
    Kinds,
    /// List kubeconfig contexts
    Contexts,
    /// Print the cache key for a resource
    Key {
        /// Kind name or short name, e.g. "pod", "pvc", "Deployment"
        kind: String,
        name: String,
        #[command(flatten)]
        generic: GenericArgs,
    },
    /// Fetch one resource's details payload
    Describe {
        /// Kind name or short name, e.g. "pod", "pvc", "Deployment"
        kind: String,
        name: String,
        #[command(flatten)]
        generic: GenericArgs,
    },
}

/// Extra target fields for the generic kind.
#[derive(clap::Args, Debug, Default)]
struct GenericArgs {
    /// apiVersion, e.g. "cert-manager.io/v1"
    #[arg(long = "api-version")]
    api_version: Option<String>,
    /// Concrete kind, e.g. "Certificate"
    #[arg(long = "resource-kind")]
    resource_kind: Option<String>,
    /// Plural resource name (defaults to lowercase kind + "s")
    #[arg(long = "plural")]
    plural: Option<String>,
    /// Treat the generic resource as namespaced
    #[arg(long = "namespaced", action = ArgAction::SetTrue)]
    namespaced: bool,
}

fn init_tracing() {
    let env = std::env::var("LOOKOUT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    // stdout carries the bridge protocol
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("LOOKOUT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid LOOKOUT_METRICS_ADDR; expected host:port");
        }
    }
}

fn descriptor_from_args(cli: &Cli, kind: &str, name: &str, generic: &GenericArgs) -> Result<ResourceDescriptor> {
    let kind = ResourceKind::parse(kind).ok_or_else(|| anyhow!("unknown kind: {}", kind))?;
    let mut d = ResourceDescriptor::new(kind, name, cli.context.clone());
    if kind == ResourceKind::Generic {
        if let Some(v) = &generic.api_version {
            d = d.with_extra("apiVersion", json!(v));
        }
        if let Some(k) = &generic.resource_kind {
            d = d.with_extra("kind", json!(k));
        }
        if let Some(p) = &generic.plural {
            d = d.with_extra("plural", json!(p));
        }
        d = d.with_extra("namespaced", json!(generic.namespaced));
    }
    if d.requires_namespace() {
        if let Some(ns) = &cli.namespace {
            d = d.with_namespace(ns.clone());
        }
    }
    d.validate()?;
    Ok(d)
}

async fn serve() -> Result<()> {
    let host = Arc::new(bridge::StdioHost::new());
    let cache = Arc::new(TtlCache::from_env());
    let controller = DetailsController::new(host.clone(), host.clone(), ProviderRegistry::in_proc(), cache);
    let handle = controller.handle();
    let task = tokio::spawn(controller.run());
    info!("serve: reading panel traffic from stdin");
    let pumped = bridge::pump_stdin(&host, &handle).await;
    handle.shutdown();
    if let Err(e) = task.await {
        error!(error = %e, "serve: controller task failed");
    }
    pumped
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve => serve().await?,
        Commands::Kinds => {
            let ttl = TtlPolicy::from_env();
            match cli.output {
                Output::Human => {
                    for k in ResourceKind::ALL {
                        let info = k.info();
                        let scope = if info.namespaced { "namespaced" } else { "cluster" };
                        let api_version = if info.api_version.is_empty() { "-" } else { info.api_version };
                        println!(
                            "{} • {} • {} • {} • ttl {}s",
                            info.name,
                            api_version,
                            scope,
                            info.update_command,
                            ttl.ttl_for(k).as_secs()
                        );
                    }
                }
                Output::Json => {
                    let rows: Vec<_> = ResourceKind::ALL
                        .iter()
                        .map(|k| {
                            let info = k.info();
                            json!({
                                "kind": info.name,
                                "aliases": info.aliases,
                                "apiVersion": info.api_version,
                                "plural": info.plural,
                                "namespaced": info.namespaced,
                                "template": info.template_id,
                                "updateCommand": info.update_command,
                                "ttlSecs": ttl.ttl_for(*k).as_secs(),
                                "sections": info.sections.iter().map(|s| s.key()).collect::<Vec<_>>(),
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&rows)?);
                }
            }
        }
        Commands::Contexts => {
            let (names, current) = lookout_kubehub::kube_contexts()?;
            match cli.output {
                Output::Human => {
                    for n in &names {
                        let mark = if current.as_deref() == Some(n.as_str()) { "*" } else { " " };
                        println!("{} {}", mark, n);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&json!({ "contexts": names, "current": current }))?),
            }
        }
        Commands::Key { kind, name, generic } => {
            let d = descriptor_from_args(&cli, kind, name, generic)?;
            match cli.output {
                Output::Human => println!("{}", d.cache_key()),
                Output::Json => println!("{}", serde_json::to_string_pretty(&json!({ "key": d.cache_key(), "descriptor": d }))?),
            }
        }
        Commands::Describe { kind, name, generic } => {
            let d = descriptor_from_args(&cli, kind, name, generic)?;
            info!(kind = %d.kind, name = %d.name, ns = ?d.namespace, "describe invoked");
            let t0 = Instant::now();
            let mut registry = ProviderRegistry::in_proc();
            match registry.fetch_details(d.kind, &d).await {
                Ok(payload) => {
                    info!(took_ms = %t0.elapsed().as_millis(), "describe ok");
                    match cli.output {
                        Output::Human => {
                            println!("{}", d.title());
                            let degraded = payload["degraded"].as_array().map(|a| a.len()).unwrap_or(0);
                            if degraded > 0 {
                                println!("(degraded: {})", payload["degraded"]);
                            }
                            println!("{}", serde_json::to_string_pretty(&payload)?);
                        }
                        Output::Json => println!("{}", serde_json::to_string(&payload)?),
                    }
                }
                Err(e) => {
                    error!(error = %e, "describe failed");
                    eprintln!("describe error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
