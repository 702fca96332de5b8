//! EdgeStack Deploy - publish and resolve references between deployment units.
//!
//! Results are printed to stdout as JSON; logs go to stderr. A failed publish,
//! resolution, or plan exits non-zero, which aborts the surrounding
//! deployment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STORE_DIR` | `/var/lib/edgestack` | Durable reference store |
//! | `DEFAULT_REGION` | `us-east-1` | Region when `--region` is omitted |
//! | `LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `LOG_FORMAT` | `text` | `json` for JSON log lines |
//! | `RESOLVER_*` | see [`RetryPolicy::from_env`] | Retry bounds |

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use edgestack_core::{AwsRegion, EdgeStackConfig};
use edgestack_refs::{
    DeploymentPlan, FileReferenceStore, Orchestrator, ReferenceResolver, ReferenceStore,
    RetryPolicy,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{ApplyArgs, Cli, Command, PublishArgs, ResolveArgs};

/// Initialize the tracing subscriber, writing to stderr.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

fn region_or_default(region: Option<String>, config: &EdgeStackConfig) -> AwsRegion {
    region.map_or_else(|| config.default_region.clone(), AwsRegion::new)
}

fn publish(
    store: &dyn ReferenceStore,
    args: PublishArgs,
    config: &EdgeStackConfig,
) -> Result<serde_json::Value> {
    let region = region_or_default(args.region, config);
    let record = store
        .put(&region, &args.key, &args.value)
        .with_context(|| format!("failed to publish {} in {region}", args.key))?;
    info!(%region, key = %record.key, version = record.version, "published");
    Ok(serde_json::to_value(record)?)
}

async fn resolve(
    resolver: &ReferenceResolver,
    args: ResolveArgs,
    config: &EdgeStackConfig,
) -> Result<serde_json::Value> {
    let region = region_or_default(args.region, config);
    let timeout = args
        .timeout_secs
        .map_or(resolver.policy().timeout, Duration::from_secs);
    let resolved = resolver
        .resolve_within(&region, &args.key, timeout)
        .await
        .with_context(|| format!("failed to resolve {} in {region}", args.key))?;
    Ok(serde_json::to_value(resolved)?)
}

async fn apply(orchestrator: &Orchestrator, args: ApplyArgs) -> Result<serde_json::Value> {
    let raw = std::fs::read(&args.plan)
        .with_context(|| format!("failed to read plan {}", args.plan.display()))?;
    let plan: DeploymentPlan = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse plan {}", args.plan.display()))?;

    if args.check {
        let order: Vec<&str> = plan
            .ordered()
            .context("invalid deployment plan")?
            .into_iter()
            .map(|u| u.name.as_str())
            .collect();
        return Ok(serde_json::json!({ "order": order, "edges": plan.edges() }));
    }

    let report = orchestrator
        .apply(&plan)
        .await
        .context("deployment plan failed")?;
    Ok(serde_json::to_value(report)?)
}

/// Execute `cli` and return the JSON document to print.
async fn run(cli: Cli, config: &EdgeStackConfig, policy: RetryPolicy) -> Result<serde_json::Value> {
    let store_dir = cli.store_dir.unwrap_or_else(|| config.store_dir.clone());
    let store: Arc<dyn ReferenceStore> = Arc::new(
        FileReferenceStore::open(&store_dir)
            .with_context(|| format!("failed to open store at {}", store_dir.display()))?,
    );

    match cli.command {
        Command::Publish(args) => publish(store.as_ref(), args, config),
        Command::Resolve(args) => {
            let resolver = ReferenceResolver::new(store, policy);
            resolve(&resolver, args, config).await
        }
        Command::Apply(args) => apply(&Orchestrator::new(store, policy), args).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EdgeStackConfig::from_env();
    init_tracing(&config.log_level, config.log_json)?;

    let output = run(cli, &config, RetryPolicy::from_env()).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn cli(store: &Path, args: &[&str]) -> Cli {
        let mut argv = vec!["edgestack-deploy", "--store-dir", store.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(2)
            .initial_backoff(Duration::from_millis(5))
            .timeout(Duration::from_secs(1))
            .build()
    }

    #[tokio::test]
    async fn test_should_resolve_what_publish_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let config = EdgeStackConfig::default();

        let published = run(
            cli(dir.path(), &["publish", "-k", "/axumOnLambda/LambdaEdgeArn", "-v", "arn:3"]),
            &config,
            fast_policy(),
        )
        .await
        .unwrap();
        assert_eq!(published["version"], 1);
        assert_eq!(published["region"], "us-east-1");

        let resolved = run(
            cli(dir.path(), &["resolve", "-k", "/axumOnLambda/LambdaEdgeArn"]),
            &config,
            fast_policy(),
        )
        .await
        .unwrap();
        assert_eq!(resolved["value"], "arn:3");
        assert_eq!(resolved["attempts"], 1);
    }

    #[tokio::test]
    async fn test_should_fail_resolve_before_publish() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            cli(dir.path(), &["resolve", "-k", "/axumOnLambda/LambdaEdgeArn"]),
            &EdgeStackConfig::default(),
            fast_policy(),
        )
        .await
        .unwrap_err();
        assert!(format!("{err:#}").contains("not found after 2 attempts"));
    }

    #[tokio::test]
    async fn test_should_apply_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let plan = dir.path().join("plan.json");
        std::fs::write(
            &plan,
            r#"{"units":[
                {"name":"backend","region":"eu-west-1","dependsOn":["edge"],
                 "imports":[{"key":"/axumOnLambda/LambdaEdgeArn","as":"edgeArn"}]},
                {"name":"edge","region":"us-east-1",
                 "exports":[{"key":"/axumOnLambda/LambdaEdgeArn","value":"arn:9"}]}
            ]}"#,
        )
        .unwrap();
        let store = dir.path().join("store");

        let checked = run(
            cli(&store, &["apply", plan.to_str().unwrap(), "--check"]),
            &EdgeStackConfig::default(),
            fast_policy(),
        )
        .await
        .unwrap();
        assert_eq!(checked["order"], serde_json::json!(["edge", "backend"]));

        let report = run(
            cli(&store, &["apply", plan.to_str().unwrap()]),
            &EdgeStackConfig::default(),
            fast_policy(),
        )
        .await
        .unwrap();
        assert_eq!(report["units"][1]["resolved"]["edgeArn"]["value"], "arn:9");
    }
}
