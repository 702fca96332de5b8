//! Command-line interface for the deployment tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edgestack_core::ReferenceKey;

/// Publish, resolve, and apply cross-region deployment references.
#[derive(Parser, Debug)]
#[command(name = "edgestack-deploy")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Publish the edge function ARN from the producer stack:\n",
    "    $ edgestack-deploy publish --region us-east-1 \\\n",
    "        --key /axumOnLambda/LambdaEdgeArn --value arn:aws:lambda:...:3\n\n",
    "  Resolve it from a consumer in another region:\n",
    "    $ edgestack-deploy resolve --region us-east-1 --key /axumOnLambda/LambdaEdgeArn\n\n",
    "  Apply a plan:\n",
    "    $ edgestack-deploy apply plan.json\n",
))]
pub struct Cli {
    /// Store directory [default: STORE_DIR or /var/lib/edgestack].
    #[arg(long, global = true, value_name = "DIR")]
    pub store_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Publish a reference.
    Publish(PublishArgs),

    /// Resolve a reference, waiting for it to be published.
    Resolve(ResolveArgs),

    /// Validate and apply a deployment plan.
    Apply(ApplyArgs),
}

/// Arguments for `publish`.
#[derive(Parser, Debug, Clone)]
pub struct PublishArgs {
    /// Region to publish into [default: DEFAULT_REGION].
    #[arg(short, long, value_name = "REGION")]
    pub region: Option<String>,

    /// Reference key, e.g. `/axumOnLambda/LambdaEdgeArn`.
    #[arg(short, long, value_name = "KEY")]
    pub key: ReferenceKey,

    /// Value to publish.
    #[arg(short, long, value_name = "VALUE")]
    pub value: String,
}

/// Arguments for `resolve`.
#[derive(Parser, Debug, Clone)]
pub struct ResolveArgs {
    /// Region the reference was published in [default: DEFAULT_REGION].
    #[arg(short, long, value_name = "REGION")]
    pub region: Option<String>,

    /// Reference key.
    #[arg(short, long, value_name = "KEY")]
    pub key: ReferenceKey,

    /// Give up after this many seconds [default: RESOLVER_TIMEOUT_SECS].
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

/// Arguments for `apply`.
#[derive(Parser, Debug, Clone)]
pub struct ApplyArgs {
    /// Path to the plan JSON.
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Only validate the plan and print the application order.
    #[arg(long)]
    pub check: bool,
}
