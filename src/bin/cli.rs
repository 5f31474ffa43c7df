//! Command-line access to a Riak node

use anyhow::Context;
use clap::{Parser, Subcommand};
use simpleriak::{BackendKind, Client, ClientConfig, Data, IndexQuery, PutParams, Query, Reply};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "simpleriak")]
#[command(about = "Talk to a Riak node over HTTP or the binary protocol")]
#[command(version)]
struct Cli {
    /// Server host (overrides configuration)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Server port (overrides configuration)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Default bucket
    #[arg(long, short, global = true)]
    bucket: Option<String>,

    /// Wire protocol: http or binary
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the node answers
    Ping,

    /// Node statistics
    Stats,

    /// Resources advertised by the node
    Resources,

    /// List buckets
    Buckets,

    /// Show bucket properties
    Bucket,

    /// List keys, optionally matching secondary indexes
    Keys {
        /// `name=value` constraint; repeat to intersect
        #[arg(long = "index", value_name = "NAME=VALUE")]
        index: Vec<String>,
    },

    /// Read a key
    Get { key: String },

    /// Write a value; omit the key to let the server assign one
    Put {
        key: Option<String>,

        /// Value to store
        #[arg(long)]
        data: String,

        /// Content type (inferred from the value when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Delete a key
    Delete { key: String },
}

/// `name=value`, with integer values typed as integer indexes
fn parse_index(raw: &str) -> anyhow::Result<IndexQuery> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("index constraint must be NAME=VALUE, got {:?}", raw))?;
    Ok(match value.parse::<i64>() {
        Ok(n) => IndexQuery::exact(name, n),
        Err(_) => IndexQuery::exact(name, value),
    })
}

fn print_reply(reply: &Reply) {
    if let Some(key) = &reply.key {
        println!("key: {}", key);
    }
    match &reply.data {
        Data::Json(value) => match serde_json::to_string_pretty(value) {
            Ok(pretty) => println!("{}", pretty),
            Err(_) => println!("{}", value),
        },
        Data::Empty => println!("({})", reply.status_code),
        other => println!("{}", other),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::load().context("loading configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if cli.host.is_some() {
        config.host = cli.host;
    }
    if cli.port.is_some() {
        config.port = cli.port;
    }
    if cli.bucket.is_some() {
        config.bucket = cli.bucket;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = Client::new(config)?;

    let reply = match cli.command {
        Commands::Ping => client.ping().await?,
        Commands::Stats => client.stats().await?,
        Commands::Resources => client.resources().await?,
        Commands::Buckets => client.get_buckets().await?,
        Commands::Bucket => client.get_bucket(None).await?,
        Commands::Keys { index } => {
            let mut query = Query::all();
            for raw in &index {
                query = query.and_index(parse_index(raw)?);
            }
            client.get_keys(&query).await?
        }
        Commands::Get { key } => client.get(&Query::key(key)).await?,
        Commands::Put {
            key,
            data,
            content_type,
        } => {
            let mut params = PutParams::new(data);
            params.key = key;
            params.content_type = content_type;
            client.put(params).await?
        }
        Commands::Delete { key } => client.delete(&Query::key(key)).await?,
    };

    print_reply(&reply);
    Ok(())
}
