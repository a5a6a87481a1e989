use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ledger_core::KeyPair;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_NODE: &str = "http://127.0.0.1:8080";

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for a ledger node")]
struct Cli {
    /// Node base URL
    #[arg(long, global = true, default_value = DEFAULT_NODE)]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the node wallet address
    Wallet,
    /// Show the mature balance of an address (the node wallet by default)
    Balance {
        #[arg(long)]
        address: Option<String>,
    },
    /// Mine one block on the node and print it
    Mine,
    /// Pay from the node wallet
    Send {
        /// Recipient address
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Register a peer with the node
    Connect {
        /// Peer base URL, e.g. 127.0.0.1:8081
        #[arg(long)]
        peer: String,
    },
    /// List the node's peers
    Peers,
    /// Show the chain tip
    Head,
    /// Generate a key pair locally for `ledger-node --secret-key`
    Keygen,
}

#[derive(Serialize)]
struct SendBody<'a> {
    to: &'a str,
    amount: u64,
}

#[derive(Serialize)]
struct PeerBody<'a> {
    url: &'a str,
}

struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        read_body(self.http.get(&url).send().await?).await
    }

    async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "POST");
        read_body(self.http.post(&url).json(body).send().await?).await
    }
}

async fn read_body(res: reqwest::Response) -> Result<Value> {
    let status = res.status();
    let text = res.text().await?;
    // Extractor rejections come back as plain text rather than JSON.
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
    if !status.is_success() {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| body.as_str())
            .unwrap_or("no reason given");
        bail!("node returned {status}: {reason}");
    }
    Ok(body)
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = NodeClient::new(&cli.node);
    let out = match cli.cmd {
        Command::Wallet => node.get("/wallet").await?,
        Command::Balance { address: None } => node.get("/balance").await?,
        Command::Balance {
            address: Some(address),
        } => node.get(&format!("/balance/{address}")).await?,
        Command::Mine => node.post("/mine", &serde_json::json!({})).await?,
        Command::Send { to, amount } => node.post("/send", &SendBody { to: &to, amount }).await?,
        Command::Connect { peer } => node.post("/peers", &PeerBody { url: &peer }).await?,
        Command::Peers => node.get("/peers").await?,
        Command::Head => node.get("/chain/head").await?,
        Command::Keygen => {
            let keys = KeyPair::generate();
            serde_json::json!({
                "secret_key": keys.secret_hex(),
                "public_key": keys.public_key_hex(),
                "address": keys.address(),
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
