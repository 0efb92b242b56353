use anyhow::Result;
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the proof-of-work ledger node")]
struct Cli {
    /// Node base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction to the pending buffer
    Submit {
        #[arg(long)]
        sender: String,
        #[arg(long)]
        recipient: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Mine a block from the pending transactions
    Mine,
    /// Print the full chain
    Chain,
    /// Print pending transactions
    Pending,
    /// Register one or more peers
    Register {
        /// Peer URL, e.g. http://127.0.0.1:5001 (repeatable)
        #[arg(long = "node-url", required = true)]
        nodes: Vec<String>,
    },
    /// List registered peers
    Peers,
    /// Run longest-valid-chain resolution against the registered peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    sender: String,
    recipient: String,
    amount: i64,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

impl Command {
    fn request(self, client: &Client, node: &str) -> RequestBuilder {
        match self {
            Command::Submit {
                sender,
                recipient,
                amount,
            } => client
                .post(format!("{node}/transactions/new"))
                .json(&Tx {
                    sender,
                    recipient,
                    amount,
                }),
            Command::Mine => client.get(format!("{node}/mine")),
            Command::Chain => client.get(format!("{node}/chain")),
            Command::Pending => client.get(format!("{node}/transactions/pending")),
            Command::Register { nodes } => client
                .post(format!("{node}/nodes/register"))
                .json(&Nodes { nodes }),
            Command::Peers => client.get(format!("{node}/nodes")),
            Command::Resolve => client.get(format!("{node}/nodes/resolve")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_string();
    debug!(%node, cmd = ?cli.cmd, "sending request");

    let client = Client::new();
    let res = cli.cmd.request(&client, &node).send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    if !status.is_success() {
        anyhow::bail!("node answered {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submit_with_negative_amount() {
        let cli = Cli::parse_from([
            "ledger-cli",
            "submit",
            "--sender",
            "a",
            "--recipient",
            "b",
            "--amount",
            "-5",
        ]);
        assert_eq!(cli.node, "http://127.0.0.1:5000");
        assert!(matches!(cli.cmd, Command::Submit { amount: -5, .. }));
    }

    #[test]
    fn register_requires_a_node() {
        assert!(Cli::try_parse_from(["ledger-cli", "register"]).is_err());
        let cli = Cli::parse_from([
            "ledger-cli",
            "--node",
            "http://127.0.0.1:5001",
            "register",
            "--node-url",
            "http://127.0.0.1:5002",
            "--node-url",
            "127.0.0.1:5003",
        ]);
        assert_eq!(cli.node, "http://127.0.0.1:5001");
        match cli.cmd {
            Command::Register { nodes } => assert_eq!(nodes.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn builds_requests_for_each_route() {
        let client = Client::new();
        let node = "http://127.0.0.1:5000";
        let cases = [
            (Command::Mine, "GET", "/mine"),
            (Command::Chain, "GET", "/chain"),
            (Command::Pending, "GET", "/transactions/pending"),
            (Command::Peers, "GET", "/nodes"),
            (Command::Resolve, "GET", "/nodes/resolve"),
            (
                Command::Register {
                    nodes: vec!["127.0.0.1:5001".into()],
                },
                "POST",
                "/nodes/register",
            ),
        ];
        for (cmd, method, path) in cases {
            let req = cmd.request(&client, node).build().unwrap();
            assert_eq!(req.method().as_str(), method);
            assert_eq!(req.url().path(), path);
        }
    }
}
