use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;

#[derive(Parser)]
#[command(name = "fedsearch-cli")]
#[command(about = "Federated search CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "FEDSEARCH_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    /// Search as this user
    #[arg(short, long, env = "FEDSEARCH_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search across repositories
    Search {
        /// Free-text query
        #[arg(value_name = "QUERY")]
        query: Option<String>,

        /// Raw query DSL, used instead of QUERY
        #[arg(short, long, conflicts_with = "query")]
        source: Option<String>,

        /// Comma-separated repositories (default: all)
        #[arg(short, long)]
        repo: Option<String>,

        /// Fields to return
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,

        /// Attach aggregations
        #[arg(short, long)]
        aggregations: bool,

        /// Attach highlights
        #[arg(short = 'H', long)]
        highlight: bool,
    },

    /// Get one item by id
    Get {
        #[arg(value_name = "ITEM_ID")]
        id: String,

        /// Comma-separated repositories to probe, in priority order
        #[arg(short, long)]
        repo: Option<String>,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    let mut headers = reqwest::header::HeaderMap::new();
    if let Some(user) = &cli.user {
        headers.insert("X-User-Id", user.parse()?);
    }

    match cli.command {
        Commands::Search {
            query,
            source,
            repo,
            fields,
            aggregations,
            highlight,
        } => {
            let source = source.or_else(|| {
                query.map(|q| {
                    serde_json::json!({
                        "query": { "filtered": { "query": { "query_string": { "query": q } } } }
                    })
                    .to_string()
                })
            });

            let mut params: Vec<(&str, String)> = Vec::new();
            if let Some(source) = source {
                params.push(("source", source));
            }
            if let Some(repo) = repo {
                params.push(("repo", repo));
            }
            if !fields.is_empty() {
                params.push(("projections", serde_json::to_string(&fields)?));
            }
            if aggregations {
                params.push(("aggregations", "1".to_string()));
            }
            if highlight {
                params.push(("es_highlight", "1".to_string()));
            }

            let response = client
                .get(format!("{}/search", cli.endpoint))
                .headers(headers)
                .query(&params)
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Get { id, repo } => {
            let mut request = client
                .get(format!("{}/search/{}", cli.endpoint, id))
                .headers(headers);
            if let Some(repo) = repo {
                request = request.query(&[("repo", repo)]);
            }

            let response = request.send().await?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
