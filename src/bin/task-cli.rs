use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "task-cli")]
#[command(about = "Command-line client for the task service", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service health
    Health,
    /// Print the raw Prometheus exposition
    Metrics,
    /// List all tasks
    List,
    /// Create a task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            let res = client.get(endpoint(&cli.url, "health")?).send().await?;
            print_json(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(endpoint(&cli.url, "metrics")?).send().await?;
            let status = res.status();
            let text = res.text().await?;
            if status.is_success() {
                print!("{}", text);
            } else {
                eprintln!("Error: metrics endpoint returned status {}", status);
                eprintln!("Response: {}", text);
            }
        }
        Commands::List => {
            let res = client.get(endpoint(&cli.url, "api/tasks")?).send().await?;
            print_json(res).await?;
        }
        Commands::Add { title, description } => {
            let res = client
                .post(endpoint(&cli.url, "api/tasks")?)
                .json(&json!({ "title": title, "description": description }))
                .send()
                .await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

/// Resolve `path` under the base URL, keeping any path prefix the base carries.
fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path)
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: service returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
