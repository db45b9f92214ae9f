//! CodeQual CLI - Command-line client for the CodeQual analysis service

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tabled::{Table, Tabled};

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";

#[derive(Parser)]
#[command(name = "codequal")]
#[command(about = "CodeQual analysis service CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server base URL
    #[arg(long, global = true, env = "CODEQUAL_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// Bearer session token
    #[arg(long, global = true, env = "CODEQUAL_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a repository for analysis
    Submit {
        /// Clone URL or `owner/name` id
        #[arg(short, long)]
        repository: String,

        /// Branch (default branch when omitted)
        #[arg(short, long)]
        branch: Option<String>,

        /// Poll until the analysis finishes
        #[arg(long)]
        wait: bool,
    },

    /// Show the current state of an analysis
    Result {
        /// Analysis ID
        analysis_id: String,
    },

    /// Poll an analysis until it completes or fails
    Wait {
        /// Analysis ID
        analysis_id: String,

        #[arg(long, default_value = "2")]
        interval_secs: u64,

        #[arg(long, default_value = "1800")]
        timeout_secs: u64,
    },

    /// Show server health and job counts
    Status,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobView {
    analysis_id: String,
    repository: String,
    branch: Option<String>,
    status: String,
    created_at: String,
    completed_at: Option<String>,
    #[serde(default)]
    issues: Vec<IssueView>,
    metrics: Option<Value>,
    failure_reason: Option<String>,
}

impl JobView {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

#[derive(Deserialize, Tabled)]
struct IssueView {
    severity: String,
    #[serde(rename = "type")]
    #[tabled(rename = "type")]
    issue_type: String,
    rule: String,
    component: String,
    #[tabled(display_with = "display_line")]
    line: Option<u32>,
    message: String,
}

fn display_line(line: &Option<u32>) -> String {
    line.map(|l| l.to_string()).unwrap_or_default()
}

#[derive(Tabled)]
struct MetricRow {
    metric: String,
    value: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl Client {
    fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .context("No session token (use --token or CODEQUAL_TOKEN)")
    }

    async fn submit(&self, repository: &str, branch: Option<&str>) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/analysis/repository", self.base_url))
            .bearer_auth(self.token()?)
            .json(&submit_body(repository, branch))
            .send()
            .await
            .context("Failed to connect to server")?;

        let body: Value = parse(response).await?;
        body["analysisId"]
            .as_str()
            .map(str::to_string)
            .context("No analysisId in response")
    }

    async fn result(&self, analysis_id: &str) -> Result<JobView> {
        let response = self
            .http
            .get(format!("{}/analysis/results/{}", self.base_url, analysis_id))
            .bearer_auth(self.token()?)
            .send()
            .await
            .context("Failed to connect to server")?;
        parse(response).await
    }

    async fn health(&self) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("Failed to connect to server")?;
        parse(response).await
    }

    async fn wait(&self, analysis_id: &str, interval: Duration, limit: Duration) -> Result<JobView> {
        let started = Instant::now();
        loop {
            let view = self.result(analysis_id).await?;
            if view.is_terminal() {
                return Ok(view);
            }
            if started.elapsed() >= limit {
                bail!(
                    "Analysis {} still {} after {}s",
                    analysis_id,
                    view.status,
                    limit.as_secs()
                );
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Request body: URLs go in `repositoryUrl`, `owner/name` ids in `repositoryId`
fn submit_body(repository: &str, branch: Option<&str>) -> Value {
    let mut body = if repository.contains("://") {
        json!({ "repositoryUrl": repository })
    } else {
        json!({ "repositoryId": repository })
    };
    if let Some(branch) = branch {
        body["branch"] = json!(branch);
    }
    body
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.context("Failed to parse response");
    }
    match response.json::<ErrorBody>().await {
        Ok(err) => bail!("Server error ({}, {}): {}", status.as_u16(), err.error, err.message),
        Err(_) => bail!("Server error ({})", status),
    }
}

fn metric_rows(metrics: &Value) -> Vec<MetricRow> {
    metrics
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(metric, value)| MetricRow {
                    metric: metric.clone(),
                    value: match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    },
                })
                .collect()
        })
        .unwrap_or_default()
}

fn print_view(view: &JobView) {
    let status = match view.status.as_str() {
        "completed" => view.status.to_uppercase().green().bold(),
        "failed" => view.status.to_uppercase().red().bold(),
        _ => view.status.to_uppercase().yellow().bold(),
    };

    println!("  {} {}", "Analysis:".bold(), view.analysis_id);
    println!("  {} {}", "Repository:".bold(), view.repository);
    if let Some(branch) = &view.branch {
        println!("  {} {}", "Branch:".bold(), branch);
    }
    println!("  {} {}", "Status:".bold(), status);
    println!("  {} {}", "Created:".bold(), view.created_at);
    if let Some(completed_at) = &view.completed_at {
        println!("  {} {}", "Finished:".bold(), completed_at);
    }

    if let Some(reason) = &view.failure_reason {
        println!();
        println!("  {} {}", "Reason:".bold(), reason.red());
    }

    if let Some(metrics) = &view.metrics {
        println!();
        println!("{}", "Metrics".cyan().bold());
        println!("{}", Table::new(metric_rows(metrics)));
    }

    if view.status == "completed" {
        println!();
        if view.issues.is_empty() {
            println!("{}", "✓ No issues found".green());
        } else {
            println!("{}", format!("Issues ({})", view.issues.len()).cyan().bold());
            println!("{}", Table::new(&view.issues));
        }
    }
}

/// Process exit code for a waited-on analysis: 1 when it failed
fn exit_code(view: &JobView) -> i32 {
    if view.status == "failed" {
        1
    } else {
        0
    }
}

/// Print a terminal view and exit non-zero if the analysis failed
fn finish(view: &JobView) {
    print_view(view);
    let code = exit_code(view);
    if code != 0 {
        std::process::exit(code);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.server_url, cli.token);

    match cli.command {
        Commands::Submit {
            repository,
            branch,
            wait,
        } => {
            let analysis_id = client.submit(&repository, branch.as_deref()).await?;
            println!("{}", "✓ Analysis accepted".green().bold());
            println!("  {} {}", "Analysis:".bold(), analysis_id);

            if wait {
                println!();
                let view = client
                    .wait(&analysis_id, Duration::from_secs(2), Duration::from_secs(1800))
                    .await?;
                finish(&view);
            }
        }

        Commands::Result { analysis_id } => {
            let view = client.result(&analysis_id).await?;
            print_view(&view);
        }

        Commands::Wait {
            analysis_id,
            interval_secs,
            timeout_secs,
        } => {
            let view = client
                .wait(
                    &analysis_id,
                    Duration::from_secs(interval_secs.max(1)),
                    Duration::from_secs(timeout_secs),
                )
                .await?;
            finish(&view);
        }

        Commands::Status => {
            println!("{}", "Server Status".cyan().bold());
            println!();

            match client.health().await {
                Ok(health) => {
                    println!("  {} {}", "Server URL:".bold(), cli.server_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!("  {} {}", "Version:".bold(), health["version"]);
                    println!();
                    println!("  {} {}", "Pending:".bold(), health["jobs"]["pending"]);
                    println!("  {} {}", "Running:".bold(), health["jobs"]["running"]);
                    println!("  {} {}", "Completed:".bold(), health["jobs"]["completed"]);
                    println!("  {} {}", "Failed:".bold(), health["jobs"]["failed"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
