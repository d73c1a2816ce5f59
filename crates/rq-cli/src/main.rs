//! RQ CLI - Command-line interface
//!
//! Usage:
//!   rq query <question>
//!   rq render <question>
//!   rq check

use anyhow::Context;
use clap::{Parser, Subcommand};
use rq_core::{config::AppConfig, PipelineInput};
use rq_rag::{prompt, RagPipeline};
use std::collections::HashMap;

#[derive(Parser)]
#[command(name = "rq")]
#[command(about = "Ask questions about indexed resumes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and print the JSON result
    Query {
        /// Question to ask
        question: String,
    },
    /// Print the prompt the question would be sent with
    Render {
        /// Question to render
        question: String,
    },
    /// Validate configuration without contacting any service
    Check,
}

fn render(question: &str) -> anyhow::Result<String> {
    let template = prompt::hr_director_prompt()?;
    let values = HashMap::from([("question", question)]);
    Ok(template.format(&values)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,rq_rag={}", config.logging.level).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Query { question } => {
            let pipeline = RagPipeline::connect(&config)
                .await
                .context("Failed to initialize pipeline")?;
            let result = pipeline.run(&PipelineInput::new(question)).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Render { question } => {
            println!("{}", render(&question)?);
        }
        Commands::Check => {
            config.validate().context("Invalid configuration")?;
            println!("Configuration OK");
            println!("  Pinecone index: {}", config.pinecone.index_name);
            println!("  LLM: {:?} / {}", config.llm.provider, config.llm.model);
            println!("  Embeddings: {}", config.llm.embedding_model);
            println!(
                "  Retrieval: k={}, mode={:?}",
                config.rag.top_k, config.rag.retrieval_mode
            );
        }
    }

    Ok(())
}
