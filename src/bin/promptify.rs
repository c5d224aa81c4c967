//! promptify: run prompt templates against the Unify router.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use futures_util::StreamExt;
use promptify::config::Config;
use promptify::{Pipeline, PromptGenerator, TemplatePrompter, UnifyModel, Variables};
use serde_json::Value;

/// Promptify CLI
#[derive(Parser)]
#[command(name = "promptify")]
#[command(about = "Prompt pipelines over the Unify LLM router")]
struct Args {
    /// Config file (default: ./promptify.toml, then ~/.promptify/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log rendered prompts
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run inputs through one or more templates
    Run {
        /// Template file; repeat to chain generators
        #[arg(short, long, required = true)]
        template: Vec<PathBuf>,
        /// Input text; repeat for a batch
        #[arg(short, long, required = true)]
        input: Vec<String>,
        /// Template variable as key=value
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },

    /// Send one prompt and print the response as it streams
    Stream {
        #[arg(short, long)]
        prompt: String,
    },
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = Args::command()
        .version(promptify::version_string())
        .get_matches();
    let args = Args::from_arg_matches(&matches)?;

    // Default: warn for CLI, info with --verbose; override with RUST_LOG.
    let default_filter = if args.verbose { "warn,promptify=info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    config.pipeline.verbose |= args.verbose;

    let model_config = config.model.to_model_config()?;
    let model = match &config.model.base_url {
        Some(base_url) => UnifyModel::with_base_url(model_config, base_url)?,
        None => UnifyModel::new(model_config)?,
    };

    match args.command {
        Command::Run {
            template,
            input,
            vars,
        } => {
            let prompters = template
                .iter()
                .map(|path| {
                    TemplatePrompter::from_file(path)
                        .map(|p| Arc::new(p) as Arc<dyn PromptGenerator>)
                })
                .collect::<promptify::Result<Vec<_>>>()?;
            let variables: Variables = vars
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();

            let pipeline = Pipeline::new(prompters, Arc::new(model), config.pipeline)?;
            let results = pipeline.fit_batch(input.as_slice(), &variables).await;
            println!("{}", serde_json::to_string_pretty(&results)?);

            let failed = results.iter().filter(|r| r.is_none()).count();
            if failed > 0 {
                eprintln!("{failed} of {} inputs failed", results.len());
                std::process::exit(1);
            }
        }

        Command::Stream { prompt } => {
            let mut stream = model.run(&prompt).await?;
            let mut stdout = io::stdout().lock();
            let mut printed = 0;
            while let Some(state) = stream.next().await {
                let state = state?;
                if let Some(new) = state.text.get(printed..) {
                    stdout.write_all(new.as_bytes())?;
                    stdout.flush()?;
                }
                printed = printed.max(state.text.len());
            }
            writeln!(stdout)?;
        }
    }

    Ok(())
}
