use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use writerly_core::{GenerationRequest, Orchestrator, Sanitizer, Task, VoiceSettings, WriterlyConfig};
use writerly_server::{AppState, WriterlyServer};

#[derive(Parser)]
#[command(name = "writerly", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one generation against the configured providers
    Generate {
        /// What to do with the text
        #[arg(long, value_enum, default_value_t = TaskArg::Rewrite)]
        task: TaskArg,

        /// The user's request
        #[arg(short, long, default_value = "")]
        instruction: String,

        /// Document text to work on
        #[arg(short, long)]
        context: Option<String>,

        /// Read the document text from a file instead
        #[arg(short, long, conflicts_with = "context")]
        file: Option<PathBuf>,

        /// Try this provider first
        #[arg(short, long)]
        provider: Option<String>,

        /// Voice settings as JSON, e.g. '{"tone":"friendly","formality":4}'
        #[arg(long)]
        voice: Option<String>,

        /// User id used for rate limiting
        #[arg(long, default_value = "cli")]
        user: String,

        /// Print the whole result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check text the way the API does and print the clean form
    Sanitize {
        /// Text to check (reads stdin if omitted)
        text: Option<String>,
    },

    /// Start the HTTP API
    Serve {
        /// Port to listen on (defaults to PORT or 3001)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum TaskArg {
    Rewrite,
    Summarize,
    Expand,
    Suggestions,
}

impl From<TaskArg> for Task {
    fn from(task: TaskArg) -> Self {
        match task {
            TaskArg::Rewrite => Task::Rewrite,
            TaskArg::Summarize => Task::Summarize,
            TaskArg::Expand => Task::Expand,
            TaskArg::Suggestions => Task::Suggestions,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = WriterlyConfig::from_env();

    match cli.command {
        Commands::Generate {
            task,
            instruction,
            context,
            file,
            provider,
            voice,
            user,
            json,
        } => {
            let context = match file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {:?}", path))?,
                None => context.unwrap_or_default(),
            };

            let voice = match voice {
                Some(raw) => {
                    let value: serde_json::Value =
                        serde_json::from_str(&raw).context("--voice must be a JSON object")?;
                    VoiceSettings::from_value(&value)
                }
                None => VoiceSettings::default(),
            };

            let mut request = GenerationRequest::new(user)
                .with_task(task.into())
                .with_instruction(instruction)
                .with_context(context)
                .with_voice(voice);
            if let Some(provider) = provider {
                request = request.with_provider(provider);
            }

            let registry = writerly_ai::registry_from_config(&config);
            if registry.is_empty() {
                warn!("No AI providers configured; the result will be the offline fallback");
            }
            let orchestrator = Orchestrator::new(registry, config);

            let result = orchestrator.generate(request).await.context("Generation failed")?;
            info!(provider = %result.provider, duration_ms = ?result.duration_ms, "Generation finished");

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.output);
                if let Some(suggestions) = result.suggestions.as_ref().filter(|s| !s.is_empty()) {
                    println!("{}", serde_json::to_string_pretty(suggestions)?);
                }
                if let Some(error) = &result.error {
                    warn!("Fallback used: {}", error);
                }
            }
        }
        Commands::Sanitize { text } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };

            match Sanitizer::new(config.max_input_length).sanitize(&text) {
                Ok(clean) => println!("{}", clean),
                Err(err) => {
                    eprintln!("{}: {}", err.code(), err);
                    std::process::exit(2);
                }
            }
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or(config.port);
            let state = AppState::from_config(config);
            info!("Providers: {:?}", state.orchestrator.registry().names());
            WriterlyServer::new(state)
                .start(port)
                .await
                .context("Server stopped with an error")?;
        }
    }

    Ok(())
}
