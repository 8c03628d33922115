use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chatrelay_agents::{
    CharRatioEstimator, ClientPool, CompletionService, CompletionSettings, ConversationStore,
    CredentialSlot, RateLimitTracker,
};
use chatrelay_channels::{ChatBot, ConsoleChannel};
use chatrelay_config::{AppConfig, ConfigLoader};
use chatrelay_security::RedactingWriter;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Chat bot relaying conversations to OpenAI-compatible APIs", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a YAML or TOML config file (default: ~/.chatrelay/config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively on the console (default)
    Chat {
        /// Contact name the console speaks as
        #[arg(short, long, default_value = "console")]
        user: String,
    },
    /// Send one message and print the reply
    Ask {
        /// Conversation identifier
        conversation: String,
        message: String,
    },
    /// Generate an image and print its URL
    Image { prompt: String },
    /// Transcribe an audio file
    Transcribe { file: PathBuf },
    /// Check every configured credential against its endpoint
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = ConfigLoader::load(cli.config.as_deref())?;
    let service = Arc::new(build_service(&config)?);

    match cli.command.unwrap_or(Commands::Chat {
        user: "console".to_string(),
    }) {
        Commands::Chat { user } => {
            let bot = ChatBot::new(
                Arc::clone(&service),
                config.bot.name.clone(),
                config.bot.max_message_chars,
            );
            ConsoleChannel::new(user).run(&bot).await?;
        }
        Commands::Ask {
            conversation,
            message,
        } => {
            println!("{}", service.reply(&conversation, &message).await);
        }
        Commands::Image { prompt } => {
            match service.image_reply(&config.bot.name, &prompt).await {
                Ok(url) => println!("{url}"),
                Err(failure) => anyhow::bail!(failure),
            }
        }
        Commands::Transcribe { file } => {
            let audio = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("audio path has no file name")?;
            println!(
                "{}",
                service
                    .transcription_reply(file_name, bytes::Bytes::from(audio))
                    .await
            );
        }
        Commands::Check => {
            let mut healthy = true;
            for (credential, ok) in service.pool().health_check_all().await {
                println!("{credential}: {}", if ok { "ok" } else { "FAILED" });
                healthy &= ok;
            }
            if !healthy {
                anyhow::bail!("one or more credentials failed the health check");
            }
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(RedactingWriter::stderr());
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build_service(config: &AppConfig) -> Result<CompletionService> {
    let store = ConversationStore::with_estimator(
        config.context.max_tokens,
        Box::new(CharRatioEstimator::new(config.context.chars_per_token)),
    );

    let slots = config
        .credentials()
        .into_iter()
        .map(|c| CredentialSlot::new(c.api_key, c.base_url))
        .collect();
    let pool = ClientPool::from_slots(
        slots,
        Duration::from_secs(config.openai.request_timeout_secs),
    )?;

    let tracker = RateLimitTracker::for_pool(
        &pool,
        Duration::from_secs(config.rate_limit.cooldown_secs),
    );

    let settings = CompletionSettings {
        model: config.openai.model.clone(),
        temperature: Some(config.openai.temperature),
        max_tokens: config.openai.max_tokens,
        image_size: config.openai.image_size.clone(),
        transcription_model: config.openai.transcription_model.clone(),
    };

    info!(
        "chatrelay ready: model={}, credentials={}, context budget={}",
        settings.model,
        pool.size(),
        store.budget()
    );

    Ok(CompletionService::new(
        Arc::new(store),
        Arc::new(pool),
        Arc::new(tracker),
        settings,
    ))
}
