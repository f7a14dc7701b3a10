use std::path::PathBuf;
use std::sync::Arc;

use admission_core::gateway::prepare_text;
use admission_core::{Draft, NoteStore, Post};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use note_agents::clients::extract_post_id;
use note_agents::config::AppConfig;
use note_agents::runtime::{open_store, run_and_persist, Runtime};
use note_agents::telemetry::init_tracing;
use tracing::{info, warn};

const POST_TEXT_UNAVAILABLE: &str = "Post text unavailable";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML overlay for endpoints, paths and engine tunables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consensus, refinement, admission and submission for one note
    Run {
        /// Post id or post URL
        #[arg(long)]
        post: String,
        /// Note text
        #[arg(long)]
        note: String,
        #[arg(long, default_value = "cli")]
        writer: String,
        /// Skip the post lookup and use this text
        #[arg(long)]
        post_text: Option<String>,
        /// Load and save the note store snapshot here (overrides config)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Practice check only
    Practice {
        #[arg(long)]
        post: String,
        #[arg(long)]
        note: String,
        #[arg(long)]
        post_text: Option<String>,
    },
    /// Tag selection plus one exam submission
    Exam {
        #[arg(long)]
        post: String,
        #[arg(long)]
        note: String,
        #[arg(long)]
        post_text: Option<String>,
        /// Submit outside test mode
        #[arg(long, default_value_t = false)]
        live: bool,
    },
    /// Print the tags the oracle would choose
    Tags {
        #[arg(long)]
        post_text: String,
        #[arg(long)]
        note: String,
    },
    /// Print the wire text a note would be submitted as (no network)
    Normalize {
        #[arg(long)]
        note: String,
    },
}

async fn resolve_post(runtime: &Runtime, post: &str, post_text: Option<String>) -> Result<Post> {
    let post_id = extract_post_id(post).with_context(|| format!("Not a post id or URL: {post}"))?;
    let text = match post_text {
        Some(text) => text,
        None => match runtime.platform.fetch_post_text(&post_id).await {
            Ok(Some(text)) => text,
            Ok(None) => POST_TEXT_UNAVAILABLE.to_string(),
            Err(e) => {
                warn!(post_id = %post_id, "post lookup failed: {e}");
                POST_TEXT_UNAVAILABLE.to_string()
            }
        },
    };
    Ok(Post::new(post_id, text))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_normalized(note: &str, config: &AppConfig) -> Result<()> {
    println!("{}", prepare_text(note, &config.engine.submission)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(path) = &args.config {
        config = config.with_file(path)?;
    }

    if let Command::Normalize { note } = &args.command {
        return print_normalized(note, &config);
    }

    let runtime = Runtime::connect(config)?;
    info!(
        grok = %runtime.config.grok.api_url,
        oracle = runtime.oracle.is_some(),
        "note agents starting"
    );

    match args.command {
        Command::Run {
            post,
            note,
            writer,
            post_text,
            store,
        } => {
            let mut config = runtime.config.clone();
            if store.is_some() {
                config.store_path = store;
            }
            let post = resolve_post(&runtime, &post, post_text).await?;
            let store = open_store(&config)?;
            let pipeline = runtime.pipeline(store.clone() as Arc<dyn NoteStore>)?;

            let report =
                run_and_persist(&pipeline, &store, &config, &post, &writer, &note).await?;
            info!(
                post_id = %report.post_id,
                status = %report.status,
                drafts = report.drafts.len(),
                "pipeline finished"
            );
            print_json(&report)?;
        }
        Command::Practice {
            post,
            note,
            post_text,
        } => {
            let post = resolve_post(&runtime, &post, post_text).await?;
            let draft = Draft::new("cli", &post.id, &note);
            let outcome = runtime.engine()?.run_practice(&draft, &post).await;
            print_json(&outcome)?;
        }
        Command::Exam {
            post,
            note,
            post_text,
            live,
        } => {
            let post = resolve_post(&runtime, &post, post_text).await?;
            let draft = Draft::new("cli", &post.id, &note);
            let tags = runtime.tag_selector().select(&post.text, &note).await?;
            let engine = runtime.engine()?.with_test_mode(!live);
            let attempt = engine.run_exam(&draft, &post.id, &tags).await?;
            if !attempt.outcome.passed() {
                warn!(reasons = ?attempt.outcome.reason_labels(), "exam rejected the note");
            }
            print_json(&attempt.outcome)?;
        }
        Command::Tags { post_text, note } => {
            let tags = runtime.tag_selector().select(&post_text, &note).await?;
            if tags.is_empty() {
                bail!("No tags selected");
            }
            print_json(&tags)?;
        }
        Command::Normalize { note } => print_normalized(&note, &runtime.config)?,
    }

    Ok(())
}
