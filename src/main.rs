//! examforge CLI - blueprint-driven exam assembly and question synthesis.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use examforge::assembler::{AssemblyRequest, ExamAssembler};
use examforge::client::{CompletionClient, CredentialPool, HttpBackend};
use examforge::models::{Blueprint, Config, Question};
use examforge::retrieval::{chunk_text, Retriever};
use examforge::store::{MemoryStore, Storage};
use examforge::synthesis::{ConceptExtractor, QuestionCrafter, Reviewer, SynthesisPipeline};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "examforge")]
#[command(version)]
#[command(about = "Blueprint-driven exam assembly with AI question synthesis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "examforge.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a reference document: chunk, embed, and store it
    Ingest {
        /// Path to a plain-text document
        #[arg(short, long)]
        file: PathBuf,

        /// Document title (defaults to the file stem)
        #[arg(short, long)]
        title: Option<String>,

        /// Document author
        #[arg(short, long, default_value = "unknown")]
        author: String,

        /// Maximum chunk size in characters
        #[arg(long, default_value = "1500")]
        chunk_chars: usize,
    },

    /// Load a blueprint from a JSON file into the store
    BlueprintAdd {
        /// Path to the blueprint JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Load bank questions from a JSON array file into the store
    BankAdd {
        /// Path to the questions JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Assemble an exam from a stored blueprint
    Assemble {
        /// Blueprint id to assemble from
        #[arg(short, long)]
        blueprint: String,

        /// Exam title
        #[arg(short, long)]
        title: String,

        /// Exam description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Exam duration in minutes
        #[arg(long, default_value = "60")]
        duration: u32,

        /// Creator recorded on the exam
        #[arg(long, default_value = "examforge")]
        created_by: String,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# examforge configuration file

[service]
base_url = "https://api.openai.com/v1"
completion_model = "gpt-4o-mini"
embedding_model = "text-embedding-3-small"
timeout_secs = 120

[credentials]
# Keys rotate on rate limits; can also use EXAMFORGE_API_KEYS (comma-separated)
# keys = ["${OPENAI_API_KEY}"]
backoff_ms = 1500

[synthesis]
batch_size = 3
batch_pause_ms = 1000
languages = ["en"]

[store]
# Omit for a purely in-memory store
data_dir = "data/"
"#;
    println!("{example}");
}

fn open_store(config: &Config) -> Result<Arc<MemoryStore>> {
    let store = match &config.store.data_dir {
        Some(dir) => MemoryStore::open(dir)
            .with_context(|| format!("Failed to open store in {dir:?}"))?,
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}

fn build_client(config: &Config) -> Result<Arc<CompletionClient>> {
    let keys = config
        .credentials
        .resolve_keys()
        .context("Failed to resolve API credentials")?;
    let backend = Arc::new(HttpBackend::new(
        &config.service.base_url,
        config.service.timeout_secs,
    )?);
    let pool = Arc::new(CredentialPool::new(keys)?);
    Ok(Arc::new(CompletionClient::new(
        backend,
        pool,
        &config.service.completion_model,
        &config.service.embedding_model,
        Duration::from_millis(config.credentials.backoff_ms),
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            config
                .credentials
                .resolve_keys()
                .context("Failed to resolve API credentials")?;

            info!("Configuration is valid");
            info!("  Service:    {}", config.service.base_url);
            info!("  Completion: {}", config.service.completion_model);
            info!("  Embedding:  {}", config.service.embedding_model);
            info!(
                "  Synthesis:  batches of {}, {}ms pause",
                config.synthesis.batch_size, config.synthesis.batch_pause_ms
            );
            return Ok(());
        }

        Commands::Ingest {
            file,
            title,
            author,
            chunk_chars,
        } => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let store = open_store(&config)?;
            let client = build_client(&config)?;

            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read document {file:?}"))?;
            let title = title.unwrap_or_else(|| {
                file.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string())
            });

            let chunks = chunk_text(&text, chunk_chars);
            if chunks.is_empty() {
                anyhow::bail!("Document {file:?} contains no text");
            }

            let document_id = Uuid::new_v4().to_string();
            store
                .insert_document(examforge::models::ReferenceDocument {
                    id: document_id.clone(),
                    title: title.clone(),
                    author,
                    created_at: chrono::Utc::now(),
                })
                .await?;

            let bar = ProgressBar::new(chunks.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks",
                )?
                .progress_chars("#>-"),
            );

            for (seq, chunk) in chunks.iter().enumerate() {
                let embedding = client.embed(chunk).await?;
                store
                    .insert_chunk(examforge::models::DocumentChunk {
                        id: Uuid::new_v4().to_string(),
                        document_id: document_id.clone(),
                        seq,
                        text: chunk.clone(),
                        embedding,
                    })
                    .await?;
                bar.inc(1);
            }
            bar.finish();

            info!(
                document = %title,
                chunks = chunks.len(),
                "Document ingested"
            );
        }

        Commands::BlueprintAdd { file } => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let store = open_store(&config)?;

            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read blueprint {file:?}"))?;
            let blueprint: Blueprint = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse blueprint {file:?}"))?;

            let id = blueprint.id.clone();
            let questions = blueprint.total_question_count();
            store.insert_blueprint(blueprint).await?;
            info!(blueprint = %id, questions = questions, "Blueprint stored");
        }

        Commands::BankAdd { file } => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let store = open_store(&config)?;

            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read questions {file:?}"))?;
            let questions: Vec<Question> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse questions {file:?}"))?;

            let count = questions.len();
            for question in questions {
                store.insert_question(question).await?;
            }
            info!(count = count, "Bank questions stored");
        }

        Commands::Assemble {
            blueprint,
            title,
            description,
            duration,
            created_by,
        } => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let store = open_store(&config)?;
            let client = build_client(&config)?;

            let storage: Arc<dyn Storage> = store;
            let pipeline = SynthesisPipeline::new(
                ConceptExtractor::new(Arc::clone(&client)),
                QuestionCrafter::new(Arc::clone(&client)),
                Reviewer::new(Arc::clone(&client)),
                &config.synthesis,
            );
            let assembler = ExamAssembler::new(
                Arc::clone(&storage),
                Retriever::new(client, Arc::clone(&storage)),
                pipeline,
                config.synthesis.languages.clone(),
            );

            let exam_id = assembler
                .assemble(AssemblyRequest {
                    blueprint_id: blueprint,
                    title,
                    description,
                    duration_mins: duration,
                    created_by,
                })
                .await?;

            let exam = storage
                .exam(&exam_id)
                .await?
                .context("Assembled exam missing from store")?;

            println!("\n=== Assembly Complete ===");
            println!("Exam:        {}", exam.title);
            println!("Id:          {exam_id}");
            println!("Total marks: {}", exam.total_marks);
            println!("Duration:    {} mins", exam.duration_mins);
            println!("Status:      {}", exam.status.as_str());
        }
    }

    Ok(())
}
