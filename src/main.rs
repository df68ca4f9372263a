use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use plsa_topics::plsa::corpus::load_documents;
use plsa_topics::plsa::serde;
use plsa_topics::{
    infer, train, FeatureSinks, InferConfig, StoragePolicy, TrainConfig, Vocabulary,
    WordTopicSource,
};

#[derive(Parser)]
#[command(name = "plsa", version, about = "PLSA topic model training and inference")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model on a corpus with one whitespace-tokenized document per line
    Train(TrainArgs),
    /// Infer topic weights for every document of a corpus
    Infer(InferArgs),
    /// Print a model's word-topic table as text
    Dump {
        model: PathBuf,
        /// Write here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TrainArgs {
    corpus: PathBuf,
    /// Checkpoint written after every iteration
    model: PathBuf,
    /// JSON file with training defaults; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(short = 'k', long)]
    topics: Option<usize>,
    #[arg(short = 'i', long)]
    iterations: Option<usize>,
    #[arg(short = 'j', long)]
    workers: Option<usize>,
    #[arg(long)]
    noise: Option<f32>,
    /// Size of the frequency-weighted special topic 0
    #[arg(long)]
    special: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Keep the document-topic table in a mapped temporary file
    #[arg(long)]
    mapped: bool,
    #[arg(long)]
    temp_dir: Option<PathBuf>,
    #[arg(long)]
    text_dump: Option<PathBuf>,
    /// Continue from the model already at MODEL
    #[arg(long)]
    resume: bool,
}

#[derive(Args)]
struct InferArgs {
    corpus: PathBuf,
    model: PathBuf,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Expected topic count of the model
    #[arg(short = 'k', long)]
    topics: Option<usize>,
    #[arg(short = 'i', long)]
    iterations: Option<usize>,
    /// Append one line of topic weights per document here
    #[arg(long)]
    topic_features: Option<PathBuf>,
    /// Base name of per-document word feature files
    #[arg(long)]
    word_features: Option<PathBuf>,
}

impl TrainArgs {
    fn config(&self) -> plsa_topics::Result<TrainConfig> {
        let mut cfg = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };
        if let Some(v) = self.topics {
            cfg.topics = v;
        }
        if let Some(v) = self.iterations {
            cfg.max_iterations = v;
        }
        if let Some(v) = self.workers {
            cfg.workers = v;
        }
        if let Some(v) = self.noise {
            cfg.noise = v;
        }
        if let Some(v) = self.special {
            cfg.special_topic_words = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if self.mapped {
            cfg.storage = StoragePolicy::Mapped;
        }
        if self.temp_dir.is_some() {
            cfg.temp_dir = self.temp_dir.clone();
        }
        if self.text_dump.is_some() {
            cfg.text_dump = self.text_dump.clone();
        }
        Ok(cfg)
    }
}

impl InferArgs {
    fn config(&self) -> plsa_topics::Result<InferConfig> {
        let mut cfg = match &self.config {
            Some(path) => InferConfig::from_json_file(path)?,
            None => InferConfig::default(),
        };
        if let Some(v) = self.topics {
            cfg.topics = v;
        }
        if let Some(v) = self.iterations {
            cfg.max_iterations = v;
        }
        Ok(cfg)
    }
}

fn run(cli: Cli) -> plsa_topics::Result<()> {
    match cli.command {
        Command::Train(args) => {
            let config = args.config()?;
            let documents = load_documents(&args.corpus)?;
            let source = if args.resume {
                WordTopicSource::Resume
            } else {
                let vocab = Vocabulary::from_documents(&documents);
                info!(words = vocab.size(), documents = documents.len(), "built vocabulary");
                WordTopicSource::Fresh(vocab)
            };
            let report = train(&documents, source, &args.model, config)?;
            info!(
                iterations = report.iterations(),
                log_likelihood = report.final_log_likelihood(),
                model = %args.model.display(),
                "training finished"
            );
        }
        Command::Infer(args) => {
            let config = args.config()?;
            let documents = load_documents(&args.corpus)?;
            let sinks = FeatureSinks {
                topic_features: args.topic_features.clone(),
                word_features: args.word_features.clone(),
            };
            let outcomes = infer(&documents, &args.model, &config, &sinks)?;
            let converged = outcomes.iter().filter(|o| o.converged).count();
            info!(documents = outcomes.len(), converged, "inference finished");
        }
        Command::Dump { model, out } => {
            let model = serde::load(&model, 0)?;
            match out {
                Some(path) => serde::save_text(&model, path)?,
                None => {
                    let stdout = io::stdout();
                    serde::write_text(&model, &mut stdout.lock())
                        .map_err(|e| plsa_topics::PlsaError::io("<stdout>", e))?;
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_writer(io::stderr).with_env_filter(filter).init();

    let cli = Cli::parse();
    let started = Instant::now();
    match run(cli) {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
