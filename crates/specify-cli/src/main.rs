use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use specify_core::keys::Provider;
use specify_core::pipeline::{self, Outcome};
use specify_core::{
    load_generation, read_settings, save_generation, specify_dir, write_document, write_settings,
    KeyStore, KeywordExtractor, Pipeline, ProfileExtractor, RunOptions, ValidationChecklist,
    ValidationReport,
};
use specify_suggest::{default_model, engine, LlmExtractor, ProviderConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the description was too thin and questions were printed instead.
const EXIT_NEEDS_CLARIFICATION: u8 = 2;

#[derive(Parser)]
#[command(name = "specify")]
#[command(about = "Specify - backend design documents from a product description", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a backend design document from a description
    Generate {
        /// Product description
        #[arg(short, long)]
        prompt: String,

        /// LLM provider used for extraction (ollama, openai, anthropic)
        #[arg(long, value_parser = Provider::parse)]
        provider: Option<Provider>,

        /// Model name; defaults to the configured or built-in model for the provider
        #[arg(short, long)]
        model: Option<String>,

        /// Directory the document and its profile are written to
        #[arg(short, long, env = "SPECIFY_OUTPUT", default_value = "./output")]
        output: PathBuf,

        /// Skip clarification questions and proceed on defaults
        #[arg(long)]
        no_recommendations: bool,

        /// Keyword extraction only; never call a provider
        #[arg(long)]
        offline: bool,

        /// Print the document instead of writing files
        #[arg(long)]
        stdout: bool,
    },

    /// API keys and model settings
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Validate a generated document against its profile
    CheckConsistency {
        /// Directory holding backend-design.md and its profile
        #[arg(short, long, default_value = "./output")]
        dir: PathBuf,
    },

    /// Regenerate the sections that fail validation
    FixInconsistencies {
        /// Directory holding backend-design.md and its profile
        #[arg(short, long, default_value = "./output")]
        dir: PathBuf,

        /// List the sections that would be regenerated without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that a provider is reachable with the configured credentials
    CheckConnection {
        #[arg(long, value_parser = Provider::parse)]
        provider: Option<Provider>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Store an API key (or the Ollama host URL)
    SetKey {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        key: String,
    },
    /// List stored keys, masked
    ListKeys,
    /// Remove a stored key
    DeleteKey {
        #[arg(long)]
        provider: String,
    },
    /// Make a provider and model the default for extraction
    SetModel {
        #[arg(long, value_parser = Provider::parse)]
        provider: Provider,
        #[arg(long)]
        model: String,
    },
    /// Print the current settings
    Show,
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            prompt,
            provider,
            model,
            output,
            no_recommendations,
            offline,
            stdout,
        } => {
            let options = RunOptions {
                skip_clarification: no_recommendations,
            };
            generate(&prompt, provider, model, &output, options, offline, stdout).await
        }
        Commands::Config(cmd) => config(cmd).map(|()| ExitCode::SUCCESS),
        Commands::CheckConsistency { dir } => check_consistency(&dir),
        Commands::FixInconsistencies { dir, dry_run } => fix_inconsistencies(&dir, dry_run),
        Commands::CheckConnection { provider } => check_connection(provider).await,
    }
}

// --- generate ---

/// The LLM extractor when a provider is chosen (flag or settings), otherwise keywords.
fn extractor(provider: Option<Provider>, model: Option<String>, offline: bool) -> Result<Box<dyn ProfileExtractor>> {
    let settings = read_settings();
    let explicit = provider.is_some();
    let Some(provider) = provider.or(settings.provider).filter(|_| !offline) else {
        debug!("using keyword extraction");
        return Ok(Box::new(KeywordExtractor));
    };

    let model = model
        .or_else(|| settings.model_for(provider).map(str::to_string))
        .unwrap_or_else(|| default_model(provider).to_string());
    match ProviderConfig::from_store(provider, &model, &KeyStore::default_location(), &settings) {
        Ok(config) => Ok(Box::new(LlmExtractor::new(provider, config))),
        Err(e) if explicit => Err(e).context(format!("configuring {provider}")),
        Err(e) => {
            warn!(error = %e, "configured provider unusable; using keyword extraction");
            Ok(Box::new(KeywordExtractor))
        }
    }
}

async fn generate(
    prompt: &str,
    provider: Option<Provider>,
    model: Option<String>,
    output: &Path,
    options: RunOptions,
    offline: bool,
    stdout: bool,
) -> Result<ExitCode> {
    let profile = extractor(provider, model, offline)?
        .extract(prompt)
        .await
        .context("reading the description")?;

    let outcome = Pipeline::default()
        .run(&profile, options)
        .context("assembling the document")?;
    match outcome {
        Outcome::NeedsClarification { questions } => {
            println!("A few details are needed before a design can be drafted:\n");
            for (i, question) in questions.iter().enumerate() {
                println!("  {}. {question}", i + 1);
            }
            println!("\nAdd the answers to the prompt, or pass --no-recommendations to proceed on defaults.");
            Ok(ExitCode::from(EXIT_NEEDS_CLARIFICATION))
        }
        Outcome::Complete(generation) => {
            if stdout {
                print!("{}", generation.markdown());
            } else {
                let path = save_generation(output, &generation)
                    .with_context(|| format!("saving to {}", output.display()))?;
                info!(
                    assumptions = generation.record.assumptions.len(),
                    rounds = generation.rounds,
                    "document generated"
                );
                println!("Wrote {}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Rejected { report, .. } => {
            println!("The generated document did not pass validation:\n");
            print_report(&report);
            Ok(ExitCode::FAILURE)
        }
    }
}

// --- config ---

fn config(cmd: ConfigCommands) -> Result<()> {
    let keys = KeyStore::default_location();
    match cmd {
        ConfigCommands::SetKey { provider, key } => {
            keys.store_key(&provider, &key)?;
            println!("Stored key for {}", provider.trim().to_lowercase());
        }
        ConfigCommands::ListKeys => {
            let listed = keys.list_keys()?;
            if listed.is_empty() {
                println!("No keys stored");
            }
            for (provider, masked) in listed {
                println!("{provider}: {masked}");
            }
        }
        ConfigCommands::DeleteKey { provider } => {
            keys.delete_key(&provider)?;
            println!("Deleted key for {}", provider.trim().to_lowercase());
        }
        ConfigCommands::SetModel { provider, model } => {
            let mut settings = read_settings();
            settings.provider = Some(provider);
            settings.model = Some(model.trim().to_string());
            write_settings(&settings).context("saving settings")?;
            println!("Default model set to {provider}/{}", model.trim());
        }
        ConfigCommands::Show => {
            let settings = read_settings();
            println!("Config directory: {}", specify_dir().display());
            match settings.provider {
                Some(provider) => {
                    let model = settings.model_for(provider).unwrap_or(default_model(provider));
                    println!("Provider: {provider}");
                    println!("Model: {model}");
                }
                None => println!("Provider: none (keyword extraction)"),
            }
            if let Some(url) = &settings.base_url {
                println!("Base URL: {url}");
            }
            println!("Timeout: {}s", settings.timeout_secs);
            println!("Max retries: {}", settings.max_retries);
            for provider in Provider::ALL {
                let stored = keys.key_exists(provider.as_str())?;
                println!("{provider} key: {}", if stored { "set" } else { "not set" });
            }
        }
    }
    Ok(())
}

// --- validation ---

fn print_report(report: &ValidationReport) {
    for result in &report.results {
        let mark = if result.passed { "PASS" } else { "FAIL" };
        match &result.detail {
            Some(detail) if !result.passed => println!("  [{mark}] {}: {detail}", result.criterion.label()),
            _ => println!("  [{mark}] {}", result.criterion.label()),
        }
    }
}

fn check_consistency(dir: &Path) -> Result<ExitCode> {
    let (document, record) = load_generation(dir)?;
    let report = ValidationChecklist::run(&document, &record.config);
    print_report(&report);
    if report.passed() {
        println!("\nAll checks passed");
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "\n{} check(s) failed; run `specify fix-inconsistencies` to regenerate the affected sections",
            report.failures().count()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn fix_inconsistencies(dir: &Path, dry_run: bool) -> Result<ExitCode> {
    let (mut document, record) = load_generation(dir)?;
    let report = ValidationChecklist::run(&document, &record.config);
    if report.passed() {
        println!("No inconsistencies found");
        return Ok(ExitCode::SUCCESS);
    }

    let sections = report.failing_sections();
    if dry_run {
        println!("Would regenerate:");
        for id in &sections {
            println!("  {}", id.heading());
        }
        return Ok(ExitCode::SUCCESS);
    }

    pipeline::regenerate(&mut document, &record.config, &record.assumptions, &sections);
    let report = ValidationChecklist::run(&document, &record.config);
    let path = write_document(dir, &document)?;
    println!("Regenerated {} section(s) in {}", sections.len(), path.display());
    if report.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        print_report(&report);
        Ok(ExitCode::FAILURE)
    }
}

// --- check-connection ---

async fn check_connection(provider: Option<Provider>) -> Result<ExitCode> {
    let settings = read_settings();
    let Some(provider) = provider.or(settings.provider) else {
        bail!("no provider configured; pass --provider or run `specify config set-model`");
    };
    let model = settings
        .model_for(provider)
        .unwrap_or(default_model(provider))
        .to_string();
    let config = ProviderConfig::from_store(provider, &model, &KeyStore::default_location(), &settings)?;

    match engine::validate_connection(provider, &config).await {
        Ok(()) => {
            println!("{provider}: connected");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{provider}: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
