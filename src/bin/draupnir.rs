//! draupnir: template and candidate CLI
//!
//! Offline interface to the template renderer and the deterministic
//! candidate pipeline. No backend is contacted.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use draupnir::{
    ArtifactContext, ArtifactKind, CancellationToken, CandidatePipeline, Config, RenderOptions,
    TemplateRenderer, TracingNotifier,
};
use serde_json::Value;

/// Draupnir CLI
#[derive(Parser)]
#[command(name = "draupnir")]
#[command(version)]
#[command(about = "Render prompt templates and rank container artifact candidates")]
struct Args {
    /// Config file (default: ~/.draupnir/config.toml, then /etc/draupnir/config.toml)
    #[arg(short, long, env = "DRAUPNIR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List built-in templates
    Templates,

    /// Render a template and print the system and user prompts
    Render {
        /// Template id
        id: String,
        /// Variable as key=value (value parsed as JSON when possible)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
        /// Fail on missing required variables
        #[arg(long)]
        strict: bool,
    },

    /// Generate, score and rank candidates with the built-in strategies
    Candidates {
        /// Application name
        app: String,
        #[arg(long, value_enum, default_value = "dockerfile")]
        kind: Kind,
        /// Language (Dockerfiles)
        #[arg(long, default_value = "python")]
        language: String,
        /// Image reference (manifests)
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Number of candidates
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,
        /// Print the winning artifact only
        #[arg(long)]
        winner_only: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Dockerfile,
    Manifest,
}

fn parse_var(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Templates => {
            for template in draupnir::template::builtin_templates() {
                println!(
                    "{:<26} {:<8} {}",
                    template.id,
                    template.version,
                    template.description
                );
            }
        }
        Command::Render { id, vars, strict } => {
            let store = config.template_store();
            let template = store.get(&id).await?;
            let options = RenderOptions::new()
                .strict(strict)
                .include_examples(config.render_options().include_examples);
            let variables: BTreeMap<String, Value> = vars.into_iter().collect();
            let prompt = TemplateRenderer::new(options).render(&template, &variables)?;

            println!("--- system ---\n{}", prompt.system);
            println!("--- user ---\n{}", prompt.user);
            if !prompt.metadata.missing.is_empty() {
                eprintln!("missing: {}", prompt.metadata.missing.join(", "));
            }
        }
        Command::Candidates {
            app,
            kind,
            language,
            image,
            port,
            count,
            winner_only,
        } => {
            let (kind, mut ctx) = match kind {
                Kind::Dockerfile => (
                    ArtifactKind::Dockerfile,
                    ArtifactContext::dockerfile(&app, language),
                ),
                Kind::Manifest => {
                    let image = image.unwrap_or_else(|| format!("{app}:1.0.0"));
                    (
                        ArtifactKind::KubernetesManifest,
                        ArtifactContext::manifest(&app, image),
                    )
                }
            };
            if let Some(port) = port {
                ctx = ctx.port(port);
            }

            let pipeline = CandidatePipeline::for_kind(kind)
                .notifier(std::sync::Arc::new(TracingNotifier));
            let outcome = pipeline.run(&ctx, count, &CancellationToken::new()).await?;

            if winner_only {
                print!("{}", outcome.winner.candidate.content);
            } else {
                for scored in &outcome.ranked {
                    println!(
                        "#{} {:<24} {:>6.2}  {}",
                        scored.rank,
                        scored.candidate.metadata.strategy,
                        scored.score,
                        scored.rationale
                    );
                }
                println!("\n--- winner: {} ---", outcome.winner.candidate.id);
                print!("{}", outcome.winner.candidate.content);
            }
        }
    }

    Ok(())
}
