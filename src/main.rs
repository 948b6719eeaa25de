use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dq_fishbone::collector::prefill_from_suggestions;
use dq_fishbone::config::AppConfig;
use dq_fishbone::export::{render_table, to_csv};
use dq_fishbone::fmea::{rpn, Rating, HIGH_RISK_THRESHOLD};
use dq_fishbone::render::{render_image, ImageFormat};
use dq_fishbone::session::{FormState, Session};
use dq_fishbone::suggest::{SuggestionClient, SuggestionOutcome};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dq-fishbone")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Data quality root cause analysis with fishbone diagrams and FMEA scoring")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with extra domain templates
    #[arg(long, global = true, env = "FISHBONE_TEMPLATES")]
    templates: Option<PathBuf>,

    /// API key for AI suggestions (or set OPENAI_API_KEY env var)
    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available domain templates
    Templates,
    /// Write a blank analysis form for a domain
    Init {
        /// Domain template name (e.g. Finance)
        #[arg(short, long)]
        domain: String,

        /// Main data quality issue
        #[arg(short, long, default_value = "Missing Customer IDs")]
        issue: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compute the RPN for a single cause
    Score {
        #[arg(short, long)]
        severity: u8,
        #[arg(short, long)]
        occurrence: u8,
        #[arg(short, long)]
        detectability: u8,
    },
    /// Ask the text-generation service for candidate causes
    Suggest {
        /// Main data quality issue
        issue: String,

        /// Show how suggestions map onto this domain's categories
        #[arg(short, long)]
        domain: Option<String>,
    },
    /// Score a filled-in form, draw the fishbone and export the FMEA table
    Analyze {
        /// Form file written by `init`
        form: PathBuf,

        /// Prefill empty categories with AI suggestions first
        #[arg(long)]
        suggest: bool,

        /// Write the FMEA table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the diagram as Graphviz DOT
        #[arg(long)]
        dot: Option<PathBuf>,

        /// Render the diagram to an image (requires Graphviz)
        #[arg(long)]
        image: Option<PathBuf>,

        /// Image format: svg or png
        #[arg(long, default_value = "svg")]
        format: String,

        /// Print the full analysis as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::from_env().context("Failed to read configuration")?;
    if args.templates.is_some() {
        config.templates_file = args.templates.clone();
    }
    if args.api_key.is_some() {
        config.suggestion.api_key = args.api_key.clone().filter(|k| !k.trim().is_empty());
    }

    match args.command {
        Commands::Templates => list_templates(&config),
        Commands::Init { domain, issue, output } => init_form(&config, &domain, &issue, output),
        Commands::Score { severity, occurrence, detectability } => {
            score(severity, occurrence, detectability)
        }
        Commands::Suggest { issue, domain } => suggest(&config, &issue, domain).await,
        Commands::Analyze { form, suggest, csv, dot, image, format, json } => {
            run_analysis(&config, form, suggest, csv, dot, image, &format, json).await
        }
    }
}

fn list_templates(config: &AppConfig) -> Result<()> {
    let registry = config.template_registry().context("Failed to load templates")?;
    for template in registry.templates() {
        println!("{}: {}", template.name, template.categories.join(", "));
    }
    Ok(())
}

fn init_form(config: &AppConfig, domain: &str, issue: &str, output: Option<PathBuf>) -> Result<()> {
    let registry = config.template_registry().context("Failed to load templates")?;
    let template = registry.get(domain)?;
    let form = FormState::blank(template, issue);
    let json = serde_json::to_string_pretty(&form)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write form to {}", path.display()))?;
            info!("Wrote blank {} form to {}", template.name, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn score(severity: u8, occurrence: u8, detectability: u8) -> Result<()> {
    let value = rpn(
        Rating::new(severity).context("Invalid severity")?,
        Rating::new(occurrence).context("Invalid occurrence")?,
        Rating::new(detectability).context("Invalid detectability")?,
    );
    if value >= HIGH_RISK_THRESHOLD {
        println!("RPN: {} (HIGH RISK)", value);
    } else {
        println!("RPN: {}", value);
    }
    Ok(())
}

async fn suggest(config: &AppConfig, issue: &str, domain: Option<String>) -> Result<()> {
    let client = SuggestionClient::new(&config.suggestion);
    let outcome = client.suggest(issue).await;
    print_outcome(&outcome);

    if let Some(domain) = domain {
        let registry = config.template_registry().context("Failed to load templates")?;
        let template = registry.get(&domain)?;
        println!("\nPrefill for {}:", template.name);
        for (category, text) in prefill_from_suggestions(&template.categories, outcome.causes()) {
            println!("  {}: {}", category, if text.is_empty() { "-" } else { text.as_str() });
        }
    }
    Ok(())
}

fn print_outcome(outcome: &SuggestionOutcome) {
    match outcome {
        SuggestionOutcome::Suggested(causes) if causes.is_empty() => println!("No causes suggested."),
        SuggestionOutcome::Suggested(causes) => {
            println!("Suggested causes:");
            for cause in causes {
                println!("  - {}", cause);
            }
        }
        SuggestionOutcome::Unavailable(msg) | SuggestionOutcome::Failed(msg) => {
            println!("Suggestions unavailable: {}", msg);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_analysis(
    config: &AppConfig,
    form_path: PathBuf,
    with_suggestions: bool,
    csv_path: Option<PathBuf>,
    dot_path: Option<PathBuf>,
    image_path: Option<PathBuf>,
    format: &str,
    json: bool,
) -> Result<()> {
    let registry = config.template_registry().context("Failed to load templates")?;
    let content = std::fs::read_to_string(&form_path)
        .with_context(|| format!("Failed to read form {}", form_path.display()))?;
    let form: FormState = serde_json::from_str(&content)
        .with_context(|| format!("Invalid form {}", form_path.display()))?;

    info!("Analyzing '{}' ({})", form.issue, form.domain);
    let mut session = Session::from_form(&registry, form)?;

    if with_suggestions {
        let client = SuggestionClient::new(&config.suggestion);
        let outcome = client.suggest(&session.form().issue).await;
        if let Some(msg) = outcome.diagnostic() {
            eprintln!("[WARN] {}", msg);
        }
        session.apply_suggestions(&outcome)?;
    }

    let view = session.view();

    if let Some(path) = &csv_path {
        std::fs::write(path, to_csv(&view.records)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote FMEA table to {}", path.display());
    }
    if let Some(path) = &dot_path {
        std::fs::write(path, view.dot())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote diagram to {}", path.display());
    }
    if let Some(path) = &image_path {
        let format: ImageFormat = format.parse()?;
        let bytes = render_image(&view.dot(), format)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Rendered diagram to {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!(" FMEA ANALYSIS: {} ({})", view.issue, view.domain);
    println!("{}", "=".repeat(80));
    if view.records.is_empty() {
        println!("\nNo causes entered.");
    } else {
        println!("\n{}", render_table(&view.records));
    }
    println!(
        "Causes: {}  High risk (RPN >= {}): {}  Max RPN: {}",
        view.summary.total,
        HIGH_RISK_THRESHOLD,
        view.summary.high_risk,
        view.summary.max_rpn.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}
