//! CLI for gemimg - Gemini image generation.

use clap::{Args, Parser, Subcommand, ValueEnum};
use gemimg::config::{ConfigStore, JsonConfigStore, ProviderDefaults, StoredProviderConfig};
use gemimg::credentials::{CredentialStore, KeyringCredentialStore};
use gemimg::files::load_reference_image;
use gemimg::image::{
    output_dimensions, ImageSize, ASPECT_RATIOS, DEFAULT_ASPECT_RATIO, KNOWN_MODELS,
};
use gemimg::{
    GeminiProvider, GenerationRequest, GeneratorOptions, ImageProvider, ImageProviderExt,
    ModelCapabilities, TransportConfig, GEMINI_PROVIDER,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gemimg")]
#[command(about = "Generate images from text and reference images with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Show request details
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors and the output path
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an image from a text prompt
    Generate(GenerateArgs),

    /// Manage the stored API key
    #[command(subcommand)]
    Key(KeyCommand),

    /// Show or change provider settings
    #[command(subcommand)]
    Config(ConfigCommand),

    /// List known models and their output sizes
    Models,

    /// Check that the API is reachable with the stored key
    Check,
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Output file path (defaults to a timestamped PNG in the current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Reference image (repeat for several)
    #[arg(short, long = "input")]
    inputs: Vec<PathBuf>,

    /// Model id (overrides the configured model)
    #[arg(short, long)]
    model: Option<String>,

    /// Aspect ratio
    #[arg(
        short,
        long,
        default_value = DEFAULT_ASPECT_RATIO,
        value_parser = clap::builder::PossibleValuesParser::new(ASPECT_RATIOS.iter().copied())
    )]
    aspect_ratio: String,

    /// Output resolution (ignored by flash models)
    #[arg(short, long, value_enum)]
    resolution: Option<ResolutionArg>,

    /// Ground the generation with Google Search
    #[arg(long)]
    grounding: bool,

    /// API key to use instead of the keyring
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Retries on server and network errors
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Store an API key in the OS keyring
    Set {
        /// The API key
        key: String,
        /// Provider the key belongs to
        #[arg(long, default_value = GEMINI_PROVIDER)]
        provider: String,
    },
    /// Show the stored key (masked)
    Show {
        /// Provider the key belongs to
        #[arg(long, default_value = GEMINI_PROVIDER)]
        provider: String,
    },
    /// Delete the stored key
    Delete {
        /// Provider the key belongs to
        #[arg(long, default_value = GEMINI_PROVIDER)]
        provider: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Set the default model
    SetModel {
        /// Model id
        model: String,
    },
    /// Set the API base URL
    SetBaseUrl {
        /// Base URL, without API version
        url: String,
    },
    /// Remove all overrides
    Reset,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ResolutionArg {
    #[value(name = "1K", alias = "1k")]
    OneK,
    #[value(name = "2K", alias = "2k")]
    TwoK,
    #[value(name = "4K", alias = "4k")]
    FourK,
}

impl From<ResolutionArg> for ImageSize {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::OneK => ImageSize::OneK,
            ResolutionArg::TwoK => ImageSize::TwoK,
            ResolutionArg::FourK => ImageSize::FourK,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let options = GeneratorOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Generate(args) => generate_image(args, options, cli.json).await?,
        Commands::Key(cmd) => manage_key(cmd).await?,
        Commands::Config(cmd) => manage_config(cmd, cli.json)?,
        Commands::Models => list_models(cli.json)?,
        Commands::Check => check(options).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "gemimg=debug"
    } else if quiet {
        "gemimg=warn"
    } else {
        "gemimg=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn generate_image(
    args: GenerateArgs,
    options: GeneratorOptions,
    json_output: bool,
) -> anyhow::Result<()> {
    if args.prompt.trim().is_empty() {
        anyhow::bail!("prompt must not be empty");
    }

    let mut request = GenerationRequest::new(&args.prompt)
        .with_aspect_ratio(&args.aspect_ratio)
        .with_grounding(args.grounding);
    if let Some(model) = args.model {
        request = request.with_model(model);
    }
    if let Some(resolution) = args.resolution {
        request = request.with_image_size(resolution.into());
    }
    for path in &args.inputs {
        request = request.with_reference_image(load_reference_image(path)?);
    }

    let transport = TransportConfig::new()
        .max_retries(args.max_retries)
        .request_timeout(Duration::from_secs(args.timeout));
    let mut builder = GeminiProvider::builder()
        .transport(transport)
        .options(options);
    if let Some(key) = args.api_key {
        builder = builder.api_key(key);
    }
    let provider = builder.build()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling...");
            on_interrupt.cancel();
        }
    });

    let result = provider
        .generate_to_file(&request, args.output.as_deref(), &cancel)
        .await?;

    if json_output {
        let out = serde_json::json!({
            "type": "image",
            "success": true,
            "output": result.path.display().to_string(),
            "size_bytes": result.size(),
            "mime_type": result.mime_type,
            "model": result.metadata.model,
            "duration_ms": result.metadata.duration_ms,
            "attempts": result.metadata.attempts,
            "text": result.metadata.text,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if options.quiet {
        println!("{}", result.path.display());
    } else {
        println!(
            "Generated image: {} ({} bytes) via {}",
            result.path.display(),
            result.size(),
            result.metadata.model.as_deref().unwrap_or("gemini"),
        );
        if let Some(model) = result.metadata.model.as_deref() {
            let caps = ModelCapabilities::lookup(model);
            if let Some((w, h)) =
                output_dimensions(caps.family, &request.aspect_ratio, request.image_size)
            {
                println!("Expected size: {}x{}", w, h);
            }
        }
        if let Some(duration) = result.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
        if let Some(text) = result.metadata.text.as_deref() {
            println!("\n{}", text);
        }
    }

    Ok(())
}

async fn manage_key(cmd: KeyCommand) -> anyhow::Result<()> {
    let store = KeyringCredentialStore::new();
    match cmd {
        KeyCommand::Set { key, provider } => {
            store.set(&provider, key.trim()).await?;
            println!("Stored API key for {}", provider);
        }
        KeyCommand::Show { provider } => {
            let key = store.get(&provider).await?;
            println!("{}: {}", provider, mask(&key));
        }
        KeyCommand::Delete { provider } => {
            store.delete(&provider).await?;
            println!("Deleted API key for {}", provider);
        }
    }
    Ok(())
}

fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn manage_config(cmd: ConfigCommand, json_output: bool) -> anyhow::Result<()> {
    let store = JsonConfigStore::default_location()?;
    let mut stored = store.load(GEMINI_PROVIDER)?.unwrap_or_default();

    match cmd {
        ConfigCommand::Show => {
            let endpoint = store.resolve(GEMINI_PROVIDER)?;
            if json_output {
                let out = serde_json::json!({
                    "provider": GEMINI_PROVIDER,
                    "config_file": store.path().display().to_string(),
                    "base_url": endpoint.base_url,
                    "api_version": endpoint.api_version,
                    "model": endpoint.model,
                    "overrides": stored,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Config file: {}", store.path().display());
                println!("Provider:    {}", GEMINI_PROVIDER);
                println!("Base URL:    {}", endpoint.base_url);
                println!("API version: {}", endpoint.api_version);
                println!("Model:       {}", endpoint.model);
            }
            return Ok(());
        }
        ConfigCommand::SetModel { model } => {
            if ModelCapabilities::find(&model).is_none() {
                eprintln!(
                    "warning: '{}' is not a known model, assuming {} capabilities",
                    model,
                    ModelCapabilities::lookup(&model).family
                );
            }
            stored.model = Some(model);
        }
        ConfigCommand::SetBaseUrl { url } => {
            stored.base_url = Some(url);
        }
        ConfigCommand::Reset => {
            stored = StoredProviderConfig::default();
        }
    }

    store.save(GEMINI_PROVIDER, &stored)?;
    println!("Saved {}", store.path().display());
    Ok(())
}

fn list_models(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ModelInfo {
        id: &'static str,
        name: &'static str,
        family: String,
        max_reference_images: usize,
        default: bool,
        sizes: Vec<SizeInfo>,
    }

    #[derive(serde::Serialize)]
    struct SizeInfo {
        aspect_ratio: &'static str,
        resolution: Option<&'static str>,
        width: u32,
        height: u32,
    }

    let default_model = ProviderDefaults::lookup(GEMINI_PROVIDER).map(|d| d.model);

    let models: Vec<ModelInfo> = KNOWN_MODELS
        .iter()
        .map(|m| {
            let tiers: Vec<Option<ImageSize>> = if m.family.supports_image_size() {
                ImageSize::ALL.iter().copied().map(Some).collect()
            } else {
                vec![None]
            };
            let sizes = ASPECT_RATIOS
                .iter()
                .flat_map(|ratio| {
                    tiers.iter().filter_map(move |tier| {
                        output_dimensions(m.family, ratio, *tier).map(|(width, height)| {
                            SizeInfo {
                                aspect_ratio: *ratio,
                                resolution: tier.map(|t| t.as_str()),
                                width,
                                height,
                            }
                        })
                    })
                })
                .collect();
            ModelInfo {
                id: m.id,
                name: m.name,
                family: m.family.to_string(),
                max_reference_images: m.max_reference_images,
                default: Some(m.id) == default_model,
                sizes,
            }
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("Available models:\n");
    for m in &models {
        let marker = if m.default { " (default)" } else { "" };
        println!("  {} - {}{}", m.id, m.name, marker);
        println!(
            "    family: {}, up to {} reference images",
            m.family, m.max_reference_images
        );
        for s in &m.sizes {
            match s.resolution {
                Some(r) => println!("    {:>5} {:>2}  {}x{}", s.aspect_ratio, r, s.width, s.height),
                None => println!("    {:>5}     {}x{}", s.aspect_ratio, s.width, s.height),
            }
        }
        println!();
    }

    Ok(())
}

async fn check(options: GeneratorOptions) -> anyhow::Result<()> {
    let provider = GeminiProvider::builder().options(options).build()?;
    provider.health_check().await?;
    println!("{}: OK", provider.name());
    Ok(())
}
