use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use ehrtok::{
    ApproxBatchSampler, ClinicalTokenizer, SamplerConfig, SortishSampler, TimelineConfig,
    TokenEntry, TokenizerConfig, UnknownPolicy, Vocabulary, DEFAULT_UNK_TOKEN,
};
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use serde_json::json;

#[derive(Parser, Debug)]
#[command(author, version, about = "EHR tokenizer toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect a tokenizer config: entry and stat counts per variant
    Info(InfoArgs),
    /// Load a tokenizer config and check its partition invariants
    Validate(ValidateArgs),
    /// Tokenize patient timelines with a tokenizer config
    Tokenize(TokenizeArgs),
    /// Compute projected lengths and a batch plan for timelines
    Lengths(LengthsArgs),
}

#[derive(Args, Debug)]
struct InfoArgs {
    /// Path to tokenizer_config.json
    #[arg(short = 'm', long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Path to tokenizer_config.json
    #[arg(short = 'm', long = "config", value_name = "PATH")]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct TokenizeArgs {
    /// Path to tokenizer_config.json
    #[arg(short = 'm', long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Timeline JSONL files or directories to tokenize
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Sentinel emitted for unmappable events
    #[arg(long, value_name = "TOKEN", default_value = DEFAULT_UNK_TOKEN)]
    unk_token: String,

    /// Fail on events whose value/unit matches no partition
    #[arg(long)]
    strict: bool,

    /// Emit one JSON array of tokens per patient instead of plain text
    #[arg(long)]
    json: bool,

    /// Disable recursive directory traversal
    #[arg(long)]
    no_recursive: bool,

    /// Follow symlinks during traversal
    #[arg(long)]
    follow_symlinks: bool,
}

#[derive(Args, Debug)]
struct LengthsArgs {
    /// Path to tokenizer_config.json
    #[arg(short = 'm', long = "config", value_name = "PATH")]
    config: PathBuf,

    /// Timeline JSONL files or directories to plan batches for
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Shuffle bucket size
    #[arg(long, value_name = "SIZE")]
    bucket_size: Option<usize>,

    /// Per-batch token budget
    #[arg(long, value_name = "TOKENS")]
    max_tokens: Option<usize>,

    /// Per-sequence truncation ceiling
    #[arg(long, value_name = "LEN")]
    max_length: Option<usize>,

    /// Base RNG seed
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Epoch to materialise the ordering for
    #[arg(long, value_name = "N", default_value_t = 0)]
    epoch: u64,

    /// Number of distributed replicas
    #[arg(long, value_name = "N")]
    replicas: Option<usize>,

    /// Use the deterministic val/test ordering (no shuffling, bucket size 1)
    #[arg(long)]
    deterministic: bool,

    /// Emit machine-readable JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.command {
        Commands::Info(args) => run_info(&args),
        Commands::Validate(args) => run_validate(&args),
        Commands::Tokenize(args) => run_tokenize(&args),
        Commands::Lengths(args) => run_lengths(&args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    let level = match i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=-2 => "off",
        -1 => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn load_config(path: &Path) -> Result<TokenizerConfig> {
    TokenizerConfig::load(path).with_context(|| format!("loading tokenizer config {path:?}"))
}

fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let mut code_entries = 0usize;
    let mut numeric_entries = 0usize;
    let mut categorical_entries = 0usize;
    let mut stat_count = 0usize;
    for entry in &config.tokens {
        match entry {
            TokenEntry::Code { .. } => code_entries += 1,
            TokenEntry::NumericalRange { .. } => numeric_entries += 1,
            TokenEntry::Categorical { .. } => categorical_entries += 1,
        }
        stat_count += entry.stats().len();
    }

    if args.json {
        let summary = json!({
            "entries": config.tokens.len(),
            "code": code_entries,
            "numerical_range": numeric_entries,
            "categorical": categorical_entries,
            "stats": stat_count,
            "metadata_keys": config.metadata.keys().collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Vocab size: {}", config.tokens.len());
        println!("  code entries:            {code_entries}");
        println!("  numerical_range entries: {numeric_entries}");
        println!("  categorical entries:     {categorical_entries}");
        println!("  attached stats:          {stat_count}");
        println!("  metadata keys:           {}", config.metadata.len());
    }
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let vocab = Vocabulary::from_entries(&config.tokens)
        .with_context(|| format!("validating tokenizer config {:?}", args.config))?;
    println!(
        "OK: {} entries across {} codes",
        config.tokens.len(),
        vocab.num_codes()
    );
    Ok(())
}

fn build_tokenizer(config_path: &Path, unk_token: &str, strict: bool) -> Result<ClinicalTokenizer> {
    let config = load_config(config_path)?;
    let vocab = Vocabulary::from_entries(&config.tokens).context("building vocabulary index")?;
    let policy = if strict {
        UnknownPolicy::Strict
    } else {
        UnknownPolicy::MapToUnk
    };
    Ok(ClinicalTokenizer::new(vocab)
        .with_unk_token(unk_token)
        .with_policy(policy))
}

fn run_tokenize(args: &TokenizeArgs) -> Result<()> {
    let tokenizer = build_tokenizer(&args.config, &args.unk_token, args.strict)?;
    let timeline_cfg = TimelineConfig::builder()
        .recursive(!args.no_recursive)
        .follow_symlinks(args.follow_symlinks)
        .build();
    let timelines =
        ehrtok::timelines::load_timelines(&args.inputs, &timeline_cfg).context("loading timelines")?;
    info!("tokenizing {} patient timelines", timelines.len());

    let progress = ProgressBar::new(timelines.len() as u64).with_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} patients")
            .expect("valid progress template"),
    );
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for events in &timelines {
        let tokens = tokenizer.encode_events(events)?;
        if args.json {
            serde_json::to_writer(&mut out, &tokens)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", tokens.join(" "))?;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(())
}

fn run_lengths(args: &LengthsArgs) -> Result<()> {
    let tokenizer = build_tokenizer(&args.config, DEFAULT_UNK_TOKEN, false)?;
    let timelines = ehrtok::timelines::load_timelines(&args.inputs, &TimelineConfig::default())
        .context("loading timelines")?;
    let lengths = tokenizer.lengths_for_patients(&timelines)?;

    let mut builder = SamplerConfig::builder();
    if let Some(value) = args.bucket_size {
        builder = builder.bucket_size(value);
    }
    if let Some(value) = args.max_tokens {
        builder = builder.max_tokens(value);
    }
    if let Some(value) = args.max_length {
        builder = builder.max_length(value);
    }
    if let Some(value) = args.seed {
        builder = builder.seed(value);
    }
    if let Some(value) = args.replicas {
        builder = builder.n_replicas(value);
    }
    let mut cfg = builder.build().context("sampler configuration")?;
    if args.deterministic {
        cfg = cfg.deterministic();
    }

    let sortish = SortishSampler::new(lengths.clone(), &cfg)?;
    let sampler = ApproxBatchSampler::new(sortish, &cfg)?;
    let batches = sampler.batches(args.epoch);

    let mut total_clipped = 0usize;
    let mut padded_total = 0usize;
    for batch in &batches {
        let clipped: Vec<usize> = batch.iter().map(|&idx| sampler.clipped_length(idx)).collect();
        let batch_max = clipped.iter().copied().max().unwrap_or(0);
        total_clipped += clipped.iter().sum::<usize>();
        padded_total += batch_max * batch.len();
    }
    let waste = padded_total.saturating_sub(total_clipped);

    if args.json {
        let summary = json!({
            "patients": lengths.len(),
            "batches": batches.len(),
            "clipped_tokens": total_clipped,
            "padded_tokens": padded_total,
            "padding_waste": waste,
            "epoch": args.epoch,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Patients:       {}", lengths.len());
        println!("Batches:        {}", batches.len());
        println!("Clipped tokens: {total_clipped}");
        println!("Padded tokens:  {padded_total}");
        println!("Padding waste:  {waste}");
    }
    Ok(())
}
