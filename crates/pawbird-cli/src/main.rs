// Pawbird CLI
//
//   pawbird run       start the scheduler (Ctrl-C stops it)
//   pawbird check     validate config and catalogs, print a summary
//   pawbird tag       annotate a text with catalog references
//   pawbird score     score a hypothetical post against the keyword list
//   pawbird rotation  print one rotation order

use chrono::{DateTime, Duration, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use pawbird::atoms::constants::{MAX_SCORE, TWEET_MAX_CHARS};
use pawbird::atoms::types::{char_len, CandidateContent, Priority, PublicMetrics, TrackedAccount};
use pawbird::engine::bootstrap;
use pawbird::engine::registry::InfluencerRegistry;
use pawbird::engine::scheduler;
use pawbird::engine::scorer::EngagementScorer;
use pawbird::engine::tagger::{ContentTagger, TagCatalog};
use pawbird::{BotConfig, EngineError, EngineResult, StopSignal};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pawbird", version, about = "Rate-limited engagement scheduler for a microblogging bot")]
struct Cli {
    /// Path to the bot config file
    #[arg(short, long, global = true, env = "PAWBIRD_CONFIG", default_value = "pawbird.toml")]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Machine-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start every enabled timer and run until interrupted
    Run {
        /// Log writes instead of publishing them (overrides bot.debug_mode)
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate config and catalogs
    Check,
    /// Append catalog references to a text
    Tag(TagArgs),
    /// Score a hypothetical post
    Score(ScoreArgs),
    /// Print the accounts one rotation pass would visit
    Rotation {
        /// Seed for a reproducible order
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct TagArgs {
    text: String,
    #[arg(long, default_value_t = TWEET_MAX_CHARS)]
    budget: usize,
    /// Content type hint, e.g. "post"
    #[arg(long)]
    hint: Option<String>,
}

#[derive(Args, Debug)]
struct ScoreArgs {
    text: String,
    #[arg(long, default_value_t = 0)]
    likes: u64,
    #[arg(long, default_value_t = 0)]
    reposts: u64,
    #[arg(long, default_value_t = 0)]
    replies: u64,
    /// Age of the post in minutes
    #[arg(long, default_value_t = 60)]
    age_minutes: i64,
    /// The post is itself a reply
    #[arg(long)]
    is_reply: bool,
    #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
    priority: PriorityArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match BotConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            init_logging(cli.verbose, false);
            error!("[cli] {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(cli.verbose, config.bot.debug_mode);
    info!("[cli] Config: {}", config_source(&cli.config));

    let result = match cli.command {
        Commands::Run { dry_run } => run(config, dry_run).await,
        Commands::Check => check(&config, cli.json),
        Commands::Tag(args) => tag(&config, &args, cli.json),
        Commands::Score(args) => score(&config, &args, cli.json),
        Commands::Rotation { seed } => rotation(&config, seed, cli.json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[cli] {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, debug_mode: bool) {
    let default = if verbose || debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

/// `BotConfig::load` runs before the logger exists, so its outcome is reported here.
fn config_source(path: &Path) -> String {
    if path.is_file() {
        format!("loaded {}", path.display())
    } else {
        format!("{} not found, using defaults", path.display())
    }
}

async fn run(mut config: BotConfig, dry_run: bool) -> EngineResult<()> {
    if dry_run {
        config.bot.debug_mode = true;
    }
    let orchestrator = Arc::new(bootstrap::build_orchestrator(config).await?);
    let stop = StopSignal::new();

    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("[cli] Interrupt received, stopping timers");
            on_interrupt.stop();
        }
    });

    scheduler::run(orchestrator, stop).await;
    Ok(())
}

fn check(config: &BotConfig, as_json: bool) -> EngineResult<()> {
    config.validate()?;
    let (accounts, tags) = bootstrap::load_catalogs(config)?;
    let tz = config.timezone()?;
    let by_priority = |p: Priority| accounts.accounts.iter().filter(|a| a.priority == p).count();

    if as_json {
        let summary = json!({
            "timezone": tz.to_string(),
            "debug_mode": config.bot.debug_mode,
            "accounts": {
                "total": accounts.accounts.len(),
                "high": by_priority(Priority::High),
                "medium": by_priority(Priority::Medium),
                "low": by_priority(Priority::Low),
            },
            "tags": {
                "categories": tags.categories.len(),
                "keywords": tags.keywords.len(),
                "events": tags.events.len(),
            },
            "quota": {
                "write": {"daily": config.quota.daily_write(), "monthly": config.quota.monthly_write_limit},
                "read": {"daily": config.quota.daily_read(), "monthly": config.quota.monthly_read_limit},
            },
            "read_budget_warning": config.read_budget_warning(),
            "llm": {"provider": config.llm.provider, "model": config.llm.model, "api_key_set": !config.llm.api_key.is_empty()},
            "twitter": {"access_token_set": !config.twitter.access_token.is_empty()},
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("config ok ({})", tz);
    println!(
        "accounts: {} ({} high, {} medium, {} low)",
        accounts.accounts.len(),
        by_priority(Priority::High),
        by_priority(Priority::Medium),
        by_priority(Priority::Low)
    );
    println!(
        "tags: {} categories, {} keywords, {} events",
        tags.categories.len(),
        tags.keywords.len(),
        tags.events.len()
    );
    println!(
        "quota: writes {}/day {}/month, reads {}/day {}/month",
        config.quota.daily_write(),
        config.quota.monthly_write_limit,
        config.quota.daily_read(),
        config.quota.monthly_read_limit
    );
    if config.llm.api_key.is_empty() {
        println!("warning: llm.api_key is not set");
    }
    if config.twitter.access_token.is_empty() && !config.bot.debug_mode {
        println!("warning: twitter.access_token is not set");
    }
    if let Some(w) = config.read_budget_warning() {
        println!("warning: {}", w);
    }
    Ok(())
}

fn tag(config: &BotConfig, args: &TagArgs, as_json: bool) -> EngineResult<()> {
    let tagger = ContentTagger::new(TagCatalog::load(&config.catalog.tags)?);
    let out = tagger.annotate(&args.text, args.budget, args.hint.as_deref());
    if as_json {
        let summary = json!({
            "text": out,
            "chars": char_len(&out),
            "budget": args.budget,
            "categories": tagger.matched_categories(&args.text),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", out);
        println!("({} / {} chars)", char_len(&out), args.budget);
    }
    Ok(())
}

fn score(config: &BotConfig, args: &ScoreArgs, as_json: bool) -> EngineResult<()> {
    let scorer = EngagementScorer::new(&config.engagement.keywords);
    let now = Utc::now();
    let account = TrackedAccount {
        id: "cli".into(),
        username: "cli".into(),
        name: "cli".into(),
        expertise: Vec::new(),
        response_style: String::new(),
        priority: args.priority.into(),
        max_replies_per_day: 1,
    };
    let content = CandidateContent {
        id: "cli".into(),
        author_id: "cli".into(),
        text: args.text.clone(),
        created_at: created_minutes_ago(now, args.age_minutes)?,
        metrics: PublicMetrics { reply_count: args.replies, like_count: args.likes, repost_count: args.reposts },
        is_reply: args.is_reply,
    };
    let s = scorer.score(&content, &account, now);
    let actionable = EngagementScorer::is_actionable(&s);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({"score": s, "actionable": actionable}))?);
    } else {
        println!(
            "keyword={} engagement={} timing={} original={} priority={}",
            s.keyword, s.engagement, s.timing, s.original, s.priority
        );
        println!("total {}/{}{}", s.total, MAX_SCORE, if actionable { " (actionable)" } else { "" });
    }
    Ok(())
}

fn created_minutes_ago(now: DateTime<Utc>, minutes: i64) -> EngineResult<DateTime<Utc>> {
    Duration::try_minutes(minutes)
        .and_then(|age| now.checked_sub_signed(age))
        .ok_or_else(|| EngineError::Config(format!("--age-minutes {} is out of range", minutes)))
}

fn rotation(config: &BotConfig, seed: Option<u64>, as_json: bool) -> EngineResult<()> {
    let (accounts, _) = bootstrap::load_catalogs(config)?;
    let registry = InfluencerRegistry::new(accounts, config.engagement.rotation_size, config.timezone()?);
    let now = Utc::now();
    let order = match seed {
        Some(s) => registry.rotation_order_with(now, &mut StdRng::seed_from_u64(s)),
        None => registry.rotation_order(now),
    };
    let rows: Vec<(String, String)> = order
        .iter()
        .filter_map(|id| registry.account(id))
        .map(|a| (a.username.clone(), a.priority.to_string()))
        .collect();
    if as_json {
        let list: Vec<_> = rows.iter().map(|(u, p)| json!({"username": u, "priority": p})).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for (i, (username, priority)) in rows.iter().enumerate() {
            println!("{:>2}. @{} ({})", i + 1, username, priority);
        }
    }
    Ok(())
}
