//! arena-runner: headless round runner for the beacon arena.
//!
//! Usage:
//!   arena-runner --seed 1a2b3c --ticks 1000 bots/random-walker
//!   arena-runner --profile --generator eller bots/mine bots/rival
//!   arena-runner --config arena.json --rounds 50 --cache bots/mine

use anyhow::{bail, Context, Result};
use arena_core::{
    cache::{VisibilityCache, DEFAULT_CACHE_DIR},
    channel::ProcessBot,
    config::ArenaConfig,
    engine::{CancelToken, SimEngine},
    maze::ProcessMazeGenerator,
    rng::{round_seeds, seed_from_base36, seed_to_base36},
    stats::{RoundOutcome, RoundSummary},
};
use std::env;
use std::path::{Path, PathBuf};

/// Flags that take a value; anything else starting with `--` is a switch.
const VALUE_FLAGS: &[&str] = &[
    "--config",
    "--width",
    "--height",
    "--generator",
    "--seed",
    "--ticks",
    "--vis-radius",
    "--max-beacons",
    "--beacon-spawn",
    "--beacon-ttl",
    "--beacon-radius",
    "--beacon-cutoff",
    "--beacon-noise",
    "--beacon-quantization",
    "--beacon-fade",
    "--cache-dir",
    "--rounds",
    "--maze-command",
];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let config = build_config(&args)?;
    config.validate()?;

    let bot_dirs = bot_dirs(&args);
    if bot_dirs.is_empty() {
        bail!("Please specify a path to your bot");
    }
    if bot_dirs.len() > 2 {
        bail!("At most two bots per round, got {}", bot_dirs.len());
    }

    let maze = match flag_value(&args, "--maze-command") {
        Some(cmd) => ProcessMazeGenerator::new(cmd),
        None => ProcessMazeGenerator::default(),
    };
    let cache = config.cache.then(|| {
        VisibilityCache::new(flag_value(&args, "--cache-dir").unwrap_or(DEFAULT_CACHE_DIR))
    });
    if let Some(cache) = &cache {
        log::info!("visibility cache: {}", cache.dir().display());
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("installing Ctrl-C handler")?;

    let ctx = RoundContext { maze: &maze, cache: cache.as_ref(), bot_dirs: &bot_dirs, cancel: &cancel };

    if config.rounds == 1 {
        let (outcome, scores) = play_round(&ctx, config.clone())?;
        let scores: Vec<String> = scores.iter().map(u64::to_string).collect();
        println!("Seed: {} / Score: {}", seed_to_base36(config.seed), scores.join(" / "));
        if config.profile {
            log::info!("outcome: {}", serde_json::to_string(&outcome)?);
        }
        return Ok(());
    }

    let mut outcomes = Vec::with_capacity(config.rounds);
    for (i, seed) in round_seeds(config.seed, config.rounds).into_iter().enumerate() {
        let round_config = ArenaConfig { seed, ..config.clone() };
        let (outcome, _) = play_round(&ctx, round_config)?;
        log::debug!("round {i} seed {}: {}", seed_to_base36(seed), serde_json::to_string(&outcome)?);
        outcomes.push(outcome);
        eprint!("\rFinished round {} of {}...", i + 1, config.rounds);
    }
    eprintln!();
    print_summary(&RoundSummary::from_outcomes(&outcomes));
    Ok(())
}

struct RoundContext<'a> {
    maze: &'a ProcessMazeGenerator,
    cache: Option<&'a VisibilityCache>,
    bot_dirs: &'a [PathBuf],
    cancel: &'a CancelToken,
}

/// One full round with freshly started bots. Returns the outcome and
/// every bot's final score.
fn play_round(ctx: &RoundContext<'_>, config: ArenaConfig) -> Result<(RoundOutcome, Vec<u64>)> {
    let mut engine =
        SimEngine::setup(config, ctx.maze, ctx.cache)?.with_cancel_token(ctx.cancel.clone());
    for dir in ctx.bot_dirs {
        let bot = ProcessBot::launch_dir(dir)
            .with_context(|| format!("starting bot in {}", dir.display()))?;
        engine.add_bot(Box::new(bot))?;
    }
    let outcome = engine.run()?;
    let scores = engine.state().bots.iter().map(|b| b.score).collect();
    Ok((outcome, scores))
}

fn build_config(args: &[String]) -> Result<ArenaConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => ArenaConfig::load(path)?,
        None => ArenaConfig {
            seed: clock_seed(),
            ..ArenaConfig::default()
        },
    };

    if let Some(s) = flag_value(args, "--seed") {
        config.seed = seed_from_base36(s).with_context(|| format!("invalid base-36 seed '{s}'"))?;
    }
    if let Some(g) = flag_value(args, "--generator") {
        config.generator = g.to_string();
    }
    config.width = parse_arg(args, "--width", config.width)?;
    config.height = parse_arg(args, "--height", config.height)?;
    config.max_ticks = parse_arg(args, "--ticks", config.max_ticks)?;
    config.vis_radius = parse_arg(args, "--vis-radius", config.vis_radius)?;
    config.max_beacons = parse_arg(args, "--max-beacons", config.max_beacons)?;
    config.beacon_spawn = parse_arg(args, "--beacon-spawn", config.beacon_spawn)?;
    config.beacon_ttl = parse_arg(args, "--beacon-ttl", config.beacon_ttl)?;
    config.beacon_radius = parse_arg(args, "--beacon-radius", config.beacon_radius)?;
    config.beacon_cutoff = parse_arg(args, "--beacon-cutoff", config.beacon_cutoff)?;
    config.beacon_noise = parse_arg(args, "--beacon-noise", config.beacon_noise)?;
    config.beacon_quantization =
        parse_arg(args, "--beacon-quantization", config.beacon_quantization)?;
    config.beacon_fade = parse_arg(args, "--beacon-fade", config.beacon_fade)?;

    config.swap_bots |= has_flag(args, "--swap-bots");
    config.cache |= has_flag(args, "--cache");
    config.profile |= has_flag(args, "--profile");
    if config.profile && flag_value(args, "--rounds").is_none() {
        config.rounds = 20;
    }
    config.rounds = parse_arg(args, "--rounds", config.rounds)?;
    Ok(config)
}

fn print_summary(summary: &RoundSummary) {
    println!("Beacon Utilization   : {} %", fmt_metric(summary.mean_utilization));
    println!("Relative Instability : {} %", fmt_metric(summary.utilization_cv));
    println!("Time to First Capture: {} ticks", fmt_metric(summary.median_ticks_to_first_capture));
    println!("Capture Rate         : {} %", fmt_metric(Some(summary.capture_rate)));
    println!("Floor Tile Coverage  : {} %", fmt_metric(summary.mean_tile_coverage));
}

fn fmt_metric(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:5.1}"),
        None => "  n/a".to_string(),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> Result<T> {
    match flag_value(args, flag) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid value '{raw}' for {flag}")),
        None => Ok(default),
    }
}

/// Positional arguments: everything that is not a flag or a flag's value.
fn bot_dirs(args: &[String]) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            dirs.push(Path::new(arg).to_path_buf());
        }
    }
    dirs
}

fn clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64 & 0xFFFF_FFFF)
        .unwrap_or(0)
}
