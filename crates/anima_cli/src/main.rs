use anima_core::{AnimaConfig, Clock, InMemoryRepository, MemoryCategory, SystemClock};
use anima_expression::{
    DecisionLoop, DecisionScorer, EmotionSignal, Factor, RelationSignal, RelationTier,
    SharedSignal, SignalCollector, Signals, Situation, TimeSignal,
};
use anima_limbic::{BiologicalClock, EmotionEngine, EmotionModel, HeartbeatConfig};
use anima_memory::{ContextBuilder, HashingEmbedder, MemoryRecall, MemoryStore};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "anima", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config; missing files fall back to defaults
    #[arg(short, long, env = "ANIMA_CONFIG", default_value = "anima.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the decision loop and print every tick as a JSON line
    Run {
        /// Stop after this many ticks (default: until Ctrl-C)
        #[arg(long)]
        ticks: Option<u64>,
        /// Override decision.tick_interval_secs
        #[arg(long)]
        interval_secs: Option<u64>,
        #[arg(long, default_value = "acquaintance")]
        tier: RelationTier,
        /// Pushed urgency value in [0, 1]
        #[arg(long)]
        urgency: Option<f32>,
        /// Pushed context value in [0, 1]
        #[arg(long)]
        context: Option<f32>,
        /// Pushed curiosity value in [0, 1]
        #[arg(long)]
        curiosity: Option<f32>,
        /// Seed the memory store from a text file, one memory per line
        #[arg(long)]
        memories: Option<PathBuf>,
    },
    /// Score one set of signals and print the decision as JSON
    Decide {
        #[arg(long, default_value_t = 0.5)]
        time: f32,
        #[arg(long, default_value_t = 0.5)]
        emotion: f32,
        #[arg(long, default_value_t = 0.5)]
        relation: f32,
        #[arg(long, default_value_t = 0.0)]
        context: f32,
        #[arg(long, default_value_t = 0.0)]
        curiosity: f32,
        #[arg(long, default_value_t = 0.0)]
        urgency: f32,
        #[arg(long, default_value = "acquaintance")]
        tier: RelationTier,
        #[arg(long)]
        addressed: bool,
        #[arg(long)]
        conversation_active: bool,
    },
    /// Print the current biological and emotional state as JSON
    Status,
    /// Load memories (one per line) and print the prompt context for a query
    Recall {
        /// Text file with one memory per line
        #[arg(long)]
        file: PathBuf,
        query: String,
        #[arg(long, default_value = "episodic")]
        category: MemoryCategory,
        /// Token budget (default: retrieval.token_budget)
        #[arg(long)]
        budget: Option<usize>,
    },
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.log_json);

    let config = AnimaConfig::load_or_default(&args.config);

    match args.command {
        Command::Run {
            ticks,
            interval_secs,
            tier,
            urgency,
            context,
            curiosity,
            memories,
        } => {
            let pushed = [
                (Factor::Urgency, urgency),
                (Factor::Context, context),
                (Factor::Curiosity, curiosity),
            ];
            run(&config, ticks, interval_secs, tier, &pushed, memories.as_deref()).await
        }
        Command::Decide {
            time,
            emotion,
            relation,
            context,
            curiosity,
            urgency,
            tier,
            addressed,
            conversation_active,
        } => {
            let situation = Situation {
                tier,
                addressed,
                conversation_active,
            };
            let signals = Signals::from_array(
                [time, emotion, relation, context, curiosity, urgency],
                situation,
            );
            let (scores, decision) = DecisionScorer::new(config.decision.clone()).evaluate(&signals);
            let out = serde_json::json!({
                "scores": scores,
                "decision": decision,
                "explanation": decision.explain(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Command::Status => {
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let biology = BiologicalClock::new(config.biology.clone(), clock.clone());
            let emotion = EmotionEngine::new(EmotionModel::new(config.emotion.clone()), clock);
            let out = serde_json::json!({
                "biology": biology.current_state().await,
                "emotion": emotion.snapshot().await,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Command::Recall {
            file,
            query,
            category,
            budget,
        } => recall(&config, &file, &query, category, budget).await,
    }
}

async fn run(
    config: &AnimaConfig,
    ticks: Option<u64>,
    interval_secs: Option<u64>,
    tier: RelationTier,
    pushed: &[(Factor, Option<f32>)],
    memories: Option<&Path>,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new(
        Arc::new(InMemoryRepository::new()),
        clock.clone(),
        config.memory.clone(),
    ));
    if let Some(file) = memories {
        let count = ingest_file(&store, file, MemoryCategory::Episodic).await?;
        info!("Loaded {} memories from {}", count, file.display());
    }

    let emotion = Arc::new(EmotionEngine::new(
        EmotionModel::new(config.emotion.clone()),
        clock.clone(),
    ));
    let biology = Arc::new(BiologicalClock::new(config.biology.clone(), clock.clone()));
    let interactions = Arc::new(anima_expression::InteractionTracker::new(
        config.interaction.clone(),
        clock.clone(),
    ));

    let mut collector = SignalCollector::new(config.decision.fallback)
        .with_provider(Arc::new(EmotionSignal::new(emotion.clone())))
        .with_provider(Arc::new(TimeSignal::new(biology.clone())))
        .with_provider(Arc::new(RelationSignal::new(interactions.clone())));
    for (factor, value) in pushed {
        if let Some(v) = value {
            let signal = SharedSignal::new(*factor);
            signal.set(*v);
            collector.add_provider(Arc::new(signal));
        }
    }

    let looper = Arc::new(DecisionLoop::new(
        DecisionScorer::new(config.decision.clone()),
        collector,
        emotion,
        biology,
        interactions,
        clock,
    ));
    looper
        .set_situation(Situation {
            tier,
            ..Default::default()
        })
        .await;

    let heartbeat =
        HeartbeatConfig::from_secs(interval_secs.unwrap_or(config.decision.tick_interval_secs));
    info!("Starting decision loop (interval {:?})", heartbeat.interval);

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut rx = looper.subscribe();
    let handle = looper.clone().spawn(heartbeat, stop_rx.clone());
    let maintenance = store.spawn_maintenance(
        Duration::from_secs(config.memory.maintenance_interval_secs),
        stop_rx,
    );

    let mut seen = 0u64;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let tick = rx.borrow_and_update().clone();
                if let Some(tick) = tick {
                    println!("{}", serde_json::to_string(&tick)?);
                    seen += 1;
                    if ticks.is_some_and(|n| seen >= n) {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    stop_tx.send(true).ok();
    handle.await.context("decision loop task failed")?;
    maintenance.await.context("memory maintenance task failed")?;
    Ok(())
}

async fn recall(
    config: &AnimaConfig,
    file: &Path,
    query: &str,
    category: MemoryCategory,
    budget: Option<usize>,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let embedder = Arc::new(HashingEmbedder::new(512));
    let store = Arc::new(
        MemoryStore::new(
            Arc::new(InMemoryRepository::new()),
            clock,
            config.memory.clone(),
        )
        .with_embedder(embedder.clone()),
    );
    ingest_file(&store, file, category).await?;

    let recall = Arc::new(MemoryRecall::new(store, config.retrieval.clone()).with_embedder(embedder));
    let builder = ContextBuilder::new(recall, budget.unwrap_or(config.retrieval.token_budget));
    let context = builder.build(query, None).await;
    info!(
        "Assembled {} items in {}/{} tokens",
        context.item_count(),
        context.used_tokens,
        context.budget
    );
    print!("{}", context.render());
    Ok(())
}

/// Ingest every non-blank line of `file` as one memory.
async fn ingest_file(store: &MemoryStore, file: &Path, category: MemoryCategory) -> anyhow::Result<usize> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read memories from {}", file.display()))?;
    let mut count = 0;
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        store.ingest(line, category.clone(), "").await?;
        count += 1;
    }
    Ok(count)
}
