use std::io::Write;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Local, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fortuna_core::{
    prize_text, settle, Entry, EntryStats, EntryStore, PrizeTable, ProvablyFairRng, SpinEvent,
    SpinSequencer, SpinTiming, Ticket, Tier, Trigger,
};
use fortuna_shared::{Database, DEFAULT_DATABASE_URL};

#[derive(Parser)]
#[command(name = "fortuna-cli", about = "Admin CLI for the fortuna prize draw")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Database URL, default sqlite://fortuna.db
    #[arg(long, value_parser, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// Prize table JSON replacing the built-in odds
    #[arg(long, env = "PRIZE_TABLE")]
    prize_table: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate server seed to a new secret
    RotateSeed { new_seed: String },
    /// Show the newest N entries
    List {
        #[arg(default_value_t = 20)]
        n: usize,
    },
    /// Delete one entry by id
    Delete { id: String },
    /// Delete every entry
    Clear {
        /// Required, there is no undo
        #[arg(long)]
        yes: bool,
    },
    /// Totals across all entries
    Stats,
    /// Export entries to CSV path
    ExportCsv { path: String },
    /// Insert a handful of sample entries
    SeedDemo,
    /// Play one draw in the terminal and save the entry
    Spin {
        #[arg(long, default_value = "1000")]
        tier: String,
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "")]
        client_seed: String,
        /// Skip the reel animation
        #[arg(long)]
        instant: bool,
    },
}

fn print_entry(e: &Entry) {
    println!(
        "{} {} user={} tier={} prize={} image={}",
        e.id,
        e.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        e.username,
        e.tier_amount,
        prize_text(e.awarded_prize),
        if e.has_image() { "yes" } else { "no" }
    );
}

fn demo_entries() -> Vec<Entry> {
    const RECEIPT: &str = "data:image/svg+xml;base64,PHN2ZyB3aWR0aD0iMjAwIiBoZWlnaHQ9IjIwMCIgeG1sbnM9Imh0dHA6Ly93d3cudzMub3JnLzIwMDAvc3ZnIj48cmVjdCB3aWR0aD0iMjAwIiBoZWlnaHQ9IjIwMCIgZmlsbD0iIzMzMyIvPjwvc3ZnPg==";
    let now = Utc::now();
    [
        ("entry_test_001", 30, "player001", "1000", RECEIPT, 58),
        ("entry_test_002", 120, "luckystar88", "5000", RECEIPT, 168),
        ("entry_test_003", 300, "winner2025", "10000", RECEIPT, 666),
        ("entry_test_004", 24 * 60, "testuser123", "1000", "", 58),
        ("entry_test_005", 0, "newplayer", "5000", RECEIPT, 58),
    ]
    .into_iter()
    .map(|(id, minutes_ago, user, tier, image, prize)| Entry {
        id: id.to_string(),
        timestamp: now - ChronoDuration::minutes(minutes_ago),
        username: user.to_string(),
        tier_amount: tier.to_string(),
        proof_image: image.to_string(),
        awarded_prize: prize,
    })
    .collect()
}

/// Inserts the demo entries into an empty store. Returns how many were
/// inserted, zero when entries already exist.
async fn seed_demo<S: EntryStore>(store: &S) -> anyhow::Result<usize> {
    if !store.list_all().await?.is_empty() {
        return Ok(0);
    }
    let entries = demo_entries();
    for e in &entries {
        store.insert(e).await?;
    }
    Ok(entries.len())
}

async fn spin(
    db: &Database,
    prizes: &PrizeTable,
    tier: Tier,
    user: String,
    client_seed: String,
    instant: bool,
) -> anyhow::Result<()> {
    let p = db.next_nonce().await?;
    let rng = ProvablyFairRng::new(&p.server_seed, &client_seed, p.nonce as u64);
    let mut seq = SpinSequencer::with_timeline(
        prizes.tier(tier).clone(),
        SpinTiming::normal(),
        rng.stream(),
    );
    if seq.trigger() != Trigger::Started {
        anyhow::bail!("spin did not start");
    }

    // pace the virtual timeline against the wall clock
    let started = tokio::time::Instant::now();
    let mut revealed = None;
    while let Some(deadline) = seq.next_deadline() {
        if !instant {
            tokio::time::sleep_until(started + deadline).await;
        }
        for timed in seq.advance_to(deadline) {
            match timed.event {
                SpinEvent::Frame { reels } if !instant => {
                    print!("\r[ {} | {} | {} ]   ", reels[0], reels[1], reels[2]);
                    std::io::stdout().flush()?;
                }
                SpinEvent::Revealed {
                    result,
                    celebration,
                } => revealed = Some((result, celebration)),
                _ => {}
            }
        }
    }
    println!();

    let Some((result, celebration)) = revealed else {
        anyhow::bail!("spin finished without a result");
    };
    println!(
        "{} won {} (value {}, celebration {:?})",
        user, result.label, result.value, celebration
    );
    println!(
        "verify: server_seed_hash={} client_seed={:?} nonce={}",
        p.server_seed_hash, client_seed, p.nonce
    );

    let ticket = Ticket::new(user, tier, "");
    let settlement = settle(db, &ticket, result, Utc::now()).await;
    match settlement.persisted {
        Ok(()) => println!("saved as {}", settlement.entry.id),
        Err(e) => println!("result stands, but saving failed: {e}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let url = cli
        .database_url
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
    let db = Database::connect(&url).await?;

    match cli.command {
        Commands::RotateSeed { new_seed } => {
            let hash = db.rotate_seed(&new_seed).await?;
            println!("Rotated server seed. New hash: {}", hash);
        }
        Commands::List { n } => {
            for e in db.list_all().await?.iter().take(n) {
                print_entry(e);
            }
        }
        Commands::Delete { id } => {
            db.delete_by_id(&id).await?;
            println!("Deleted {}", id);
        }
        Commands::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete every entry without --yes");
            }
            db.delete_all().await?;
            println!("Deleted all entries");
        }
        Commands::Stats => {
            let entries = db.list_all().await?;
            let stats = EntryStats::compute(&entries, &Local::now());
            println!(
                "total={} today={} total_deposit=${}",
                stats.total, stats.today, stats.total_deposit
            );
        }
        Commands::ExportCsv { path } => {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(["id", "timestamp", "username", "tier_amount", "awarded_prize", "has_image"])?;
            let rows = db.list_all().await?;
            let total = rows.len();
            // oldest first, like a ledger
            for e in rows.iter().rev() {
                wtr.write_record(&[
                    e.id.clone(),
                    e.timestamp.to_rfc3339(),
                    e.username.clone(),
                    e.tier_amount.clone(),
                    e.awarded_prize.to_string(),
                    e.has_image().to_string(),
                ])?;
            }
            wtr.flush()?;
            println!("Exported {} rows to {}", total, path);
        }
        Commands::SeedDemo => match seed_demo(&db).await? {
            0 => println!("Entries already exist, skipping demo data"),
            n => println!("Inserted {} demo entries", n),
        },
        Commands::Spin {
            tier,
            user,
            client_seed,
            instant,
        } => {
            let prizes = match cli.prize_table {
                Some(path) => PrizeTable::load(path)?,
                None => PrizeTable::builtin(),
            };
            spin(&db, &prizes, Tier::resolve(&tier), user, client_seed, instant).await?;
        }
    }

    Ok(())
}
