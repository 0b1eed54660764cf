use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::Parser;
use nostr_sdk::prelude::*;
use notewindow_core::bind::{format_age, Tier2Outcome};
use notewindow_core::cache::NullImageSource;
use notewindow_core::models::{EventId as NoteId, WindowQuery};
use notewindow_core::store::ingest_events;
use notewindow_core::tracing_setup::init_tracing;
use notewindow_core::{BindController, CoreConfig, EventWindow, NdbGateway, RowId, TextureCache, WindowConfig};

#[derive(Parser)]
#[command(name = "window_probe")]
#[command(about = "Open a nostrdb store, fill an event window and print its rows")]
struct Args {
    /// nostrdb data directory (defaults to NOTEWINDOW_DATA_DIR or ./notewindow_data)
    #[arg(long, short = 'd')]
    data_dir: Option<PathBuf>,

    /// Sign and ingest this many throwaway text notes first
    #[arg(long, default_value_t = 0)]
    seed: usize,

    /// Query limit for the window
    #[arg(long, short = 'n', default_value_t = 20)]
    limit: usize,

    /// Show the thread under this root event id (hex) instead of the global timeline
    #[arg(long)]
    thread: Option<String>,

    /// Print event ids and social counts
    #[arg(long, short)]
    verbose: bool,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn seed_notes(gateway: &NdbGateway, count: usize) -> Result<()> {
    let keys = Keys::generate();
    let base = now_secs().saturating_sub(count as u64 * 60);
    let mut events = Vec::with_capacity(count);
    for i in 0..count {
        let event = EventBuilder::text_note(format!("probe note {}", i + 1))
            .custom_created_at(Timestamp::from(base + i as u64 * 60))
            .sign_with_keys(&keys)?;
        events.push(event);
    }
    let accepted = ingest_events(gateway.ndb(), &events)?;
    println!("Seeded {} notes ({} accepted)", count, accepted);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let core = match args.data_dir {
        Some(dir) => CoreConfig::new(dir),
        None => CoreConfig::from_env(),
    };
    println!("Opening nostrdb at {}...", core.data_dir.display());
    let gateway = Arc::new(NdbGateway::open(&core).context("failed to open nostrdb")?);

    if args.seed > 0 {
        seed_notes(&gateway, args.seed)?;
    }

    let query = match args.thread.as_deref() {
        Some(hex) => {
            let Some(root) = NoteId::from_hex(hex) else {
                bail!("not a valid event id: {}", hex);
            };
            WindowQuery::thread(root)
        }
        None => WindowQuery::global(),
    }
    .with_limit(args.limit);

    let mut window = EventWindow::with_query(gateway.clone(), WindowConfig::from_env(), query);

    // Ingestion is asynchronous inside nostrdb; give seeded notes a moment to land
    let wanted = args.seed.min(window.config().cap_for(args.limit));
    window.refresh()?;
    for _ in 0..50 {
        if window.len() >= wanted {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
        window.refresh()?;
    }
    println!("Window holds {} entries", window.len());

    let mut binder = BindController::new(Arc::new(TextureCache::new(
        window.config().texture_cache_capacity,
        Arc::new(NullImageSource),
    )));
    if let Err(err) = window.refresh_counts() {
        println!("  (counts unavailable: {})", err);
    }

    let now = now_secs();
    let keys = window.keys().to_vec();
    for (i, key) in keys.into_iter().enumerate() {
        let row = RowId(i as u64);
        let ticket = binder.bind_tier1(&window, row, key);
        if binder.bind_tier2(&mut window, ticket) != Tier2Outcome::Applied {
            println!("  [{}] {} (payload unavailable)", i, key);
            continue;
        }
        let Some(model) = binder.row(row) else {
            continue;
        };

        let age = model.created_at.map(|t| format_age(t, now)).unwrap_or_default();
        let indent = "  ".repeat(model.depth as usize);
        let body: String = model.body.chars().take(60).collect();
        println!("{}  [{:>3}] {:>4} {}: {}", indent, i, age, model.author_label, body);
        if args.verbose {
            if let Some(id) = model.event_id {
                println!("{}        id: {}", indent, id.short_hex(16));
            }
            println!(
                "{}        likes: {} reposts: {} replies: {} zaps: {}",
                indent, model.counts.likes, model.counts.reposts, model.counts.replies, model.counts.zap_count
            );
        }
    }

    Ok(())
}
