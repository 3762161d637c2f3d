use std::sync::Arc;

use clap::Parser;
use noticeboard::{
    client::HttpAnnouncementApi,
    config::Settings,
    domain::EngagementMeta,
    engine::{AnnouncementStore, DepartmentClassifier, FeedSnapshot, PinOutcome},
    sync::SseChannel,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Follow the live announcement feed of a running record server.
#[derive(Parser, Debug)]
#[command(name = "follow", version)]
struct Args {
    /// Record server base URL (defaults to engine.api_base_url)
    #[arg(long)]
    api_base_url: Option<String>,

    /// Acting user for --view and --like
    #[arg(long, default_value = "cli-user")]
    user_id: String,

    #[arg(long)]
    user_name: Option<String>,

    /// Record a view on this announcement
    #[arg(long)]
    view: Option<String>,

    /// Record a like on this announcement
    #[arg(long)]
    like: Option<String>,

    /// Toggle the pin on this announcement
    #[arg(long)]
    pin: Option<String>,

    /// Print the feed once and exit
    #[arg(long)]
    once: bool,
}

fn print_feed(feed: &FeedSnapshot) {
    println!("\n[{:?}] {} visible announcement(s)", feed.sync_state, feed.ranked.len());
    for group in &feed.groups {
        println!("== {} ({}) ==", group.department, group.entries.len());
        for entry in &group.entries {
            let a = &entry.announcement;
            println!(
                "  {} [{}] {} | {} | views {} likes {} | {}",
                if a.is_pinned { "📌" } else { "  " },
                a.priority.as_str(),
                a.title,
                a.author,
                entry.counts.views,
                entry.counts.likes,
                a.id,
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "noticeboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    let mut engine = settings.engine.clone();
    if let Some(url) = args.api_base_url {
        engine.api_base_url = url;
    }
    let api = Arc::new(HttpAnnouncementApi::new(engine.api_base_url.clone()));
    let channel = Arc::new(SseChannel::new(engine.api_base_url.clone()));

    let store = AnnouncementStore::builder(api, channel)
        .config(engine)
        .classifier(DepartmentClassifier::from_config(&settings.departments))
        .build();

    let source = store.connect().await?;
    tracing::info!("Synced via {:?}", source);

    let meta = EngagementMeta {
        display_name: args.user_name.clone(),
        ..Default::default()
    };
    if let Some(id) = &args.view {
        let outcome = store.record_view(id, &args.user_id, meta.clone()).await?;
        println!("view {}: already recorded = {}", id, outcome.already_recorded);
    }
    if let Some(id) = &args.like {
        let outcome = store.record_acknowledge(id, &args.user_id, meta.clone()).await?;
        println!("like {}: already recorded = {}", id, outcome.already_recorded);
    }
    if let Some(id) = &args.pin {
        match store.toggle_pin(id).await? {
            PinOutcome::Accepted { pinned } => println!("pin {}: pinned = {}", id, pinned),
            PinOutcome::Rejected(reason) => println!("pin {}: rejected ({})", id, reason.code()),
        }
    }

    let mut feed = store.subscribe();
    print_feed(&feed.borrow_and_update());
    if args.once {
        store.dispose().await;
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                print_feed(&feed.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    store.dispose().await;
    Ok(())
}
