use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reelfeed::app::App;
use reelfeed::config::{Config, TOKEN_ENV_VAR};
use reelfeed::connectivity::{ConnectivityProbe, StaticProbe, TcpProbe};
use reelfeed::feed::{CategoryFeed, FeedState};
use reelfeed::model::Category;
use reelfeed::storage::{Database, DatabaseError};

/// Get the config directory path (~/.config/reelfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("reelfeed"))
}

#[derive(Parser, Debug)]
#[command(name = "reelfeed", about = "Movie listings with an offline cache")]
struct Args {
    /// Config file (defaults to ~/.config/reelfeed/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip the network and serve only cached listings
    #[arg(long)]
    offline: bool,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Pages to load for listing commands
    #[arg(long, global = true, default_value_t = 1)]
    pages: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Today's trending movies
    Trending,
    /// Movies now in theatres
    NowPlaying,
    /// Popular movies
    Popular,
    /// Search movies by title
    Search { query: String },
    /// Trending and now playing together
    Home,
    /// List bookmarked movies
    Bookmarks,
    /// Toggle the bookmark on a listed or cached movie
    Bookmark { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access; the database holds the cache and bookmarks
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config_dir.join("reelfeed.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of reelfeed appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    match db
        .evict_stale_categories(Utc::now(), config.cache_ttl())
        .await
    {
        Ok(0) => {}
        Ok(evicted) => tracing::info!(evicted, "Evicted stale cached categories"),
        Err(e) => tracing::warn!(error = %e, "Failed to evict stale categories"),
    }

    let probe: Arc<dyn ConnectivityProbe> = if args.offline {
        Arc::new(StaticProbe::new(false))
    } else {
        Arc::new(TcpProbe::new(
            config.probe_address.clone(),
            Duration::from_secs(3),
        ))
    };

    let token = match config.api_token() {
        Some(token) => token,
        None if args.offline => SecretString::from(String::new()),
        None => anyhow::bail!(
            "No API token configured. Set {} or api_token in {}",
            TOKEN_ENV_VAR,
            config_path.display()
        ),
    };

    let app = App::new(&config, token, db, probe).context("Failed to create application")?;
    run(&app, &args.command, args.pages.max(1), &config.image_base_url).await
}

async fn run(app: &App, command: &Command, pages: u32, image_base: &str) -> Result<()> {
    match command {
        Command::Trending => show_category(app.feed(Category::Trending), pages, image_base).await,
        Command::NowPlaying => {
            show_category(app.feed(Category::NowPlaying), pages, image_base).await
        }
        Command::Popular => show_category(app.feed(Category::Popular), pages, image_base).await,
        Command::Search { query } => {
            let search = app.search();
            search.search_now(query).await;
            for _ in 1..pages {
                search.load_more().await;
            }
            let feed = if query.trim().is_empty() {
                search.popular()
            } else {
                search.results()
            };
            print_state(&feed.snapshot(), image_base);
        }
        Command::Home => {
            app.load_home().await;
            print_state(&app.feed(Category::Trending).snapshot(), image_base);
            println!();
            print_state(&app.feed(Category::NowPlaying).snapshot(), image_base);
        }
        Command::Bookmarks => {
            let bookmarks = app.bookmarks().await.context("Failed to read bookmarks")?;
            if bookmarks.is_empty() {
                println!("No bookmarks yet.");
            }
            for bookmark in bookmarks {
                println!(
                    "{:>8}  {}  (saved {})",
                    bookmark.item.id,
                    bookmark.item.title,
                    bookmark.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Bookmark { id } => {
            let item = app
                .find_item(*id)
                .await
                .context("Failed to look up movie")?
                .ok_or_else(|| {
                    anyhow::anyhow!("Movie {} is not in any cached listing. List it first.", id)
                })?;
            let bookmarked = app
                .toggle_bookmark(&item)
                .await
                .context("Failed to update bookmark")?;
            let verb = if bookmarked { "Bookmarked" } else { "Removed bookmark for" };
            println!("{} \"{}\"", verb, item.title);
        }
    }
    Ok(())
}

async fn show_category(feed: &CategoryFeed, pages: u32, image_base: &str) {
    feed.load().await;
    for _ in 1..pages {
        feed.load_more().await;
    }
    print_state(&feed.snapshot(), image_base);
}

fn print_state(state: &FeedState, image_base: &str) {
    let mut header = format!("== {} ==", state.category.label());
    if state.is_offline {
        header.push_str(" [offline]");
    }
    println!("{}", header);

    if let Some(error) = state.error_text() {
        println!("! {}", error);
    }
    for item in state.items.iter() {
        let year = item
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or("----");
        let score = item
            .score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        println!("{:>8}  {:<50}  {}  {:>4}", item.id, item.title, year, score);
        if let Some(url) = item.poster_url(image_base) {
            tracing::trace!(item_id = item.id, url = %url, "Poster");
        }
    }
    println!(
        "-- {} movies, page {}{}",
        state.items.len(),
        state.current_page,
        if state.can_load_more { ", more available" } else { "" }
    );
}
