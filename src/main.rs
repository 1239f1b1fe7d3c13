// SPDX-License-Identifier: MPL-2.0

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::time::Duration;
use travel_book::TravelBookApp;
use travel_book::api::{AdvancedFilter, DateRange, NewStory, SortBy, StoryRecord};
use travel_book::config::{APP_NAME, IS_DEVEL};
use travel_book::query::{
    DataOrigin, QueryError, QueryOutcome, StoryQueries, StoryQuery, StoryStats,
};
use travel_book::runtime;
use travel_book::state::{AppSettings, Notice, SessionBackend, open_store};

#[derive(Parser)]
#[command(name = "travel-book", version, about = "Travel Book journal client")]
struct Cli {
    /// Treat the network as unavailable and answer from the local cache
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session
    Login {
        email: String,
        #[arg(long, env = "TRAVEL_BOOK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show the settings, or change and save them
    Config {
        #[arg(long)]
        api_url: Option<String>,
        /// Seconds before a remote call gives up
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        fixtures: Option<bool>,
        /// keyring or file
        #[arg(long)]
        session_backend: Option<SessionBackend>,
    },
    /// List every story
    List,
    /// Full-text search over titles, stories and places
    Search { query: String },
    /// Advanced search
    Filter {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        favourite: Option<bool>,
        /// newest, oldest, a-z or z-a
        #[arg(long)]
        sort: Option<SortBy>,
    },
    /// Stories visited between two dates, inclusive
    Range { from: NaiveDate, to: NaiveDate },
    /// Mark or unmark a story as favourite
    Favourite {
        id: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Show or hide a story on the public profile
    ShowOnProfile {
        id: String,
        #[arg(action = ArgAction::Set)]
        value: bool,
    },
    /// Write a new story
    Add(StoryArgs),
    /// Replace the editable fields of a story
    Edit {
        id: String,
        #[command(flatten)]
        story: StoryArgs,
    },
    /// Delete a story
    Delete { id: String },
    /// Analytics summary
    Stats,
    /// Stay running, probe connectivity and resync on reconnect
    Watch {
        /// Seconds between connectivity probes
        #[arg(long, default_value_t = 15)]
        interval: u64,
    },
}

#[derive(Args)]
struct StoryArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    story: String,
    /// Repeat for every place visited
    #[arg(long = "location")]
    locations: Vec<String>,
    #[arg(long)]
    date: NaiveDate,
    #[arg(long, default_value = "")]
    image_url: String,
}

impl From<StoryArgs> for NewStory {
    fn from(args: StoryArgs) -> Self {
        NewStory {
            title: args.title,
            story: args.story,
            image_url: args.image_url,
            visited_location: args.locations,
            visited_date: args.date,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if IS_DEVEL {
        tracing::info!("{APP_NAME} development build");
    }

    let cli = Cli::parse();
    let code = runtime::block_on(run(cli));
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    if let Command::Config {
        api_url,
        timeout,
        fixtures,
        session_backend,
    } = cli.command
    {
        return configure(api_url, timeout, fixtures, session_backend);
    }

    let settings = AppSettings::load();
    let sessions = match open_store(&settings) {
        Ok(sessions) => sessions,
        Err(e) => {
            eprintln!("Cannot locate session storage: {e}");
            return 1;
        }
    };

    // Probe once so the initial state reflects reality
    let mut app = match TravelBookApp::new(&settings, sessions, false) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return 1;
        }
    };
    let online = !cli.offline && app.source().ping().await;
    app.state().connectivity().set_online(online);
    if !online {
        tracing::info!("offline, answering from the local cache");
    }

    let needs_session = !matches!(cli.command, Command::Login { .. } | Command::Logout);
    if needs_session && !app.resume().await {
        eprintln!("Not signed in. Run `travel-book login <email>` first.");
        return 1;
    }

    match execute(&mut app, cli.command).await {
        Ok(()) => 0,
        Err(QueryError::SessionExpired) => {
            app.handle_session_expired().await;
            eprintln!("Your session has expired. Please sign in again.");
            2
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

async fn execute(app: &mut TravelBookApp, command: Command) -> Result<(), QueryError> {
    match command {
        Command::Login { email, password } => {
            let user = app.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.full_name, user.email);
            // Fill the offline cache right away
            app.queries()?.all_stories().await?;
        }
        Command::Logout => {
            app.logout().await;
            println!("Signed out");
        }
        Command::Whoami => {
            let user = app.refresh_user().await?;
            println!("{} <{}>", user.full_name, user.email);
        }
        Command::List => list(app, StoryQuery::All).await?,
        Command::Search { query } => list(app, StoryQuery::Search(query)).await?,
        Command::Filter {
            title,
            location,
            from,
            to,
            favourite,
            sort,
        } => {
            let range = DateRange {
                start_date: from,
                end_date: to,
            };
            let criteria = AdvancedFilter {
                title,
                location,
                date_range: (!range.is_empty()).then_some(range),
                is_favourite: favourite,
                sort_by: sort,
            };
            list(app, StoryQuery::Advanced(criteria)).await?
        }
        Command::Range { from, to } => {
            let query = StoryQuery::DateRange {
                from: Some(from),
                to: Some(to),
            };
            list(app, query).await?
        }
        Command::Favourite { id, value } => {
            let story = app.queries()?.set_favourite(&id, value).await?;
            println!("{}", line(&story));
        }
        Command::ShowOnProfile { id, value } => {
            let story = app.queries()?.set_show_on_profile(&id, value).await?;
            println!("{}", line(&story));
        }
        Command::Add(args) => {
            let queries = app.queries()?;
            let story = queries.add_story(&args.into()).await?;
            println!("Added {}", line(&story));
            queries.all_stories().await?;
        }
        Command::Edit { id, story } => {
            let queries = app.queries()?;
            let story = queries.edit_story(&id, &story.into()).await?;
            println!("Updated {}", line(&story));
            queries.all_stories().await?;
        }
        Command::Delete { id } => {
            let queries = app.queries()?;
            queries.delete_story(&id).await?;
            println!("Deleted {id}");
            queries.all_stories().await?;
        }
        Command::Config { .. } => unreachable!("config is handled before sign-in"),
        Command::Stats => print_stats(&app.queries()?.stats().await?),
        Command::Watch { interval } => watch(app, Duration::from_secs(interval.max(1))).await?,
    }
    Ok(())
}

async fn watch(app: &mut TravelBookApp, interval: Duration) -> Result<(), QueryError> {
    let mut notices = app.state().subscribe_notices();
    let listener = runtime::spawn(app.reconnect_sync()?.listen());
    let mut ticker = tokio::time::interval(interval);

    println!("Watching connectivity every {}s, Ctrl-C to stop", interval.as_secs());
    loop {
        ticker.tick().await;
        let online = app.source().ping().await;
        app.state().connectivity().set_online(online);

        while let Ok(notice) = notices.try_recv() {
            match notice {
                Notice::Synced { stories } => println!("Synced {stories} stories"),
                Notice::SyncFailed(reason) => println!("Sync failed: {reason}"),
                Notice::SessionExpired => {
                    listener.abort();
                    return Err(QueryError::SessionExpired);
                }
            }
        }
    }
}

async fn list(app: &TravelBookApp, query: StoryQuery) -> Result<(), QueryError> {
    let queries = app.queries()?;
    let outcome = queries.execute(&query).await?;
    show(&queries, &outcome).await;
    Ok(())
}

async fn show(queries: &StoryQueries, outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::NotExecuted => println!("Nothing to search for"),
        QueryOutcome::Completed { stories, origin } => {
            if stories.is_empty() {
                println!("No stories found");
            }
            for story in stories {
                println!("{}", line(story));
            }
            if *origin == DataOrigin::Cache {
                offline_note(queries).await;
            }
        }
    }
}

async fn offline_note(queries: &StoryQueries) {
    let cache = queries.cache();
    if !cache.has_any().await {
        println!("(offline: no stories cached yet, connect once to sync)");
        return;
    }
    match cache.last_synced().await {
        Some(at) => println!(
            "(offline: showing stories cached {})",
            at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
        ),
        None => println!("(offline: showing cached stories)"),
    }
}

fn configure(
    api_url: Option<String>,
    timeout: Option<u64>,
    fixtures: Option<bool>,
    session_backend: Option<SessionBackend>,
) -> i32 {
    let mut settings = AppSettings::load_stored();
    let changed = api_url.is_some()
        || timeout.is_some()
        || fixtures.is_some()
        || session_backend.is_some();

    if let Some(url) = api_url {
        settings.api_base_url = url;
    }
    if let Some(secs) = timeout {
        settings.request_timeout_secs = secs.max(1);
    }
    if let Some(fixtures) = fixtures {
        settings.use_fixtures = fixtures;
    }
    if let Some(backend) = session_backend {
        settings.session_backend = backend;
    }

    if changed && let Err(e) = settings.save() {
        eprintln!("{e}");
        return 1;
    }

    println!("api_base_url          {}", settings.api_base_url);
    println!("request_timeout_secs  {}", settings.request_timeout_secs);
    println!("use_fixtures          {}", settings.use_fixtures);
    println!("session_backend       {:?}", settings.session_backend);
    0
}

fn line(story: &StoryRecord) -> String {
    let mut flags = String::new();
    if story.is_favourite {
        flags.push('*');
    }
    if story.show_on_profile {
        flags.push('@');
    }
    format!(
        "{:<2} {}  {}  [{}]  ({})",
        flags,
        story.visited_date,
        story.title,
        story.visited_location.join(", "),
        story.id
    )
}

fn print_stats(stats: &StoryStats) {
    println!(
        "{} stories, {} favourites, {} on profile",
        stats.total, stats.favourites, stats.on_profile
    );
    if let (Some(first), Some(last)) = (stats.first_visit, stats.last_visit) {
        println!("Travelling from {first} to {last}");
    }
    for place in stats.locations.iter().take(10) {
        println!("  {:<24} {}", place.name, place.stories);
    }
    for month in &stats.per_month {
        println!("  {}-{:02}  {}", month.year, month.month, month.stories);
    }
}
