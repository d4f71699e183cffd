//! xchangectl - CLI client for xchanged
//!
//! Browse and post skills, and attest session completion, against a local
//! xchanged daemon.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod client;
mod render;

use clap::{Args, Parser, Subcommand};
use client::{Client, ClientError};
use xchange_core::posting::SkillForm;
use xchange_core::{
    Location, LocationFilter, Query, SkillLevel, SkillType, SortMode, TypeFilter, UserSummary,
};

/// CLI client for the xchanged marketplace daemon.
#[derive(Parser)]
#[command(name = "xchangectl")]
#[command(about = "Control plane for the xchanged skill exchange daemon")]
#[command(version)]
struct Cli {
    /// Daemon address (default: http://127.0.0.1:7800)
    #[arg(long, global = true, env = "XCHANGED_ADDR")]
    addr: Option<String>,

    /// Auth token for daemon API
    #[arg(long, global = true, env = "XCHANGED_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Browse listings with optional search, filters, and ordering
    Explore {
        /// Case-insensitive match on title or category
        #[arg(long, short)]
        search: Option<String>,

        /// all, teach, or learn
        #[arg(long = "type", default_value = "all")]
        skill_type: TypeFilter,

        /// all, remote, or in-person
        #[arg(long, default_value = "all")]
        location: LocationFilter,

        /// recent, reputation, or verified (daemon default when omitted)
        #[arg(long)]
        sort: Option<SortMode>,
    },

    /// List the categories accepted when posting
    Categories,

    /// Post a skill you can teach or want to learn
    Post(PostArgs),

    /// Inspect and complete exchange sessions
    #[command(subcommand)]
    Session(SessionCommand),
}

#[derive(Args)]
struct PostArgs {
    #[arg(long)]
    title: String,

    #[arg(long)]
    category: String,

    /// beginner, intermediate, or advanced
    #[arg(long)]
    level: SkillLevel,

    /// teach or learn
    #[arg(long = "type")]
    skill_type: SkillType,

    /// remote or in-person
    #[arg(long)]
    location: Location,

    #[arg(long)]
    description: String,

    /// Free text, e.g. "2 hours"
    #[arg(long, default_value = "")]
    duration: String,

    #[arg(long, default_value = "")]
    availability: String,

    /// Repeatable
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Display name of the posting account
    #[arg(long)]
    owner: String,

    /// Owner's average rating, 0 to 5
    #[arg(long, default_value_t = 0.0)]
    reputation: f64,

    #[arg(long)]
    verified: bool,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Show a session and its completion progress
    Show {
        session_id: String,

        /// Show the session from this account's point of view
        #[arg(long)]
        account: Option<String>,
    },

    /// Confirm that your side of the session is complete
    Confirm {
        session_id: String,

        /// Connected account attesting completion
        #[arg(long)]
        account: String,
    },

    /// Follow a session's event log until it completes
    Watch { session_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let addr = cli
        .addr
        .unwrap_or_else(|| "http://127.0.0.1:7800".to_string());
    let client = Client::new(&addr, cli.token.as_deref());

    if let Err(e) = client.wait_for_ready().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Explore {
            search,
            skill_type,
            location,
            sort,
        } => run_explore(&client, search, skill_type, location, sort).await,
        Command::Categories => run_categories(&client).await,
        Command::Post(args) => run_post(&client, args).await,
        Command::Session(SessionCommand::Show {
            session_id,
            account,
        }) => run_session_show(&client, &session_id, account.as_deref()).await,
        Command::Session(SessionCommand::Confirm {
            session_id,
            account,
        }) => run_session_confirm(&client, &session_id, &account).await,
        Command::Session(SessionCommand::Watch { session_id }) => {
            run_session_watch(&client, &session_id).await
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run_explore(
    client: &Client,
    search: Option<String>,
    skill_type: TypeFilter,
    location: LocationFilter,
    sort: Option<SortMode>,
) -> Result<(), ClientError> {
    let query = Query::default()
        .with_search(search.unwrap_or_default())
        .with_type(skill_type)
        .with_location(location);
    let listings = client.explore(&query, sort).await?;
    render::print_listings(&listings);
    Ok(())
}

async fn run_categories(client: &Client) -> Result<(), ClientError> {
    let categories = client.categories().await?;
    render::print_categories(&categories);
    Ok(())
}

async fn run_post(client: &Client, args: PostArgs) -> Result<(), ClientError> {
    let mut form = SkillForm {
        title: args.title,
        category: args.category,
        level: Some(args.level),
        skill_type: Some(args.skill_type),
        location: Some(args.location),
        duration: args.duration,
        description: args.description,
        availability: args.availability,
        ..SkillForm::default()
    };
    for tag in &args.tags {
        form.add_tag(tag);
    }
    let owner = UserSummary {
        name: args.owner,
        reputation: args.reputation,
        verified: args.verified,
    };

    let posted = client.post_skill(&form, &owner).await?;
    render::print_posted(&posted);
    Ok(())
}

async fn run_session_show(
    client: &Client,
    session_id: &str,
    account: Option<&str>,
) -> Result<(), ClientError> {
    let view = client.get_session(session_id, account).await?;
    render::print_session(&view);
    Ok(())
}

async fn run_session_confirm(
    client: &Client,
    session_id: &str,
    account: &str,
) -> Result<(), ClientError> {
    let response = client.confirm(session_id, account).await?;
    render::print_confirmation(&response);
    Ok(())
}

async fn run_session_watch(client: &Client, session_id: &str) -> Result<(), ClientError> {
    eprintln!("watching session {} at {}", session_id, client.addr());
    client.watch_session(session_id, render::print_event).await
}
