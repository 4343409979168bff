//! `qaboard` command-line client

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use qaboard_core::query::{filter_by_state, search, QuestionStats, StateFilter};
use qaboard_core::{
    ClientConfig, Credentials, QaClient, Question, QuestionDraft, QuestionField, QuestionId,
    Rating, Source, ViewerContext,
};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Durable store used when neither flag, file nor environment names one
const DEFAULT_STORAGE: &str = ".qaboard/state.json";

fn cli() -> Command {
    let id_arg = || Arg::new("id").required(true).help("Question id");

    Command::new("qaboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Question board client")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("endpoint")
                .long("endpoint")
                .global(true)
                .help("Backend endpoint URL"),
        )
        .arg(
            Arg::new("storage")
                .long("storage")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("File holding the session and local records"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("ping").about("Check that the backend answers"))
        .subcommand(Command::new("status").about("Show backend status"))
        .subcommand(
            Command::new("questions")
                .about("List questions")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include private questions (requires login)"),
                )
                .arg(
                    Arg::new("state")
                        .long("state")
                        .default_value("all")
                        .value_parser(value_parser!(StateFilter))
                        .help("all, answered or waiting"),
                )
                .arg(Arg::new("search").long("search").help("Search term"))
                .arg(Arg::new("topic").long("topic").help("Exact topic name"))
                .arg(
                    Arg::new("stats")
                        .long("stats")
                        .action(ArgAction::SetTrue)
                        .help("Print counts instead of questions"),
                ),
        )
        .subcommand(Command::new("topics").about("List topics"))
        .subcommand(
            Command::new("ask")
                .about("Submit a question")
                .arg(Arg::new("topic").long("topic").required(true))
                .arg(Arg::new("content").long("content").required(true))
                .arg(Arg::new("name").long("name"))
                .arg(Arg::new("email").long("email"))
                .arg(
                    Arg::new("anonymous")
                        .long("anonymous")
                        .action(ArgAction::SetTrue)
                        .help("Submit without a name"),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Sign in as an administrator")
                .arg(Arg::new("admin-id").long("id").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("QABOARD_PASSWORD")
                        .hide_env_values(true)
                        .required(true),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out"))
        .subcommand(
            Command::new("answer")
                .about("Answer a question")
                .arg(id_arg())
                .arg(Arg::new("content").long("content").required(true))
                .arg(
                    Arg::new("public")
                        .long("public")
                        .action(ArgAction::SetTrue)
                        .help("Publish with the answer"),
                ),
        )
        .subcommand(
            Command::new("toggle")
                .about("Flip a question's public visibility")
                .arg(id_arg()),
        )
        .subcommand(Command::new("delete").about("Delete a question").arg(id_arg()))
        .subcommand(
            Command::new("rate")
                .about("Rate an answered question")
                .arg(id_arg())
                .arg(
                    Arg::new("stars")
                        .long("stars")
                        .required(true)
                        .value_parser(value_parser!(u8).range(1..=5)),
                )
                .arg(Arg::new("comment").long("comment").default_value("")),
        )
        .subcommand(Command::new("refresh").about("Drop cached data and reload"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<ClientConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ClientConfig::from_toml_file(path)?,
        None => ClientConfig::default(),
    }
    .with_overrides(|name| std::env::var(name).ok());

    if let Some(endpoint) = matches.get_one::<String>("endpoint") {
        config = config.with_endpoint(endpoint.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("storage") {
        config = config.with_storage_path(path.clone());
    }
    if config.storage_path.is_none() {
        config = config.with_storage_path(DEFAULT_STORAGE);
    }
    config.validate()?;
    Ok(config)
}

fn print_question(q: &Question) {
    let visibility = if q.visibility { "public" } else { "private" };
    println!("[{}] {} ({}, {})", q.id, q.topic, q.state, visibility);
    println!("    Q: {}", q.content);
    if let Some(answer) = q.answer.as_deref().filter(|a| !a.is_empty()) {
        println!("    A: {answer}");
    }
    if let (Some(avg), Some(total)) = (q.average_rating, q.total_ratings) {
        println!("    rating {avg:.1} from {total}");
    }
}

fn note_source(source: Source) {
    if source.is_degraded() {
        eprintln!("warning: showing {source:?} data; the backend could not be reached");
    }
}

/// Session-backed context; fails when none is active
async fn require_admin(client: &QaClient) -> Result<ViewerContext> {
    if client.restore_session().await.is_none() {
        bail!("no active session; run `qaboard login` first");
    }
    Ok(ViewerContext::elevated())
}

async fn mutate(
    client: &QaClient,
    id: &str,
    field: impl FnOnce(&Question) -> QuestionField,
) -> Result<()> {
    let viewer = require_admin(client).await?;
    client.load_questions(&viewer).await?;
    let id = QuestionId::from(id);
    let current = client
        .questions()
        .get(&id)
        .with_context(|| format!("question {id} not found"))?;
    client.mutate(&id, field(&current), &viewer).await?;
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<()> {
    let config = load_config(&matches)?;
    debug!(endpoint = %config.transport.endpoint, "client configured");
    let client = QaClient::new(config)?;

    match matches.subcommand() {
        Some(("ping", _)) => {
            let status = client.system_status().await;
            if !status.reachable {
                bail!("backend unreachable");
            }
            println!("ok");
        }
        Some(("status", _)) => {
            let status = client.system_status().await;
            println!("reachable: {}", status.reachable);
            if let Some(details) = status.details {
                println!("{}", serde_json::to_string_pretty(&details)?);
            }
        }
        Some(("questions", args)) => {
            let viewer = if args.get_flag("all") {
                require_admin(&client).await?
            } else {
                ViewerContext::public()
            };
            let loaded = client.load_questions(&viewer).await?;
            note_source(loaded.source);

            let state = args.get_one::<StateFilter>("state").copied().unwrap_or_default();
            let term = args.get_one::<String>("search").map_or("", String::as_str);
            let topic = args.get_one::<String>("topic").map(String::as_str);
            let by_state: Vec<Question> = filter_by_state(&loaded.items, state, viewer.role())
                .into_iter()
                .cloned()
                .collect();
            let found = search(&by_state, term, topic, viewer.role());

            if args.get_flag("stats") {
                let stats = QuestionStats::from(loaded.items.as_slice());
                println!(
                    "total {} answered {} waiting {} public {}",
                    stats.total, stats.answered, stats.waiting, stats.public
                );
            } else if found.is_empty() {
                println!("no questions");
            } else {
                found.into_iter().for_each(print_question);
            }
        }
        Some(("topics", _)) => {
            let loaded = client.load_topics(&client.viewer()).await;
            note_source(loaded.source);
            for topic in loaded.items {
                println!("{}", topic.name);
            }
        }
        Some(("ask", args)) => {
            let topic = args.get_one::<String>("topic").map_or("", String::as_str);
            let content = args.get_one::<String>("content").map_or("", String::as_str);
            let mut draft = QuestionDraft::new(topic, content);
            draft = if args.get_flag("anonymous") {
                draft.anonymous()
            } else {
                draft.from_person(
                    args.get_one::<String>("name").cloned().unwrap_or_default(),
                    args.get_one::<String>("email").cloned().unwrap_or_default(),
                )
            };
            let id = client.submit_question(draft).await?;
            println!("submitted {id}");
        }
        Some(("login", args)) => {
            let admin_id = args.get_one::<String>("admin-id").cloned().unwrap_or_default();
            let password = args.get_one::<String>("password").cloned().unwrap_or_default();
            let session = client.login(Credentials::new(admin_id, password)).await?;
            println!("signed in as {}", session.identity.display_name);
        }
        Some(("logout", _)) => {
            client.logout().await?;
            println!("signed out");
        }
        Some(("answer", args)) => {
            let id = args.get_one::<String>("id").map_or("", String::as_str);
            let content = args.get_one::<String>("content").cloned().unwrap_or_default();
            let visibility = args.get_flag("public");
            mutate(&client, id, |_| QuestionField::Answer { content, visibility }).await?;
            println!("answered {id}");
        }
        Some(("toggle", args)) => {
            let id = args.get_one::<String>("id").map_or("", String::as_str);
            mutate(&client, id, |q| QuestionField::Visibility(!q.visibility)).await?;
            println!("toggled {id}");
        }
        Some(("delete", args)) => {
            let id = args.get_one::<String>("id").map_or("", String::as_str);
            mutate(&client, id, |_| QuestionField::Delete).await?;
            println!("deleted {id}");
        }
        Some(("rate", args)) => {
            let id = args.get_one::<String>("id").map_or("", String::as_str);
            let stars = args.get_one::<u8>("stars").copied().unwrap_or_default();
            let comment = args.get_one::<String>("comment").cloned().unwrap_or_default();
            client.rate(Rating::new(id.into(), stars, comment)?).await?;
            println!("rated {id}");
        }
        Some(("refresh", _)) => {
            client.restore_session().await;
            let refreshed = client.refresh(&client.viewer()).await?;
            note_source(refreshed.questions.source);
            println!(
                "{} topics, {} questions",
                refreshed.topics.items.len(),
                refreshed.questions.items.len()
            );
        }
        _ => unreachable!("subcommand_required is set"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));
    run(matches).await
}
