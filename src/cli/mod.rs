//!
//! ppadmin command-line front end
//! ------------------------------
//! Parses flags, opens the file-backed session, and runs one command against
//! the backend through the gateway. Lists print as ASCII tables unless
//! `--json` is given.

pub mod table;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::api::{
    entity_options, filter_by_entity, ActivityPage, ProjectInput, TagInput, UserCreate,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::gateway::ApiClient;
use crate::session::{access_token_expiry, FileBackend, GuardDecision, RouteGuard, SessionStore, UserRole, View};

pub const EXIT_OK: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_LOGIN_REQUIRED: i32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectCmd {
    List,
    Show(i64),
    Create(ProjectInput),
    Update(i64, ProjectInput),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TagCmd {
    List,
    Create(String),
    Rename(i64, String),
    Delete(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserCmd {
    List,
    Create(UserCreate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login { user: String, password: String },
    Logout,
    Status,
    Projects(ProjectCmd),
    Tags(TagCmd),
    Users(UserCmd),
    Activity { page: ActivityPage, entity: Option<String> },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub base_url: Option<String>,
    pub session_file: Option<PathBuf>,
    pub json: bool,
    pub command: Command,
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage:\n  {program} [--base-url <url>] [--session-file <path>] [--json] <command>\n\nCommands:\n  login --user <email> --password <p>      authenticate and store the session\n  logout                                   clear the stored session\n  status                                   show the stored session\n  projects [list]                          list projects\n  projects show <id>\n  projects create --title <t> [--description <d>] [--github-url <u>] [--public] [--tag <id>]...\n  projects update <id> --title <t> [...same flags as create]\n  projects delete <id>\n  tags [list] | tags create <name> | tags rename <id> <name> | tags delete <id>\n  users [list]                             admin only\n  users create --email <e> --password <p> --role <editor|viewer>\n  activity [--limit N] [--offset N] [--entity E]   admin only\n\nEnvironment:\n  PP_API_BASE_URL (default http://127.0.0.1:8000), PP_HTTP_TIMEOUT_MS, PP_SESSION_FILE, RUST_LOG"
    )
}

fn take_value(args: &[String], i: &mut usize, flag: &str) -> Result<String, String> {
    if *i + 1 >= args.len() {
        return Err(format!("{} requires a value", flag));
    }
    *i += 2;
    Ok(args[*i - 1].clone())
}

fn parse_id(s: &str) -> Result<i64, String> {
    s.parse().map_err(|_| format!("'{}' is not a valid id", s))
}

fn parse_project_input(args: &[String]) -> Result<ProjectInput, String> {
    let mut input = ProjectInput::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--title" => input.title = take_value(args, &mut i, "--title")?,
            "--description" => input.description = take_value(args, &mut i, "--description")?,
            "--github-url" => input.github_url = Some(take_value(args, &mut i, "--github-url")?),
            "--tag" => input.tag_ids.push(parse_id(&take_value(args, &mut i, "--tag")?)?),
            "--public" => { input.is_public = true; i += 1; }
            unk => return Err(format!("unrecognized project flag: {}", unk)),
        }
    }
    if input.title.trim().is_empty() {
        return Err("--title is required".to_string());
    }
    Ok(input)
}

fn parse_command(rest: &[String]) -> Result<Command, String> {
    let Some(cmd) = rest.first() else { return Ok(Command::Help) };
    let args = &rest[1..];
    let sub = args.first().map(|s| s.as_str());
    match cmd.as_str() {
        "login" => {
            let (mut user, mut password) = (None, None);
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--user" | "--email" => user = Some(take_value(args, &mut i, "--user")?),
                    "--password" => password = Some(take_value(args, &mut i, "--password")?),
                    unk => return Err(format!("unrecognized login flag: {}", unk)),
                }
            }
            match (user, password) {
                (Some(user), Some(password)) => Ok(Command::Login { user, password }),
                _ => Err("login requires --user and --password".to_string()),
            }
        }
        "logout" => Ok(Command::Logout),
        "status" => Ok(Command::Status),
        "projects" => match sub {
            None | Some("list") => Ok(Command::Projects(ProjectCmd::List)),
            Some("show") => Ok(Command::Projects(ProjectCmd::Show(parse_id(args.get(1).ok_or("show requires an id")?)?))),
            Some("create") => Ok(Command::Projects(ProjectCmd::Create(parse_project_input(&args[1..])?))),
            Some("update") => {
                let id = parse_id(args.get(1).ok_or("update requires an id")?)?;
                Ok(Command::Projects(ProjectCmd::Update(id, parse_project_input(&args[2..])?)))
            }
            Some("delete") => Ok(Command::Projects(ProjectCmd::Delete(parse_id(args.get(1).ok_or("delete requires an id")?)?))),
            Some(other) => Err(format!("unknown projects command: {}", other)),
        },
        "tags" => match sub {
            None | Some("list") => Ok(Command::Tags(TagCmd::List)),
            Some("create") => Ok(Command::Tags(TagCmd::Create(args.get(1).ok_or("create requires a name")?.clone()))),
            Some("rename") => {
                let id = parse_id(args.get(1).ok_or("rename requires an id")?)?;
                let name = args.get(2).ok_or("rename requires a name")?.clone();
                Ok(Command::Tags(TagCmd::Rename(id, name)))
            }
            Some("delete") => Ok(Command::Tags(TagCmd::Delete(parse_id(args.get(1).ok_or("delete requires an id")?)?))),
            Some(other) => Err(format!("unknown tags command: {}", other)),
        },
        "users" => match sub {
            None | Some("list") => Ok(Command::Users(UserCmd::List)),
            Some("create") => {
                let (mut email, mut password, mut role) = (None, None, UserRole::Viewer);
                let rest = &args[1..];
                let mut i = 0;
                while i < rest.len() {
                    match rest[i].as_str() {
                        "--email" => email = Some(take_value(rest, &mut i, "--email")?),
                        "--password" => password = Some(take_value(rest, &mut i, "--password")?),
                        "--role" => role = take_value(rest, &mut i, "--role")?.parse()?,
                        unk => return Err(format!("unrecognized users flag: {}", unk)),
                    }
                }
                match (email, password) {
                    (Some(email), Some(password)) => Ok(Command::Users(UserCmd::Create(UserCreate { email, password, role }))),
                    _ => Err("users create requires --email and --password".to_string()),
                }
            }
            Some(other) => Err(format!("unknown users command: {}", other)),
        },
        "activity" => {
            let mut page = ActivityPage::default();
            let mut entity = None;
            let mut i = 0;
            while i < args.len() {
                match args[i].as_str() {
                    "--limit" => page.limit = take_value(args, &mut i, "--limit")?.parse().map_err(|_| "--limit must be a number")?,
                    "--offset" => page.offset = take_value(args, &mut i, "--offset")?.parse().map_err(|_| "--offset must be a number")?,
                    "--entity" => entity = Some(take_value(args, &mut i, "--entity")?),
                    unk => return Err(format!("unrecognized activity flag: {}", unk)),
                }
            }
            if page.limit == 0 {
                return Err("--limit must be positive".to_string());
            }
            Ok(Command::Activity { page, entity })
        }
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => Err(format!("unknown command: {}", other)),
    }
}

/// Parse everything after the program name.
pub fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut base_url = None;
    let mut session_file = None;
    let mut json = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--base-url" => base_url = Some(take_value(args, &mut i, "--base-url")?),
            "--session-file" => session_file = Some(PathBuf::from(take_value(args, &mut i, "--session-file")?)),
            "--json" => { json = true; i += 1; }
            "-h" | "--help" => return Ok(CliArgs { base_url, session_file, json, command: Command::Help }),
            _ => break,
        }
    }
    let command = parse_command(&args[i..])?;
    Ok(CliArgs { base_url, session_file, json, command })
}

/// Map a failed call to an exit code, consulting the guard the same way the
/// views do: only a cleared session sends the user back to login.
fn report_failure(view: View, session: &SessionStore, err: &ApiError) -> i32 {
    match RouteGuard::after_failure(view, &session.snapshot(), err) {
        GuardDecision::RedirectToLogin => {
            eprintln!("session expired: please run `login` again");
            EXIT_LOGIN_REQUIRED
        }
        _ => {
            eprintln!("error: {}", err);
            EXIT_ERROR
        }
    }
}

fn view_for(cmd: &Command) -> View {
    match cmd {
        Command::Projects(_) => View::Projects,
        Command::Tags(_) => View::Tags,
        Command::Users(_) => View::Users,
        Command::Activity { .. } => View::Activity,
        _ => View::Login,
    }
}

/// Run a parsed command and return the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    if args.command == Command::Help {
        println!("{}", usage("ppadmin"));
        return Ok(EXIT_OK);
    }

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url)?;
    }
    if let Some(path) = &args.session_file {
        config = config.with_session_file(path.clone());
    }
    debug!(target: "cli", "base_url={} session_file={:?}", config.base_url, config.session_file);

    let session = Arc::new(SessionStore::new(Arc::new(FileBackend::open(&config.session_file)?)));
    let client = ApiClient::new(config, session.clone())?;

    let view = view_for(&args.command);
    let snapshot = session.snapshot();
    match RouteGuard::check(view, &snapshot) {
        GuardDecision::Allow => {}
        GuardDecision::RedirectToProjects if snapshot.is_authenticated() => {
            eprintln!("this command is available to admins only");
            return Ok(EXIT_ERROR);
        }
        GuardDecision::RedirectToLogin | GuardDecision::RedirectToProjects => {
            eprintln!("not logged in: run `login --user <email> --password <p>` first");
            return Ok(EXIT_LOGIN_REQUIRED);
        }
    }

    let res = execute(&client, &args).await;
    match res {
        Ok(()) => Ok(EXIT_OK),
        Err(e) => Ok(report_failure(view, &session, &e)),
    }
}

async fn execute(client: &ApiClient, args: &CliArgs) -> Result<(), ApiError> {
    let json = args.json;
    let out = |v: serde_json::Value| table::print_value(&v, json);
    match &args.command {
        Command::Help => {}
        Command::Login { user, password } => {
            let pair = client.login(user, password).await?;
            println!("logged in as {} (role: {}, org: {})", user, pair.role, pair.org_id.as_deref().unwrap_or("-"));
        }
        Command::Logout => {
            client.logout()?;
            println!("logged out");
        }
        Command::Status => {
            let s = client.session().snapshot();
            if !s.is_authenticated() {
                println!("not logged in");
                return Ok(());
            }
            println!("authenticated: yes");
            println!("role: {}", s.role.map(|r| r.to_string()).unwrap_or_else(|| "-".into()));
            println!("org: {}", s.org_id.as_deref().unwrap_or("-"));
            println!("user id: {}", s.user_id.map(|u| u.to_string()).unwrap_or_else(|| "-".into()));
            if let Some(exp) = s.access_token.as_deref().and_then(access_token_expiry) {
                println!("access token expires: {}", exp.to_rfc3339());
            }
        }
        Command::Projects(cmd) => match cmd {
            ProjectCmd::List => out(serde_json::to_value(client.list_projects().await?)?),
            ProjectCmd::Show(id) => out(serde_json::to_value(vec![client.get_project(*id).await?])?),
            ProjectCmd::Create(input) => out(serde_json::to_value(vec![client.create_project(input).await?])?),
            ProjectCmd::Update(id, input) => out(serde_json::to_value(vec![client.update_project(*id, input).await?])?),
            ProjectCmd::Delete(id) => {
                client.delete_project(*id).await?;
                println!("project {} deleted", id);
            }
        },
        Command::Tags(cmd) => match cmd {
            TagCmd::List => out(serde_json::to_value(client.list_tags().await?)?),
            TagCmd::Create(name) => out(serde_json::to_value(vec![client.create_tag(&TagInput { name: name.clone() }).await?])?),
            TagCmd::Rename(id, name) => out(serde_json::to_value(vec![client.update_tag(*id, &TagInput { name: name.clone() }).await?])?),
            TagCmd::Delete(id) => {
                client.delete_tag(*id).await?;
                println!("tag {} deleted", id);
            }
        },
        Command::Users(cmd) => match cmd {
            UserCmd::List => out(serde_json::to_value(client.list_users().await?)?),
            UserCmd::Create(input) => out(serde_json::to_value(vec![client.create_user(input).await?])?),
        },
        Command::Activity { page, entity } => {
            let logs = client.list_activity(page.query()).await?;
            let now = chrono::Utc::now();
            let shown = filter_by_entity(&logs, entity.as_deref().unwrap_or("all"));
            let rows: Vec<serde_json::Value> = shown
                .iter()
                .map(|l| serde_json::json!({
                    "id": l.id,
                    "age": l.relative_age(now),
                    "action": l.action,
                    "kind": format!("{:?}", l.action_kind()).to_lowercase(),
                    "entity": l.entity,
                    "entity_id": l.entity_id,
                    "actor": l.actor_user_id,
                }))
                .collect();
            if json {
                out(serde_json::to_value(&shown)?);
            } else {
                out(serde_json::Value::Array(rows));
                println!("entities: {}", entity_options(&logs).join(", "));
                let mut nav = vec![format!("offset: {}", page.offset)];
                if page.has_prev() { nav.push(format!("prev: --offset {}", page.prev().offset)); }
                if page.has_next(logs.len()) { nav.push(format!("next: --offset {}", page.next().offset)); }
                println!("{}", nav.join("  "));
            }
        }
    }
    Ok(())
}
