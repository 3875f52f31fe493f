use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use todo_cli::cli::{Cli, Command, collect_overrides};
use todo_core::config::{self, Config, ConfigOverrides};
use todo_core::error::AppError;
use todo_core::model::{Task, TaskId};
use todo_core::presenter::TaskPresenter;
use todo_core::repository::TaskRepository;
use todo_core::storage::JsonTaskStore;
use todo_core::view_model::{TaskViewModel, WriteFailure};
use tracing::{debug, warn};

struct Session {
    store: Arc<JsonTaskStore>,
    repository: TaskRepository,
    presenter: TaskPresenter,
    failures: broadcast::Receiver<WriteFailure>,
}

impl Session {
    async fn open(config: &Config, overrides: &ConfigOverrides) -> Result<Self, AppError> {
        let path = config::resolve_store_path(config, overrides)?;
        let store = Arc::new(JsonTaskStore::open(path).await?);
        let repository = TaskRepository::new(store.clone());
        let view_model = Arc::new(TaskViewModel::new(repository.clone()));
        let failures = view_model.failures();
        Ok(Self {
            store,
            repository,
            presenter: TaskPresenter::new(view_model),
            failures,
        })
    }

    /// The task list as it is on disk now, including writes made by other
    /// processes since the store was opened.
    async fn current_tasks(&self) -> Result<Vec<Task>, AppError> {
        self.store.refresh().await?;
        self.repository.current_tasks().await
    }

    async fn find_task(&self, id: TaskId) -> Result<Task, AppError> {
        self.current_tasks()
            .await?
            .into_iter()
            .find(|task| task.id == id)
            .ok_or(AppError::NotFound(id))
    }

    /// Waits for dispatched writes and reports the first one that failed.
    async fn settle(&mut self) -> Result<(), AppError> {
        self.presenter.view_model().settle().await;
        loop {
            match self.failures.try_recv() {
                Ok(failure) => return Err(failure.error),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "write failures skipped");
                }
                Err(_) => return Ok(()),
            }
        }
    }
}

fn check_mark(task: &Task) -> &'static str {
    if task.complete { "[x]" } else { "[ ]" }
}

fn print_tasks_plain(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    for task in tasks {
        if task.description.is_empty() {
            println!("{} | {} | {}", task.id, check_mark(task), task.title);
        } else {
            println!(
                "{} | {} | {} | {}",
                task.id,
                check_mark(task),
                task.title,
                task.description
            );
        }
    }
}

fn print_tasks_json(tasks: &[Task]) -> Result<(), AppError> {
    let json =
        serde_json::to_string(tasks).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{json}");
    Ok(())
}

fn print_task_json(task: &Task) -> Result<(), AppError> {
    let json =
        serde_json::to_string(task).map_err(|err| AppError::invalid_data(err.to_string()))?;
    println!("{json}");
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn is_display_request(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

async fn set_complete(
    session: &mut Session,
    id: TaskId,
    complete: bool,
    json: bool,
) -> Result<(), AppError> {
    let task = session.find_task(id).await?;
    session.presenter.dispatch_toggle_complete(&task, complete);
    session.settle().await?;

    let updated = task.with_complete(complete);
    if json {
        print_task_json(&updated)?;
    } else if complete {
        println!("Completed task: {} ({})", updated.title, updated.id);
    } else {
        println!("Reopened task: {} ({})", updated.title, updated.id);
    }
    Ok(())
}

async fn watch(session: &Session, count: Option<usize>, json: bool) -> Result<(), AppError> {
    let _file_watch = session.store.watch_file()?;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let subscription = session.presenter.on_tasks_changed(move |tasks| {
        let printed = if json {
            print_tasks_json(tasks)
        } else {
            print_tasks_plain(tasks);
            println!("--");
            Ok(())
        };
        if let Err(err) = printed {
            eprintln!("ERROR: {err}");
        }
        let _ = seen_tx.send(());
    });

    let mut seen = 0usize;
    loop {
        tokio::select! {
            received = seen_rx.recv() => {
                if received.is_none() {
                    break;
                }
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if !subscription.is_finished() {
        subscription.abort();
        return Ok(());
    }
    match subscription.await {
        Ok(outcome) => outcome,
        Err(err) => Err(AppError::io(err.to_string())),
    }
}

async fn run_command(cli: Cli, session: &mut Session) -> Result<(), AppError> {
    match cli.command {
        Command::Add { title, description } => {
            let title = match title {
                Some(value) if !value.trim().is_empty() => value,
                _ => return Err(AppError::invalid_input("title is required")),
            };
            let description = description.unwrap_or_default();

            session.presenter.dispatch_add_task(&title, &description)?;
            session.settle().await?;

            let (title, description) = (title.trim(), description.trim());
            let tasks = session.current_tasks().await?;
            let task = tasks
                .iter()
                .rev()
                .find(|task| task.title == title && task.description == description)
                .ok_or_else(|| AppError::invalid_data("added task is missing"))?;
            if cli.json {
                print_task_json(task)?;
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
        }
        Command::Done { id } => set_complete(session, id, true, cli.json).await?,
        Command::Undo { id } => set_complete(session, id, false, cli.json).await?,
        Command::Edit {
            id,
            title,
            description,
        } => {
            if title.is_none() && description.is_none() {
                return Err(AppError::invalid_input(
                    "nothing to edit: pass --title or --description",
                ));
            }

            let task = session.find_task(id).await?;
            let title = title.unwrap_or_else(|| task.title.clone());
            let description = description.unwrap_or_else(|| task.description.clone());
            session
                .presenter
                .dispatch_edit_task(&task, &title, &description)?;
            session.settle().await?;

            let updated = session.find_task(id).await?;
            if cli.json {
                print_task_json(&updated)?;
            } else {
                println!("Updated task: {} ({})", updated.title, updated.id);
            }
        }
        Command::List => {
            let tasks = session.current_tasks().await?;
            if cli.json {
                print_tasks_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
        }
        Command::Watch { count } => watch(session, count, cli.json).await?,
    }

    Ok(())
}

async fn run_interactive(session: &mut Session) -> Result<(), AppError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(input) = lines
        .next_line()
        .await
        .map_err(|err| AppError::io(err.to_string()))?
    {
        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {err}");
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("todo".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) if is_display_request(&err) => {
                println!("{err}");
                continue;
            }
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if let Err(err) = run_command(cli, session).await {
            eprintln!("ERROR: {err}");
        }
    }

    session.presenter.view_model().shutdown().await;
    Ok(())
}

fn fail(err: AppError) -> ! {
    eprintln!("ERROR: {err}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let loaded = config::load_config_with_fallback();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        todo_core::logging::init(loaded.config.log_filter.as_deref());
        if let Some(err) = loaded.error.as_ref() {
            warn!(error = %err, "ignoring unreadable config");
        }
        let mut session = Session::open(&loaded.config, &ConfigOverrides::default())
            .await
            .unwrap_or_else(|err| fail(err));
        if let Err(err) = run_interactive(&mut session).await {
            fail(err);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if is_display_request(&err) => err.exit(),
        Err(err) => fail(normalize_parse_error(err)),
    };

    let overrides = collect_overrides(&cli.config_override).unwrap_or_else(|err| fail(err));
    let config = config::merge_overrides(&loaded.config, &overrides);
    todo_core::logging::init(config.log_filter.as_deref());
    if let Some(err) = loaded.error.as_ref() {
        warn!(error = %err, "ignoring unreadable config");
    }

    let mut session = Session::open(&config, &overrides)
        .await
        .unwrap_or_else(|err| fail(err));
    if let Err(err) = run_command(cli, &mut session).await {
        fail(err);
    }
}
