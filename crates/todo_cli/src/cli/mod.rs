use clap::{Parser, Subcommand};
use std::path::PathBuf;
use todo_core::config::ConfigOverrides;
use todo_core::error::AppError;
use todo_core::model::TaskId;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: todo add "Buy milk" -d "2%"
    Add {
        title: Option<String>,
        #[arg(short = 'd', long)]
        description: Option<String>,
    },
    /// Mark a task as complete
    ///
    /// Example: todo done 1
    Done { id: TaskId },
    /// Mark a completed task as not complete
    ///
    /// Example: todo undo 1
    Undo { id: TaskId },
    /// Change a task's title or description
    ///
    /// Example: todo edit 1 --title "Buy oat milk"
    /// Example: todo edit 1 --description "1 litre"
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all tasks
    ///
    /// Example: todo list
    List,
    /// Print the task list every time it changes
    ///
    /// Example: todo watch
    /// Example: todo watch --count 3
    Watch {
        /// Stop after this many lists
        #[arg(long)]
        count: Option<usize>,
    },
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    StorePath,
    LogFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "store_path" | "store" => ConfigOverrideTarget::StorePath,
        "log_filter" | "log" => ConfigOverrideTarget::LogFilter,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("override for '{field}' needs a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

pub fn collect_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)
            .map_err(|message| AppError::invalid_input(format!("{CONFIG_OVERRIDE_FLAG}: {message}")))?;
        match parsed.target {
            ConfigOverrideTarget::StorePath => {
                overrides.store_path = Some(PathBuf::from(parsed.value));
            }
            ConfigOverrideTarget::LogFilter => overrides.log_filter = Some(parsed.value),
        }
    }
    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, collect_overrides, parse_config_override};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Store-Path = /tmp/tasks.json ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::StorePath);
        assert_eq!(parsed.value, "/tmp/tasks.json");
    }

    #[test]
    fn parse_config_override_accepts_log_filter() {
        let parsed = parse_config_override("LOG_FILTER=todo_core=debug").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::LogFilter);
        assert_eq!(parsed.value, "todo_core=debug");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("theme=noir").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("store_path").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_value() {
        let err = parse_config_override("log_filter=  ").unwrap_err();
        assert!(err.contains("needs a value"));
    }

    #[test]
    fn collect_overrides_keeps_last_value() {
        let raw = vec![
            "store_path=/a.json".to_string(),
            "store_path=/b.json".to_string(),
            "log=info".to_string(),
        ];

        let overrides = collect_overrides(&raw).unwrap();

        assert_eq!(overrides.store_path, Some(PathBuf::from("/b.json")));
        assert_eq!(overrides.log_filter.as_deref(), Some("info"));
    }

    #[test]
    fn collect_overrides_reports_invalid_input() {
        let err = collect_overrides(&["nope".to_string()]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn add_accepts_description_flag() {
        let cli = Cli::try_parse_from(["todo", "add", "Buy milk", "-d", "2%"]).unwrap();

        match cli.command {
            Command::Add { title, description } => {
                assert_eq!(title.as_deref(), Some("Buy milk"));
                assert_eq!(description.as_deref(), Some("2%"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn done_requires_numeric_id() {
        assert!(Cli::try_parse_from(["todo", "done", "abc"]).is_err());
        assert!(Cli::try_parse_from(["todo", "done", "7"]).is_ok());
    }
}
