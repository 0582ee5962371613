//! Console line protocol.
//!
//! ```text
//! add <account> <repo_id> <repo_name> <repo_file_path> <local_path>
//! done <account> <repo_id> <parent_dir> <local_path>
//! online | offline | status | quit
//! ```
//!
//! Fields are whitespace separated, so none of them may contain spaces.

use thiserror::Error;

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A file was modified locally.
    Add {
        account: String,
        repo_id: String,
        repo_name: String,
        repo_file_path: String,
        local_path: String,
    },
    /// The transfer service finished an upload.
    Done {
        account: String,
        repo_id: String,
        parent_dir: String,
        local_path: String,
    },
    Online,
    Offline,
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("'{command}' takes {expected} arguments, got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

impl Command {
    /// Parses a line. Blank lines and `#` comments yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut parts = line.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(str::to_string).collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "add" => {
                let [account, repo_id, repo_name, repo_file_path, local_path] =
                    take::<5>("add", args)?;
                Command::Add {
                    account,
                    repo_id,
                    repo_name,
                    repo_file_path,
                    local_path,
                }
            }
            "done" => {
                let [account, repo_id, parent_dir, local_path] = take::<4>("done", args)?;
                Command::Done {
                    account,
                    repo_id,
                    parent_dir,
                    local_path,
                }
            }
            "online" => no_args("online", args, Command::Online)?,
            "offline" => no_args("offline", args, Command::Offline)?,
            "status" => no_args("status", args, Command::Status)?,
            "quit" | "exit" => no_args("quit", args, Command::Quit)?,
            _ => return Err(CommandError::Unknown(name.to_string())),
        };

        Ok(Some(command))
    }
}

fn take<const N: usize>(
    command: &'static str,
    args: Vec<String>,
) -> Result<[String; N], CommandError> {
    let got = args.len();
    args.try_into().map_err(|_| CommandError::Arity {
        command,
        expected: N,
        got,
    })
}

fn no_args(
    command: &'static str,
    args: Vec<String>,
    parsed: Command,
) -> Result<Command, CommandError> {
    take::<0>(command, args).map(|_| parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let command = Command::parse("add alice repo1 Docs /docs/a.txt /sd/docs/a.txt")
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            Command::Add {
                account: "alice".into(),
                repo_id: "repo1".into(),
                repo_name: "Docs".into(),
                repo_file_path: "/docs/a.txt".into(),
                local_path: "/sd/docs/a.txt".into(),
            }
        );
    }

    #[test]
    fn test_parse_done() {
        let command = Command::parse("  DONE alice repo1 /docs /sd/docs/a.txt  ")
            .unwrap()
            .unwrap();
        assert!(matches!(command, Command::Done { ref parent_dir, .. } if parent_dir == "/docs"));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(Command::parse("").unwrap(), None);
        assert_eq!(Command::parse("   # note").unwrap(), None);
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(Command::parse("online").unwrap(), Some(Command::Online));
        assert_eq!(Command::parse("offline").unwrap(), Some(Command::Offline));
        assert_eq!(Command::parse("status").unwrap(), Some(Command::Status));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            Command::parse("add alice repo1").unwrap_err(),
            CommandError::Arity {
                command: "add",
                expected: 5,
                got: 2
            }
        );
        assert!(Command::parse("status now").is_err());
        assert_eq!(
            Command::parse("upload x").unwrap_err(),
            CommandError::Unknown("upload".into())
        );
    }
}
