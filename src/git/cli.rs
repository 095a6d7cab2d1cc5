//! Gateway backed by the `git` executable.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use super::{Author, GatewayError, GatewayResult, RepositoryGateway, DEFAULT_GIT_TIMEOUT};

const REMOTE: &str = "origin";
const COMMITTER_NAME: &str = "docsync";

/// Runs git commands inside a repository root.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    remote_url: Option<String>,
    timeout: Duration,
}

struct Captured {
    stdout: String,
    stderr: String,
}

impl Captured {
    /// Last non-empty line of combined output, for one-line summaries.
    fn summary(&self) -> String {
        self.stderr
            .lines()
            .chain(self.stdout.lines())
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .unwrap_or_default()
            .to_string()
    }
}

impl GitCli {
    /// Gateway for the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            remote_url: None,
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// URL used to create `origin` on first push when it does not exist.
    #[must_use]
    pub fn with_remote_url(mut self, url: Option<String>) -> Self {
        self.remote_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    /// Time limit for each git invocation.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_repo(&self) -> GatewayResult<()> {
        if self.root.join(".git").exists() {
            Ok(())
        } else {
            Err(GatewayError::NotARepository(self.root.clone()))
        }
    }

    fn run(&self, args: &[&str]) -> GatewayResult<Captured> {
        let command = args.join(" ");
        debug!(%command, root = %self.root.display(), "Running git");

        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_COMMITTER_NAME", COMMITTER_NAME)
            .env("GIT_COMMITTER_EMAIL", Author::FALLBACK_EMAIL)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain pipes on their own threads so a chatty child cannot block.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout).map_err(GatewayError::Spawn)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(%command, timeout_secs = self.timeout.as_secs(), "git timed out, killed");
                return Err(GatewayError::Timeout {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        let captured = Captured {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        };

        if status.success() {
            Ok(captured)
        } else {
            let message = if captured.stderr.trim().is_empty() {
                format!("`git {command}` exited with {status}")
            } else {
                captured.stderr.trim().to_string()
            };
            Err(GatewayError::Failed(message))
        }
    }

    fn has_remote(&self, name: &str) -> GatewayResult<bool> {
        let out = self.run(&["remote"])?;
        Ok(out.stdout.lines().any(|l| l.trim() == name))
    }

    fn current_branch(&self) -> GatewayResult<String> {
        let out = self.run(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok(out.stdout.trim().to_string())
    }
}

impl RepositoryGateway for GitCli {
    fn stage_and_commit(&self, message: &str, author: &Author) -> GatewayResult<String> {
        self.ensure_repo()?;
        self.run(&["add", "-A"])?;

        let status = self.run(&["status", "--porcelain"])?;
        if status.stdout.trim().is_empty() {
            return Ok("No changes to commit.".to_string());
        }

        let signature = author.signature();
        self.run(&["commit", "-m", message, "--author", &signature])?;
        let head = self.run(&["rev-parse", "--short", "HEAD"])?;
        let head = head.stdout.trim();

        info!(commit = head, author = %author.name, "Committed changes");
        Ok(format!("Committed {head}"))
    }

    fn push(&self) -> GatewayResult<String> {
        self.ensure_repo()?;

        let created = if self.has_remote(REMOTE)? {
            false
        } else if let Some(url) = &self.remote_url {
            self.run(&["remote", "add", REMOTE, url])?;
            info!(%url, "Created remote origin");
            true
        } else {
            return Ok("No remote 'origin' configured, skipped push.".to_string());
        };

        let out = self.run(&["push", "--set-upstream", REMOTE, "HEAD"])?;
        let summary = out.summary();
        info!(%summary, "Pushed");

        Ok(if created {
            format!("Remote 'origin' created and pushed: {summary}")
        } else {
            format!("Pushed: {summary}")
        })
    }

    fn pull(&self) -> GatewayResult<String> {
        self.ensure_repo()?;
        if !self.has_remote(REMOTE)? {
            return Ok("Skipped pull: no remote 'origin' configured.".to_string());
        }

        let branch = self.current_branch()?;
        let out = self.run(&["pull", "--rebase", REMOTE, &branch])?;
        let summary = out.summary();
        info!(%branch, %summary, "Pulled");
        Ok(format!("Pulled {branch}: {summary}"))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut pipe) = pipe {
            // Output is only used for messages; a decode error leaves it partial.
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn test_not_a_repository() {
        let temp = TempDir::new().unwrap();
        let gateway = GitCli::new(temp.path());

        let err = gateway
            .stage_and_commit("msg", &Author::from_actor("t"))
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotARepository(_)));
        assert!(matches!(gateway.pull(), Err(GatewayError::NotARepository(_))));
    }

    #[test]
    fn test_commit_then_nothing_to_commit() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        git(temp.path(), &["init", "-q"]);
        fs::write(temp.path().join("page.md"), "hello").unwrap();

        let gateway = GitCli::new(temp.path());
        let author = Author::from_actor("Ada");

        let first = gateway.stage_and_commit("Add page", &author).unwrap();
        assert!(first.starts_with("Committed "));

        let second = gateway.stage_and_commit("Again", &author).unwrap();
        assert_eq!(second, "No changes to commit.");

        // No remote: both directions are no-ops.
        assert!(gateway.push().unwrap().contains("skipped push"));
        assert!(gateway.pull().unwrap().starts_with("Skipped pull"));
    }

    #[test]
    fn test_push_creates_origin_from_configured_url() {
        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote.git");
        let work = temp.path().join("work");
        fs::create_dir_all(&remote).unwrap();
        fs::create_dir_all(&work).unwrap();
        git(&remote, &["init", "-q", "--bare"]);
        git(&work, &["init", "-q"]);
        fs::write(work.join("page.md"), "hello").unwrap();

        let gateway = GitCli::new(&work).with_remote_url(Some(remote.display().to_string()));
        gateway
            .stage_and_commit("Add page", &Author::from_actor("Ada"))
            .unwrap();

        let pushed = gateway.push().unwrap();
        assert!(pushed.starts_with("Remote 'origin' created"));
        assert!(gateway.push().unwrap().starts_with("Pushed"));
        assert!(gateway.pull().unwrap().starts_with("Pulled"));
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_git_is_killed_after_timeout() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        if !git_available() {
            return;
        }
        let temp = TempDir::new().unwrap();
        git(temp.path(), &["init", "-q"]);
        let hook = temp.path().join(".git/hooks/pre-commit");
        fs::write(&hook, "#!/bin/sh\nsleep 10\n").unwrap();
        fs::set_permissions(&hook, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(temp.path().join("page.md"), "hello").unwrap();

        let gateway = GitCli::new(temp.path()).with_timeout(Duration::from_millis(500));
        let started = Instant::now();
        let err = gateway
            .stage_and_commit("Add page", &Author::from_actor("Ada"))
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(8));
        match err {
            GatewayError::Timeout { command, timeout } => {
                assert!(command.starts_with("commit"));
                assert_eq!(timeout, Duration::from_millis(500));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_summary_uses_last_line() {
        let captured = Captured {
            stdout: String::new(),
            stderr: "To /tmp/remote.git\n * [new branch]      HEAD -> main\n\n".to_string(),
        };
        assert_eq!(captured.summary(), "* [new branch]      HEAD -> main");
    }
}
