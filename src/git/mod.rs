//! Repository gateway.
//!
//! The sync engine talks to version control through [`RepositoryGateway`]
//! so that reconciliation logic never shells out directly. [`GitCli`] is
//! the production implementation; tests substitute their own.
//!
//! "Nothing to commit" and "no remote configured" are not errors: they
//! come back as `Ok` with a summary line.

mod cli;

use std::path::PathBuf;
use std::time::Duration;

pub use cli::GitCli;

/// Default bound on a single git invocation.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Commit author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Placeholder address used when only a name is known.
    pub const FALLBACK_EMAIL: &'static str = "docsync@localhost";

    /// Author for an actor name, with the fallback address.
    #[must_use]
    pub fn from_actor(actor: &str) -> Self {
        Self {
            name: actor.to_string(),
            email: Self::FALLBACK_EMAIL.to_string(),
        }
    }

    /// `Name <email>` form accepted by `git commit --author`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Version-control operations the sync engine relies on.
pub trait RepositoryGateway {
    /// Stage every change under the root and commit it.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing or git fails.
    fn stage_and_commit(&self, message: &str, author: &Author) -> GatewayResult<String>;

    /// Push the current branch to `origin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing or the push is rejected.
    fn push(&self) -> GatewayResult<String>;

    /// Pull from `origin` with rebase.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is missing or the pull fails.
    fn pull(&self) -> GatewayResult<String>;
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The repository root has no `.git`.
    #[error("{} is not a git repository", .0.display())]
    NotARepository(PathBuf),

    /// The `git` executable could not be started.
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    /// A git invocation ran past its time limit and was killed.
    #[error("`git {command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Git exited unsuccessfully.
    #[error("{0}")]
    Failed(String),
}

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_signature() {
        let author = Author::from_actor("Ada Lovelace");
        assert_eq!(author.signature(), "Ada Lovelace <docsync@localhost>");
    }

    #[test]
    fn test_timeout_message() {
        let err = GatewayError::Timeout {
            command: "push".to_string(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "`git push` timed out after 60s");
    }
}
