// src/exec/resolver.rs

//! Mapping from actor names to concrete programs.

use std::path::PathBuf;

use tokio::process::Command;

/// Resolves an actor name into the command that runs it.
///
/// - Without a runner, actor `foo` is the executable `<dir>/foo`.
/// - With a runner, actor `foo` is `<runner> foo` and the runner is expected
///   to locate the actor itself.
#[derive(Debug, Clone)]
pub struct ActorResolver {
    dir: PathBuf,
    runner: Option<PathBuf>,
}

impl ActorResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            runner: None,
        }
    }

    pub fn with_runner(mut self, runner: impl Into<PathBuf>) -> Self {
        self.runner = Some(runner.into());
        self
    }

    /// Build the command for `actor`.
    ///
    /// Names must be a single path component so a request can never point the
    /// daemon at an arbitrary binary outside the actors directory.
    pub fn command_for(&self, actor: &str) -> Result<Command, String> {
        validate_actor_name(actor)?;

        let cmd = match &self.runner {
            Some(runner) => {
                let mut c = Command::new(runner);
                c.arg(actor);
                c
            }
            None => Command::new(self.dir.join(actor)),
        };
        Ok(cmd)
    }
}

/// Accepts a single path component made of `[A-Za-z0-9._-]`, except `.` and `..`.
pub fn validate_actor_name(actor: &str) -> Result<(), String> {
    if actor.is_empty() || actor == "." || actor == ".." {
        return Err(format!("invalid actor name {actor:?}"));
    }
    let valid = actor
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(format!("invalid actor name {actor:?}"));
    }
    Ok(())
}
