#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use actord::exec::{ActorResolver, ProcessExecutor};
use tempfile::TempDir;

/// Builder for a temporary actors directory filled with `sh` scripts.
///
/// ```ignore
/// let actors = ActorDirBuilder::new()
///     .actor("echo", "cat")
///     .actor("fail", "echo boom >&2; exit 3")
///     .build();
/// let executor = actors.executor();
/// ```
pub struct ActorDirBuilder {
    scripts: Vec<(String, String)>,
}

impl ActorDirBuilder {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
        }
    }

    /// Add an executable actor `name` whose body is the given shell snippet.
    pub fn actor(mut self, name: &str, body: &str) -> Self {
        self.scripts.push((name.to_string(), body.to_string()));
        self
    }

    /// Add a file named `name` that is *not* executable.
    pub fn non_executable(mut self, name: &str) -> Self {
        self.scripts
            .push((format!("!{name}"), "echo never\n".to_string()));
        self
    }

    pub fn build(self) -> ActorDir {
        let dir = TempDir::new().expect("failed to create temp actors dir");
        for (name, body) in self.scripts {
            match name.strip_prefix('!') {
                Some(plain) => {
                    fs::write(dir.path().join(plain), body).expect("failed to write file");
                }
                None => write_script(dir.path(), &name, &body),
            }
        }
        ActorDir { dir }
    }
}

impl Default for ActorDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A temporary actors directory. Removed when dropped.
pub struct ActorDir {
    dir: TempDir,
}

impl ActorDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn resolver(&self) -> ActorResolver {
        ActorResolver::new(self.dir.path())
    }

    pub fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::new(self.resolver())
    }
}

#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("failed to write actor script");
    let mut perms = fs::metadata(&path)
        .expect("failed to stat actor script")
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("failed to chmod actor script");
}

#[cfg(not(unix))]
fn write_script(dir: &Path, name: &str, body: &str) {
    fs::write(dir.join(name), body).expect("failed to write actor script");
}

/// Write `contents` to `<dir>/actord.toml` and return its path.
pub fn write_config(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("actord.toml");
    fs::write(&path, contents).expect("failed to write config file");
    path
}
