//! Privilege escalation for writes to kernel tunables
//!
//! Every setter in benchenv ends up here. The engine only cares whether the
//! elevated operation succeeded, so the mechanism sits behind [`Elevator`].

use crate::error::{Error, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use tracing::debug;

/// Runs writes and commands with elevated privileges.
pub trait Elevator: Send + Sync {
    /// Write `value` to `path` as the superuser.
    fn write(&self, value: &str, path: &Path) -> Result<()>;

    /// Run `program args..` as the superuser.
    fn run(&self, program: &str, args: &[&str]) -> Result<()>;
}

/// Check if we're running as root
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Elevation through an external helper such as `sudo`.
#[derive(Debug, Clone)]
pub struct Sudo {
    helper: String,
}

impl Sudo {
    pub fn new(helper: impl Into<String>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    fn spawn_tee(&self, path: &Path) -> Result<Child> {
        Command::new(&self.helper)
            .arg("tee")
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| Error::io(format!("failed to execute {}", self.helper), e))
    }

    /// Feed the helper's stdin, then reap it on every path.
    fn feed_and_wait(
        &self,
        mut child: Child,
        path: &Path,
        feed: impl FnOnce(&mut ChildStdin) -> std::io::Result<()>,
    ) -> Result<()> {
        let fed = match child.stdin.take() {
            Some(mut stdin) => feed(&mut stdin),
            None => Ok(()),
        };

        let waited = child.wait();
        match fed {
            // A helper that refuses may exit before reading; its status decides.
            Err(e) if e.kind() != ErrorKind::BrokenPipe => {
                return Err(Error::io(
                    format!("failed while writing {}", path.display()),
                    e,
                ))
            }
            _ => {}
        }

        let status =
            waited.map_err(|e| Error::io(format!("failed to wait for {}", self.helper), e))?;
        if !status.success() {
            return Err(refused(path.display().to_string(), status));
        }
        Ok(())
    }
}

impl Default for Sudo {
    fn default() -> Self {
        Self::new("sudo")
    }
}

fn refused(target: String, status: ExitStatus) -> Error {
    Error::PermissionDenied {
        target,
        status: status.to_string(),
    }
}

impl Elevator for Sudo {
    fn write(&self, value: &str, path: &Path) -> Result<()> {
        debug!("{} tee {} <- {:?}", self.helper, path.display(), value);
        let child = self.spawn_tee(path)?;
        self.feed_and_wait(child, path, |stdin| stdin.write_all(value.as_bytes()))
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        debug!("{} {} {}", self.helper, program, args.join(" "));

        let status = Command::new(&self.helper)
            .arg(program)
            .args(args)
            .status()
            .map_err(|e| Error::io(format!("failed to execute {}", self.helper), e))?;
        if !status.success() {
            return Err(refused(format!("{} {}", program, args.join(" ")), status));
        }
        Ok(())
    }
}

/// No elevation: the current process already holds the needed rights.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl Elevator for Direct {
    fn write(&self, value: &str, path: &Path) -> Result<()> {
        debug!("write {} <- {:?}", path.display(), value);
        std::fs::write(path, value).map_err(|e| {
            if e.kind() == ErrorKind::PermissionDenied {
                Error::PermissionDenied {
                    target: path.display().to_string(),
                    status: e.to_string(),
                }
            } else {
                Error::io(format!("failed while writing {}", path.display()), e)
            }
        })
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<()> {
        debug!("{} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| Error::io(format!("failed to execute {}", program), e))?;
        if !status.success() {
            return Err(refused(format!("{} {}", program, args.join(" ")), status));
        }
        Ok(())
    }
}
