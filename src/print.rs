use crate::error::{AppError, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Hands a finished document file to something that prints it.
pub trait PrintDispatcher {
    fn print(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintOutcome {
    Sent,
    Failed(String),
}

/// Prints and swallows the error. The document file is never touched, so a
/// failed print still leaves it on disk.
pub fn dispatch(printer: &dyn PrintDispatcher, path: &Path) -> PrintOutcome {
    match printer.print(path) {
        Ok(()) => {
            info!("Sent {} to the printer", path.display());
            PrintOutcome::Sent
        }
        Err(e) => {
            warn!("Printing {} failed: {}", path.display(), e);
            PrintOutcome::Failed(e.to_string())
        }
    }
}

/// The platform print spooler: `lp`/`lpr` on Unix, the shell "print" verb on
/// Windows.
#[derive(Debug, Default)]
pub struct SystemPrinter {
    /// Named printer; the system default when `None`.
    pub destination: Option<String>,
}

impl SystemPrinter {
    pub fn new(destination: Option<String>) -> Self {
        Self { destination }
    }

    #[cfg(not(windows))]
    fn command(&self, path: &Path) -> Result<Command> {
        if let Ok(lp) = which::which("lp") {
            let mut cmd = Command::new(lp);
            if let Some(dest) = &self.destination {
                cmd.arg("-d").arg(dest);
            }
            cmd.arg(path);
            return Ok(cmd);
        }
        let lpr: PathBuf = which::which("lpr")
            .map_err(|_| AppError::Print("no print command found (tried lp, lpr)".to_string()))?;
        let mut cmd = Command::new(lpr);
        if let Some(dest) = &self.destination {
            cmd.arg("-P").arg(dest);
        }
        cmd.arg(path);
        Ok(cmd)
    }

    #[cfg(windows)]
    fn command(&self, path: &Path) -> Result<Command> {
        let shell: PathBuf = which::which("powershell")
            .map_err(|_| AppError::Print("powershell not found".to_string()))?;
        let mut script = format!(
            "Start-Process -FilePath '{}' -Verb Print",
            path.display().to_string().replace('\'', "''")
        );
        if let Some(dest) = &self.destination {
            script = format!(
                "Start-Process -FilePath '{}' -Verb PrintTo -ArgumentList '\"{}\"'",
                path.display().to_string().replace('\'', "''"),
                dest.replace('\'', "''")
            );
        }
        let mut cmd = Command::new(shell);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
        Ok(cmd)
    }
}

impl PrintDispatcher for SystemPrinter {
    fn print(&self, path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(AppError::Print(format!(
                "document {} does not exist",
                path.display()
            )));
        }
        let output = self.command(path)?.output().map_err(|e| {
            AppError::Print(format!("could not start print command: {}", e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Print(format!(
                "print command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Accepts every document without printing it.
#[derive(Debug, Default)]
pub struct NoopPrinter;

impl PrintDispatcher for NoopPrinter {
    fn print(&self, path: &Path) -> Result<()> {
        info!("Printing disabled; leaving {} on disk", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct BrokenPrinter;

    impl PrintDispatcher for BrokenPrinter {
        fn print(&self, _path: &Path) -> Result<()> {
            Err(AppError::Print("no printer attached".to_string()))
        }
    }

    #[test]
    fn failure_is_reported_and_file_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Visa_Application_20240501_101500.pdf");
        fs::write(&path, b"%PDF-1.5").unwrap();

        let outcome = dispatch(&BrokenPrinter, &path);
        assert_eq!(
            outcome,
            PrintOutcome::Failed("Print error: no printer attached".to_string())
        );
        assert!(path.exists());
    }

    #[test]
    fn noop_printer_always_succeeds() {
        assert_eq!(
            dispatch(&NoopPrinter, Path::new("whatever.pdf")),
            PrintOutcome::Sent
        );
    }

    #[test]
    fn system_printer_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.pdf");
        assert!(matches!(
            SystemPrinter::default().print(&missing),
            Err(AppError::Print(_))
        ));
    }
}
