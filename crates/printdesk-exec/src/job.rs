// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// External job description and captured output.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use printdesk_core::JobId;

/// One invocation of an external tool. Never persisted.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub id: JobId,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Duration,
    /// Human description used in logs and error messages ("grayscale conversion").
    pub description: String,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, description: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: JobId::new(),
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout,
            description: description.into(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string_lossy().into_owned()));
        self
    }

    /// Option flag followed by its value, e.g. `-o sides=one-sided`.
    pub fn option(self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        self.arg(flag).arg(value)
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    /// The value following `flag` in the argument list, if any.
    pub fn value_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    /// Program plus arguments, space-joined, for logging.
    pub fn argv(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// What a finished external command left behind.
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl JobOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_argument_order() {
        let spec = CommandSpec::new("lp", "print submission", Duration::from_secs(120))
            .option("-d", "Office")
            .option("-o", "fit-to-page")
            .arg(Path::new("/tmp/doc.pdf"));
        assert_eq!(spec.args, ["-d", "Office", "-o", "fit-to-page", "/tmp/doc.pdf"]);
        assert_eq!(spec.value_after("-d"), Some("Office"));
        assert_eq!(spec.value_after("/tmp/doc.pdf"), None);
        assert_eq!(spec.argv(), "lp -d Office -o fit-to-page /tmp/doc.pdf");
    }

    #[test]
    fn signal_exit_is_not_success() {
        let output = JobOutput {
            exit_code: None,
            ..Default::default()
        };
        assert!(!output.success());
    }
}
