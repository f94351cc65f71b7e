// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted runner for tests and dry runs where the real tools are unavailable.
//
// Each call pops the next scripted step, applies its file side effects, and
// returns the scripted reply. Every received `CommandSpec` is recorded so tests
// can assert on the exact command lines.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use printdesk_core::error::{PrintdeskError, Result};

use crate::job::{CommandSpec, JobOutput};
use crate::runner::CommandRunner;

/// A side effect applied to the filesystem before the reply is returned.
pub type Effect = Box<dyn Fn(&CommandSpec) -> std::io::Result<()> + Send + Sync>;

/// How a scripted call ends.
#[derive(Debug, Clone)]
pub enum Reply {
    Exit { code: i32, stdout: String, stderr: String },
    Timeout,
    SpawnFailure,
}

/// One scripted call.
pub struct Step {
    reply: Reply,
    effects: Vec<Effect>,
}

impl Step {
    pub fn ok() -> Self {
        Self::exit(0, "")
    }

    pub fn ok_with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            reply: Reply::Exit {
                code: 0,
                stdout: stdout.into(),
                stderr: String::new(),
            },
            effects: Vec::new(),
        }
    }

    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            reply: Reply::Exit {
                code,
                stdout: String::new(),
                stderr: stderr.into(),
            },
            effects: Vec::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            reply: Reply::Timeout,
            effects: Vec::new(),
        }
    }

    pub fn spawn_failure() -> Self {
        Self {
            reply: Reply::SpawnFailure,
            effects: Vec::new(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Write `bytes` to the path given after `flag` (`--output out.pdf`), or
    /// glued to it (`-sOutputFile=out.pdf`).
    pub fn writes_arg(self, flag: &'static str, bytes: Vec<u8>) -> Self {
        self.with_effect(Box::new(move |spec: &CommandSpec| {
            let target = spec
                .value_after(flag)
                .map(PathBuf::from)
                .or_else(|| {
                    spec.args
                        .iter()
                        .find_map(|a| a.strip_prefix(flag).map(PathBuf::from))
                })
                .ok_or_else(|| missing_arg(flag))?;
            std::fs::write(target, &bytes)
        }))
    }

    /// Write `bytes` where an office converter would put its result:
    /// `<outdir>/<stem of last argument>.pdf`.
    pub fn writes_office_pdf(self, bytes: Vec<u8>) -> Self {
        self.with_effect(Box::new(move |spec: &CommandSpec| {
            let outdir = spec.value_after("--outdir").ok_or_else(|| missing_arg("--outdir"))?;
            let input = spec.args.last().ok_or_else(|| missing_arg("input"))?;
            let stem = Path::new(input)
                .file_stem()
                .ok_or_else(|| missing_arg("input stem"))?;
            let mut target = Path::new(outdir).join(stem);
            target.set_extension("pdf");
            std::fs::write(target, &bytes)
        }))
    }

    /// Fail like the real tool would when the last argument names a file
    /// that does not exist.
    pub fn expects_input_file(self) -> Self {
        self.with_effect(Box::new(|spec: &CommandSpec| {
            let input = spec.args.last().ok_or_else(|| missing_arg("input"))?;
            if Path::new(input).is_file() {
                Ok(())
            } else {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{input}: no such file"),
                ))
            }
        }))
    }

    /// Write `pages` numbered files following the `--batch` pattern, starting
    /// at 1, as a feeder scan would.
    pub fn writes_batch_pages(self, pages: usize, bytes: Vec<u8>) -> Self {
        self.with_effect(Box::new(move |spec: &CommandSpec| {
            let pattern = spec.value_after("--batch").ok_or_else(|| missing_arg("--batch"))?;
            for n in 1..=pages {
                std::fs::write(pattern.replace("%d", &n.to_string()), &bytes)?;
            }
            Ok(())
        }))
    }
}

fn missing_arg(what: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("scripted effect: no {what} in command"),
    )
}

/// Replays scripted steps in order. Unscripted calls succeed with no output.
#[derive(Default)]
pub struct ScriptedRunner {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let runner = Self::new();
        for step in steps {
            runner.push(step);
        }
        runner
    }

    pub fn push(&self, step: Step) {
        lock(&self.steps).push_back(step);
    }

    /// Every spec received so far, in call order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    /// Program names received so far, in call order.
    pub fn programs(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|c| c.program.clone()).collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn execute(&self, spec: &CommandSpec) -> Result<JobOutput> {
        lock(&self.calls).push(spec.clone());
        let step = lock(&self.steps).pop_front().unwrap_or_else(Step::ok);

        for effect in &step.effects {
            effect(spec)?;
        }

        match step.reply {
            Reply::Exit { code, stdout, stderr } => Ok(JobOutput {
                stdout,
                stderr,
                exit_code: Some(code),
                elapsed: Duration::from_millis(1),
            }),
            Reply::Timeout => Err(PrintdeskError::ProcessTimeout {
                description: spec.description.clone(),
                timeout: spec.timeout,
            }),
            Reply::SpawnFailure => Err(PrintdeskError::ProcessSpawn {
                program: spec.program.clone(),
                description: spec.description.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_and_records_calls() {
        let runner = ScriptedRunner::with_steps([Step::exit(1, "busy"), Step::ok_with_stdout("fine")]);
        let spec = CommandSpec::new("lp", "print", Duration::from_secs(1));

        assert!(matches!(
            runner.run(&spec).await,
            Err(PrintdeskError::ProcessNonZeroExit { code: Some(1), .. })
        ));
        assert_eq!(runner.run(&spec).await.expect("second").stdout, "fine");
        // Unscripted: succeeds.
        assert!(runner.run(&spec).await.is_ok());
        assert_eq!(runner.programs(), ["lp", "lp", "lp"]);
    }

    #[tokio::test]
    async fn effects_apply_even_on_timeout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pattern = dir.path().join("scan_%d.pnm");
        let runner = ScriptedRunner::with_steps([Step::timeout().writes_batch_pages(2, b"P4".to_vec())]);
        let spec = CommandSpec::new("scanimage", "batch scan", Duration::from_secs(600))
            .option("--batch", &pattern);

        assert!(runner.execute(&spec).await.expect_err("timeout").is_timeout());
        assert!(dir.path().join("scan_1.pnm").exists());
        assert!(dir.path().join("scan_2.pnm").exists());
        assert!(!dir.path().join("scan_3.pnm").exists());
    }

    #[tokio::test]
    async fn missing_input_file_fails_the_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let present = dir.path().join("doc.pdf");
        std::fs::write(&present, b"%PDF").expect("write");
        let runner = ScriptedRunner::with_steps([
            Step::ok().expects_input_file(),
            Step::ok().expects_input_file(),
        ]);

        let spec = CommandSpec::new("lp", "print", Duration::from_secs(1)).arg(&present);
        assert!(runner.run(&spec).await.is_ok());
        let spec = CommandSpec::new("lp", "print", Duration::from_secs(1)).arg(dir.path().join("gone.pdf"));
        assert!(runner.run(&spec).await.is_err());
    }

    #[tokio::test]
    async fn glued_output_flag_is_understood() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("gray.pdf");
        let runner = ScriptedRunner::with_steps([Step::ok().writes_arg("-sOutputFile=", vec![0; 10])]);
        let spec = CommandSpec::new("gs", "grayscale", Duration::from_secs(60))
            .arg(format!("-sOutputFile={}", out.display()));
        runner.run(&spec).await.expect("run");
        assert_eq!(std::fs::metadata(&out).expect("meta").len(), 10);
    }
}
