// kiln-core/src/process.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};

use kiln_common::error::{KilnError, Result};
use kiln_common::model::CommandSpec;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::env::BuildEnvironment;

/// Runs installation subprocesses against one [`BuildEnvironment`].
///
/// Every command sees exactly the environment map, never the installer's own.
/// Children are killed if the future awaiting them is dropped. When a log
/// directory is configured each run leaves `NN.<program>.log` behind.
#[derive(Debug)]
pub struct CommandRunner<'a> {
    env: &'a BuildEnvironment,
    log_dir: Option<PathBuf>,
    seq: AtomicU32,
}

impl<'a> CommandRunner<'a> {
    pub fn new(env: &'a BuildEnvironment, log_dir: Option<PathBuf>) -> Self {
        Self {
            env,
            log_dir,
            seq: AtomicU32::new(1),
        }
    }

    /// Runs `command` in `cwd` and waits for it to exit.
    ///
    /// Only failing to start the program is an error here; the exit status is
    /// returned for the caller to classify.
    pub async fn run(&self, command: &CommandSpec, cwd: &Path) -> Result<ExitStatus> {
        let program = self.resolve_program(&command.program, cwd)?;
        debug!(
            "Running command: {} {:?} (cwd: {})",
            program.display(),
            command.args,
            cwd.display()
        );

        let mut cmd = Command::new(&program);
        cmd.args(&command.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.env.apply_to_command(&mut cmd);

        let output = cmd.output().await.map_err(|e| {
            error!("Failed to execute {}: {}", program.display(), e);
            KilnError::CommandExecError(format!("Failed to execute '{command}': {e}"))
        })?;

        if output.status.success() {
            debug!("Command finished successfully: {}", command.program);
        } else {
            debug!("Command failed with status: {}", output.status);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!("Stderr:\n{}", stderr.trim());
            }
        }
        self.write_log(command, cwd, &output);
        Ok(output.status)
    }

    fn resolve_program(&self, program: &str, cwd: &Path) -> Result<PathBuf> {
        let as_path = Path::new(program);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            // Relative paths with a directory part are taken relative to the
            // command's working directory.
            return Ok(cwd.join(as_path));
        }
        which::which_in(program, self.env.path_var(), cwd).map_err(|e| {
            KilnError::CommandExecError(format!("'{program}' not found on build PATH: {e}"))
        })
    }

    fn write_log(&self, command: &CommandSpec, cwd: &Path, output: &Output) {
        let Some(log_dir) = &self.log_dir else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let base = Path::new(&command.program)
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "command".to_string());
        let log_path = log_dir.join(format!("{seq:02}.{base}.log"));

        let mut contents = format!("{command}\ncwd: {}\n\n", cwd.display());
        contents.push_str(&String::from_utf8_lossy(&output.stdout));
        contents.push_str(&String::from_utf8_lossy(&output.stderr));
        contents.push_str(&format!("\n{}\n", output.status));

        let written = fs::create_dir_all(log_dir).and_then(|_| fs::write(&log_path, contents));
        if let Err(e) = written {
            warn!("Could not write command log {}: {}", log_path.display(), e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh", ["-c", script])
    }

    fn test_env(extra: &[(&str, &str)]) -> BuildEnvironment {
        let mut env = BuildEnvironment::from_vars([("PATH", "/usr/bin:/bin")]);
        for (k, v) in extra {
            env.set(*k, *v);
        }
        env
    }

    #[tokio::test]
    async fn child_sees_only_the_build_environment() {
        let work = tempfile::tempdir().unwrap();
        let env = test_env(&[("KILN_PROBE", "from-overlay")]);
        let runner = CommandRunner::new(&env, None);
        let status = runner
            .run(
                &sh("test \"$KILN_PROBE\" = from-overlay && test -z \"$CARGO\" && pwd > where"),
                work.path(),
            )
            .await
            .unwrap();
        assert!(status.success());
        let pwd = fs::read_to_string(work.path().join("where")).unwrap();
        assert_eq!(
            fs::canonicalize(pwd.trim()).unwrap(),
            fs::canonicalize(work.path()).unwrap()
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_returned_not_raised() {
        let work = tempfile::tempdir().unwrap();
        let env = test_env(&[]);
        let status = CommandRunner::new(&env, None)
            .run(&sh("exit 7"), work.path())
            .await
            .unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[tokio::test]
    async fn missing_program_is_an_exec_error() {
        let work = tempfile::tempdir().unwrap();
        let env = test_env(&[]);
        let err = CommandRunner::new(&env, None)
            .run(&CommandSpec::new("kiln-no-such-tool", Vec::<String>::new()), work.path())
            .await
            .unwrap_err();
        assert!(matches!(err, KilnError::CommandExecError(_)));
    }

    #[tokio::test]
    async fn writes_numbered_logs() {
        let work = tempfile::tempdir().unwrap();
        let logs = work.path().join("logs");
        let env = test_env(&[]);
        let runner = CommandRunner::new(&env, Some(logs.clone()));
        runner.run(&sh("echo first"), work.path()).await.unwrap();
        runner.run(&sh("echo second >&2"), work.path()).await.unwrap();

        let first = fs::read_to_string(logs.join("01.sh.log")).unwrap();
        assert!(first.starts_with("sh -c echo first"));
        assert!(first.contains("first\n"));
        let second = fs::read_to_string(logs.join("02.sh.log")).unwrap();
        assert!(second.contains("second"));
    }
}
