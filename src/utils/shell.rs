use std::env;
use std::fs;
use std::process::Command;

use crate::errors::{Code, Result, S390Error};

/// Captured result of a finished command.
/// A non-zero `rc` is not an error at this level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub rc: i32,
}

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.rc == 0
    }

    /// Turns a non-zero exit into [`S390Error::CmdFailed`] tagged with `code`
    pub fn ok_or_fail(self, code: Code) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        Err(S390Error::CmdFailed {
            code,
            command: self.command,
            rc: self.rc,
            stderr: self.stderr,
        })
    }
}

pub trait Runner {
    /// Runs `cmd` with `args` to completion.
    /// Only a failure to spawn is reported as `Err`.
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput>;
}

pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
        let command = command_line(cmd, args);

        match Command::new(cmd).args(args).output() {
            Ok(output) => Ok(CmdOutput {
                command,
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                // Terminated by signal
                rc: output.status.code().unwrap_or(-1),
            }),

            // Failed to spawn
            Err(error) => Err(S390Error::CmdSpawn { command, error }),
        }
    }
}

pub(crate) fn command_line(cmd: &str, args: &[&str]) -> String {
    if args.is_empty() {
        return cmd.to_string();
    }

    format!("{cmd} {}", args.join(" "))
}

pub fn in_path(program: &str) -> bool {
    if program.starts_with('/') {
        return fs::metadata(program).is_ok();
    }

    if let Ok(path) = env::var("PATH") {
        for p in path.split(':') {
            let p_str = format!("{}/{}", p, program);
            if fs::metadata(p_str).is_ok() {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
#[allow(unused)]
pub mod test_utils {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{command_line, CmdOutput, Runner};
    use crate::errors::Result;

    pub type Calls = Rc<RefCell<Vec<Vec<String>>>>;

    /// Runner that records every argv and answers from a handler closure
    pub struct FakeRunner {
        calls: Calls,
        handler: Box<dyn Fn(&[String]) -> CmdOutput>,
    }

    impl FakeRunner {
        pub fn new<F>(handler: F) -> (Self, Calls)
        where
            F: Fn(&[String]) -> CmdOutput + 'static,
        {
            let calls = Calls::default();
            let runner = Self {
                calls: calls.clone(),
                handler: Box::new(handler),
            };

            (runner, calls)
        }
    }

    impl Runner for FakeRunner {
        fn run(&self, cmd: &str, args: &[&str]) -> Result<CmdOutput> {
            let mut argv = vec![cmd.to_string()];
            argv.extend(args.iter().map(|a| a.to_string()));
            self.calls.borrow_mut().push(argv.clone());

            let mut output = (self.handler)(&argv);
            output.command = command_line(cmd, args);

            Ok(output)
        }
    }

    pub fn ok(stdout: &str) -> CmdOutput {
        CmdOutput {
            stdout: stdout.to_string(),
            ..CmdOutput::default()
        }
    }

    pub fn fail(rc: i32, stderr: &str) -> CmdOutput {
        CmdOutput {
            stderr: stderr.to_string(),
            rc,
            ..CmdOutput::default()
        }
    }

    /// Commands recorded so far, joined with spaces
    pub fn joined(calls: &Calls) -> Vec<String> {
        calls.borrow().iter().map(|argv| argv.join(" ")).collect()
    }
}
