use tracing::{error, info};

use crate::errors::Result;

/// Progress sink for long-running operations.
/// `success` is `None` while the task runs.
pub trait Reporter {
    fn report(&mut self, message: &str, success: Option<bool>);
}

/// Collects every report and mirrors it to the log
#[derive(Debug, Default)]
pub struct Progress {
    pub messages: Vec<(String, Option<bool>)>,
}

impl Progress {
    /// Last message together with the final outcome, if the task finished
    pub fn outcome(&self) -> Option<(&str, bool)> {
        self.messages
            .last()
            .and_then(|(msg, success)| success.map(|s| (msg.as_str(), s)))
    }
}

impl Reporter for Progress {
    fn report(&mut self, message: &str, success: Option<bool>) {
        match success {
            Some(false) => error!("task failed: {message}"),
            _ if !message.is_empty() => info!("{message}"),
            _ => {}
        }

        self.messages.push((message.to_string(), success));
    }
}

/// Resets the reporter, runs `work` and reports exactly one outcome
pub fn run_task<T, F>(reporter: &mut dyn Reporter, done: &str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    reporter.report("", None);

    match work() {
        Ok(value) => {
            reporter.report(done, Some(true));
            Ok(value)
        }
        Err(err) => {
            reporter.report(&err.to_string(), Some(false));
            Err(err)
        }
    }
}
