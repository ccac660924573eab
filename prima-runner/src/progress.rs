use colored::Colorize;
use prima_core::{ProgressEvent, ProgressReporter, RunOutcome};

/// Prints batch progress to the console.
///
/// Completion lines are throttled to roughly every tenth of the batch; failed
/// runs are always printed.
pub struct ConsoleProgress {
    quiet: bool,
    step: usize,
}

impl ConsoleProgress {
    pub const fn new(quiet: bool) -> Self {
        Self { quiet, step: 1 }
    }

    fn should_print(&self, completed: usize, total: usize) -> bool {
        completed == total || completed % self.step == 0
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&mut self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::Started { total, threads } => {
                self.step = (*total / 10).max(1);
                if !self.quiet {
                    println!(
                        "{} {total} simulation(s) on {threads} thread(s)",
                        "▶ Running".bright_yellow().bold()
                    );
                }
            }
            ProgressEvent::RunFinished {
                completed,
                total,
                failed,
                result,
            } => {
                if let RunOutcome::Failed(failure) = &result.outcome {
                    eprintln!(
                        "❌ [{} seed {}] {}: {failure}",
                        result.run.configuration.red(),
                        result.run.seed,
                        result.run.scenario.scenario_id()
                    );
                }
                if !self.quiet && self.should_print(*completed, *total) {
                    let failures = if *failed == 0 {
                        String::new()
                    } else {
                        format!(" ({failed} failed)").red().to_string()
                    };
                    println!("  [{completed}/{total}]{failures}");
                }
            }
            ProgressEvent::Finished { .. } => {}
        }
    }
}
