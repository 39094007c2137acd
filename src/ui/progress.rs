use crate::client::DeploymentStatus;
use crate::orchestrator::DeploymentResult;
use crate::reporter::{DeploymentEvent, Reporter};
use crate::ui::icons::{CHECK, CLOCK, CROSS, ROCKET};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Terminal UI for a deployment run, rendered via an `indicatif` spinner.
///
/// The spinner ticks while the deployment is monitored and is replaced by a
/// summary block once a terminal state is reached.
pub struct DeployUI {
    bar: ProgressBar,
    verbose: bool,
    checks: AtomicU32,
}

impl DeployUI {
    pub fn new(verbose: bool) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let bar = ProgressBar::new_spinner();
        bar.set_style(spinner_style);
        bar.set_prefix("Deploy");

        Self {
            bar,
            verbose,
            checks: AtomicU32::new(0),
        }
    }

    /// Print a line above the spinner without disturbing it.
    fn print_line(&self, msg: impl AsRef<str>) {
        self.bar.println(msg.as_ref());
    }

    fn print_summary(&self, result: &DeploymentResult) {
        self.print_line("");
        self.print_line(format!("{}", style("DEPLOYMENT SUMMARY").yellow().bold()));
        self.print_line(format!("Deployment ID: {}", result.id));
        self.print_line(format!(
            "{}Duration: {}",
            CLOCK,
            format_duration(result.duration)
        ));
        self.print_line(format!("Started At:    {}", result.created_at.to_rfc3339()));
        if let Some(completed) = result.completed_at {
            self.print_line(format!("Completed At:  {}", completed.to_rfc3339()));
        }
        self.print_line(format!("Status: {}", style(&result.state).green()));
    }

    fn print_failure(&self, status: &DeploymentStatus) {
        self.print_line(format!(
            "{}Deployment {} finished with status {}",
            CROSS,
            status.id,
            style(&status.state).red().bold()
        ));
    }
}

impl Reporter for DeployUI {
    fn report(&self, event: &DeploymentEvent) {
        match event {
            DeploymentEvent::Initiated { id, check_interval } => {
                self.print_line(format!(
                    "{}Deployment {} initiated",
                    ROCKET,
                    style(id).cyan().bold()
                ));
                self.bar.enable_steady_tick(Duration::from_millis(100));
                self.bar.set_message(format!(
                    "Monitoring deployment status every {}s (this may take some time)",
                    check_interval.as_secs()
                ));
            }
            DeploymentEvent::StillRunning { id } => {
                let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
                self.bar
                    .set_message(format!("Still running (check #{n})"));
                if self.verbose {
                    self.print_line(format!(
                        "{} Deployment {} still running",
                        style(">>").yellow(),
                        id
                    ));
                }
            }
            DeploymentEvent::Completed { result } => {
                self.bar.finish_and_clear();
                self.print_summary(result);
                self.print_line(format!(
                    "{}Deployment completed in {}",
                    CHECK,
                    format_duration(result.duration)
                ));
            }
            DeploymentEvent::Failed { status, .. } => {
                self.bar.finish_and_clear();
                self.print_failure(status);
            }
        }
    }
}

/// Render a duration as `NmSSs` (or plain seconds under a minute).
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total >= 60 {
        format!("{}m{:02}s", total / 60, total % 60)
    } else {
        format!("{total}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_duration_under_a_minute() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[test]
    fn format_duration_minutes_zero_padded() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1m00s");
        assert_eq!(format_duration(Duration::from_secs(754)), "12m34s");
    }
}
