//! Progress display for a running validation

use crate::proxy::models::RunStats;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Spinner frames for the interactive display
const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Width of the progress bar in cells
const BAR_WIDTH: usize = 20;

/// Minimum gap between plain progress lines
const PLAIN_LOG_GAP: Duration = Duration::from_secs(5);

/// How progress is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Interactive when stdout is a terminal, plain otherwise
    Auto,
    /// Single redrawn line with bar and spinner
    Interactive,
    /// Periodic log lines, suitable for CI
    Plain,
    /// No progress output
    Off,
}

impl ProgressMode {
    /// Resolve `Auto` against the current stdout
    pub fn resolve(self) -> Self {
        match self {
            ProgressMode::Auto if io::stdout().is_tty() => ProgressMode::Interactive,
            ProgressMode::Auto => ProgressMode::Plain,
            other => other,
        }
    }

    /// Recommended progress recomputation period for this mode
    pub fn refresh_interval(self) -> Duration {
        match self.resolve() {
            ProgressMode::Interactive => Duration::from_millis(100),
            _ => Duration::from_secs(1),
        }
    }
}

/// Format a duration as `MM:SS`
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Renders [`RunStats`] snapshots to stdout
pub struct ProgressRenderer {
    mode: ProgressMode,
    frame: usize,
    last_plain: Option<Instant>,
}

impl ProgressRenderer {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode: mode.resolve(),
            frame: 0,
            last_plain: None,
        }
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }

    /// Print the start banner
    pub fn banner(&self, own_ip: &str, loaded: usize, units: usize, concurrency: usize) {
        if self.mode == ProgressMode::Off {
            return;
        }
        println!("{}", "  PROXYIP VALIDATOR  ".white().on_blue().bold());
        println!();
        println!(
            "{}",
            format!(
                "IP: {} | Loaded: {} proxies | Units: {} | In flight: {}",
                own_ip,
                loaded,
                units,
                units * concurrency
            )
            .dim()
        );
        println!();
    }

    /// Interactive status line for `stats`, without the leading `\r`
    pub fn interactive_line(&mut self, stats: &RunStats) -> String {
        let pct = stats.percent();
        let filled = ((BAR_WIDTH as f64 * pct / 100.0).round() as usize).min(BAR_WIDTH);
        let bar = format!(
            "{}{}",
            "█".repeat(filled).green(),
            "░".repeat(BAR_WIDTH - filled).dark_grey()
        );
        let spin = SPINNER[self.frame % SPINNER.len()].to_string().cyan();
        self.frame = self.frame.wrapping_add(1);

        format!(
            "{}  {}  {}  |  {} {}  |  {} {}  |  {} {}  |  {} {}/{}",
            spin,
            bar,
            format!("{:.1}%", pct).bold(),
            "Found:".dark_grey(),
            stats.found.to_string().green().bold(),
            "Speed:".dark_grey(),
            format!("{}/s", stats.speed as u64).yellow(),
            "ETA:".dark_grey(),
            format_duration(stats.eta()).magenta(),
            "Check:".dark_grey(),
            stats.checked,
            stats.total,
        )
    }

    /// Plain progress line for `stats`
    pub fn plain_line(stats: &RunStats) -> String {
        format!(
            "[PROGRESS] {:.1}% | Checked: {}/{} | Found: {} | Speed: {}/s | ETA: {}",
            stats.percent(),
            stats.checked,
            stats.total,
            stats.found,
            stats.speed as u64,
            format_duration(stats.eta()),
        )
    }

    /// Draw one snapshot
    pub fn draw(&mut self, stats: &RunStats) -> io::Result<()> {
        match self.mode {
            ProgressMode::Interactive => {
                let line = self.interactive_line(stats);
                let mut out = io::stdout().lock();
                write!(out, "\r{}", line)?;
                out.flush()
            }
            ProgressMode::Plain => {
                let due = self
                    .last_plain
                    .map_or(true, |last| last.elapsed() >= PLAIN_LOG_GAP);
                if due {
                    println!("{}", Self::plain_line(stats));
                    self.last_plain = Some(Instant::now());
                }
                Ok(())
            }
            ProgressMode::Auto | ProgressMode::Off => Ok(()),
        }
    }

    /// Draw every snapshot published on `rx` until the sender is dropped
    pub async fn follow(mut self, mut rx: watch::Receiver<RunStats>) {
        while rx.changed().await.is_ok() {
            let stats = rx.borrow_and_update().clone();
            if let Err(e) = self.draw(&stats) {
                tracing::debug!(error = %e, "progress draw failed");
            }
        }

        if self.mode == ProgressMode::Interactive {
            let mut out = io::stdout().lock();
            let _ = write!(out, "\r{}\r", " ".repeat(120));
            let _ = out.flush();
        }
    }

    /// Print the end-of-run summary
    pub fn summary(&self, stats: &RunStats, elapsed: Duration) {
        if self.mode == ProgressMode::Off {
            return;
        }
        println!();
        println!("{}", "Scan complete!".green());
        println!(
            "{} {} proxies | checked {} in {}",
            "Saved:".yellow(),
            stats.found,
            stats.checked,
            format_duration(elapsed)
        );
    }
}
