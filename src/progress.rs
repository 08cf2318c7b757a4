//! Terminal progress bar with a running-average ETA.
//!
//! The tracker owns the last line of its output stream: every redraw starts
//! with `\r` and overwrites the previous bar in place, and [`ProgressTracker::log`]
//! erases the bar before printing a message above it. Other writers sharing
//! the same stream will corrupt the display.

use crate::clock::{Clock, SystemClock};
use crate::errors::{CoreError, Result};
use crate::helpers::{format_clock_time, format_duration};
use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Appearance of a progress line.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressStyle {
    /// Prefix printed before the percentage.
    pub label: String,
    /// Number of character slots representing 100%.
    pub bar_width: usize,
    /// Character used for completed slots.
    pub fill: char,
    /// Character used for remaining slots.
    pub empty: char,
}

impl Default for ProgressStyle {
    fn default() -> Self {
        Self {
            label: "Progress".to_string(),
            bar_width: 25,
            fill: '█',
            empty: ' ',
        }
    }
}

impl ProgressStyle {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn with_bar_width(mut self, bar_width: usize) -> Self {
        self.bar_width = bar_width;
        self
    }

    pub fn with_chars(mut self, fill: char, empty: char) -> Self {
        self.fill = fill;
        self.empty = empty;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.bar_width < 1 {
            return Err(CoreError::invalid_argument("bar width must be at least 1"));
        }
        if self.label.is_empty() {
            return Err(CoreError::invalid_argument("label must not be empty"));
        }
        if self.label.contains(['\r', '\n']) {
            return Err(CoreError::invalid_argument(
                "label must fit on a single line",
            ));
        }
        if [self.fill, self.empty].iter().any(|c| c.is_control()) {
            return Err(CoreError::invalid_argument(
                "bar characters must be printable",
            ));
        }
        Ok(())
    }
}

/// Step counter rendered as a single self-overwriting terminal line.
pub struct ProgressTracker<W: Write, C: Clock = SystemClock> {
    out: W,
    clock: C,
    style: ProgressStyle,
    total_steps: u64,
    current_step: u64,
    start_time: DateTime<FixedOffset>,
    average_time_per_step: Option<Duration>,
    estimated_remaining: Option<Duration>,
    estimated_finish: Option<DateTime<FixedOffset>>,
    last_rendered_width: usize,
    released: bool,
}

impl<W: Write> ProgressTracker<W, SystemClock> {
    /// Creates a tracker reading the local system clock and draws the initial bar.
    pub fn new(out: W, total_steps: u64, style: ProgressStyle) -> Result<Self> {
        Self::with_clock(out, SystemClock, total_steps, style)
    }
}

impl<W: Write, C: Clock> ProgressTracker<W, C> {
    /// Creates a tracker with an explicit clock and draws the initial bar.
    ///
    /// A tracker with zero total steps is complete from the start.
    pub fn with_clock(out: W, clock: C, total_steps: u64, style: ProgressStyle) -> Result<Self> {
        style.validate()?;
        let start_time = clock.now();
        let mut tracker = Self {
            out,
            clock,
            style,
            total_steps,
            current_step: 0,
            start_time,
            average_time_per_step: None,
            estimated_remaining: None,
            estimated_finish: None,
            last_rendered_width: 0,
            released: false,
        };
        tracker.draw()?;
        Ok(tracker)
    }

    /// Records one completed step.
    pub fn advance(&mut self) -> Result<()> {
        self.advance_by(1)
    }

    /// Records `steps` completed steps, clamping at the total, and redraws.
    pub fn advance_by(&mut self, steps: u64) -> Result<()> {
        self.current_step = self
            .current_step
            .saturating_add(steps)
            .min(self.total_steps);
        self.update_estimates();
        tracing::trace!(
            current_step = self.current_step,
            total_steps = self.total_steps,
            "progress advanced"
        );
        self.draw()
    }

    /// Prints `value` on its own line above the bar, then redraws the bar.
    pub fn log(&mut self, value: &str) -> Result<()> {
        if value.contains('\r') {
            return Err(CoreError::invalid_argument(
                "log messages must not contain carriage returns",
            ));
        }
        let blank = " ".repeat(self.last_rendered_width);
        write!(self.out, "\r{blank}\r{value}\n")?;
        self.draw()
    }

    /// Renders the current state without writing it anywhere.
    pub fn render(&self) -> String {
        let filled = self.filled_blocks();
        let mut bar = String::with_capacity(self.style.bar_width + 2);
        bar.push('[');
        bar.extend(std::iter::repeat(self.style.fill).take(filled));
        bar.extend(std::iter::repeat(self.style.empty).take(self.style.bar_width - filled));
        bar.push(']');

        format!(
            "{label}: {percentage:>3}%{bar}[{current}/{total}] [{start}|{finish}|{average}]",
            label = self.style.label,
            percentage = self.percentage(),
            current = self.current_step,
            total = self.total_steps,
            start = format_clock_time(Some(&self.start_time)),
            finish = format_clock_time(self.estimated_finish.as_ref()),
            average = format_duration(self.average_time_per_step),
        )
    }

    /// Writes the trailing newline that releases the terminal line.
    pub fn finish(mut self) -> Result<()> {
        self.release()
    }

    /// Integer percentage of completed steps, rounded down.
    pub fn percentage(&self) -> u64 {
        if self.total_steps == 0 {
            return 100;
        }
        (u128::from(self.current_step) * 100 / u128::from(self.total_steps)) as u64
    }

    /// Number of filled slots: `round(bar_width * current / total)`, half away from zero.
    pub fn filled_blocks(&self) -> usize {
        let width = self.style.bar_width;
        if self.total_steps == 0 {
            return width;
        }
        let ratio = self.current_step as f64 / self.total_steps as f64;
        ((width as f64 * ratio).round() as usize).min(width)
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == self.total_steps
    }

    pub fn start_time(&self) -> DateTime<FixedOffset> {
        self.start_time
    }

    pub fn average_time_per_step(&self) -> Option<Duration> {
        self.average_time_per_step
    }

    pub fn estimated_remaining(&self) -> Option<Duration> {
        self.estimated_remaining
    }

    pub fn estimated_finish(&self) -> Option<DateTime<FixedOffset>> {
        self.estimated_finish
    }

    pub fn style(&self) -> &ProgressStyle {
        &self.style
    }

    /// Borrows the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn update_estimates(&mut self) {
        if self.current_step == 0 {
            return;
        }
        let now = self.clock.now();
        let elapsed_ms = (now - self.start_time).num_milliseconds().max(0) as f64;
        let average_ms = elapsed_ms / self.current_step as f64;
        let remaining_steps = self.total_steps - self.current_step;

        // Estimates beyond what chrono can represent stay unknown.
        let remaining = whole_milliseconds(average_ms * remaining_steps as f64);
        self.average_time_per_step = whole_milliseconds(average_ms);
        self.estimated_remaining = remaining;
        self.estimated_finish = remaining.and_then(|remaining| now.checked_add_signed(remaining));
    }

    fn draw(&mut self) -> Result<()> {
        let line = self.render();
        write!(self.out, "\r{line}")?;
        self.out.flush()?;
        // Counts chars, not terminal columns: wide glyphs in the label are
        // blanked short by `log`.
        self.last_rendered_width = line.chars().count();
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

fn whole_milliseconds(ms: f64) -> Option<Duration> {
    let ms = ms.round();
    if !ms.is_finite() || ms >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(ms as i64)
}

impl<W: Write, C: Clock> Drop for ProgressTracker<W, C> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to release progress line");
        }
    }
}

impl<W: Write, C: Clock> std::fmt::Debug for ProgressTracker<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("label", &self.style.label)
            .field("current_step", &self.current_step)
            .field("total_steps", &self.total_steps)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}
