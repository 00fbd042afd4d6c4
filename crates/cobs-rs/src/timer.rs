//! Wall-clock phase timer for query observability.

use std::fmt;
use std::time::{Duration, Instant};

/// Accumulates named phase durations; at most one phase is active at a
/// time, and phases keep their first-seen order for display.
#[derive(Debug, Default)]
pub struct Timer {
    phases: Vec<(&'static str, Duration)>,
    active: Option<(&'static str, Instant)>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the active phase, if any, and start `name`.
    pub fn start(&mut self, name: &'static str) {
        self.stop();
        self.active = Some((name, Instant::now()));
    }

    /// Stop the active phase, folding its elapsed time into the totals.
    pub fn stop(&mut self) {
        if let Some((name, since)) = self.active.take() {
            let elapsed = since.elapsed();
            if let Some((_, total)) = self.phases.iter_mut().find(|(n, _)| *n == name) {
                *total += elapsed;
            } else {
                self.phases.push((name, elapsed));
            }
        }
    }

    pub fn reset(&mut self) {
        self.phases.clear();
        self.active = None;
    }

    /// Accumulated time of one phase.
    pub fn get(&self, name: &str) -> Duration {
        self.phases
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, d)| *d)
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.phases.iter().map(|(_, d)| *d).sum()
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, d)) in self.phases.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={:.6}s", name.replace(' ', "_"), d.as_secs_f64())?;
        }
        write!(f, " total={:.6}s", self.total().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_accumulate_and_keep_order() {
        let mut t = Timer::new();
        t.start("a");
        t.start("b");
        t.start("a");
        t.stop();
        assert_eq!(t.phases.len(), 2);
        assert_eq!(t.phases[0].0, "a");
        assert_eq!(t.phases[1].0, "b");
        assert_eq!(t.get("missing"), Duration::ZERO);
    }

    #[test]
    fn display_names_have_no_spaces() {
        let mut t = Timer::new();
        t.start("and rows");
        t.stop();
        let s = t.to_string();
        assert!(s.contains("and_rows="));
        assert!(s.contains("total="));
    }
}
