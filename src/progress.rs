//! Progress bar for the follow loop.

use crate::ui;
use graphkit::{FollowOutcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

const MESSAGE_WIDTH: usize = 60;
const TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Drives an `indicatif` bar from [`graphkit::Client::follow_all`].
///
/// Hidden in quiet mode. Unverified pairs are echoed above the bar so they
/// stay visible after it is cleared.
pub struct BarProgress {
    bar: ProgressBar,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        bar.set_style(style);
        Self { bar, quiet }
    }
}

impl ProgressCallback for BarProgress {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_pair_start(&mut self, user: &str, site: &str) {
        self.bar
            .set_message(ui::truncate(&format!("{user} -> {site}"), MESSAGE_WIDTH));
    }

    fn on_pair_complete(&mut self, outcome: &FollowOutcome) {
        if !outcome.verified && !self.quiet {
            self.bar.println(format!(
                "  unverified: {} -> {} ({})",
                outcome.user,
                outcome.site,
                outcome.last_error.as_deref().unwrap_or("unknown")
            ));
        }
        self.bar.inc(1);
    }

    fn on_finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_tracks_position() {
        let mut progress = BarProgress::new(true);
        progress.on_start(2);
        progress.on_pair_start("u1", "s1");
        progress.on_pair_complete(&FollowOutcome::already_following("u1", "s1"));

        assert_eq!(progress.bar.length(), Some(2));
        assert_eq!(progress.bar.position(), 1);
        progress.on_finish();
        assert!(progress.bar.is_finished());
    }
}
