//! Terminal progress bars.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const COUNT_TEMPLATE: &str = "{spinner:.green} {msg} {pos}/{len} [{bar:.cyan/blue}] {percent:>3}%  \
     elapsed: {elapsed_precise}  eta: {eta_precise}";

/// Count-style bar (items done out of `total`); hidden unless `visible`.
#[must_use]
pub fn count_bar(total: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template(COUNT_TEMPLATE) {
        bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    if !label.is_empty() {
        bar.set_message(label.to_string());
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
