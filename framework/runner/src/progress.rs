use std::cmp::min;
use std::fmt::Write;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Displays a progress bar while a run is in progress to show the user how long is left.
///
/// The bar is cleared when the returned [`RunProgress`] is dropped.
pub fn start_progress(scheme: &str, time_limit: Duration) -> RunProgress {
    let pb = ProgressBar::new(time_limit.as_secs());
    let style = ProgressStyle::with_template(
        "{spinner:.green} {prefix} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {time_limit}]",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .with_key("time_limit", {
        let hours = time_limit.as_secs() / 3600;
        let minutes = (time_limit.as_secs() % 3600) / 60;
        let seconds = time_limit.as_secs() % 60;
        move |_state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
        }
    })
    .progress_chars("#>-");
    pb.set_style(style);
    pb.set_prefix(scheme.to_string());

    let ticker = {
        let pb = pb.clone();
        tokio::spawn(async move {
            let start_time = Instant::now();
            loop {
                let new = min(start_time.elapsed().as_secs(), time_limit.as_secs());
                pb.set_position(new);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        })
    };

    RunProgress { pb, ticker }
}

pub struct RunProgress {
    pb: ProgressBar,
    ticker: JoinHandle<()>,
}

impl Drop for RunProgress {
    fn drop(&mut self) {
        log::trace!("Progress bar finished");
        self.ticker.abort();
        self.pb.finish_and_clear();
    }
}
