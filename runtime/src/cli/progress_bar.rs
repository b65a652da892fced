//! Terminal progress bar driven by harvest events.

use crate::progress::{HarvestEventKind, ProgressReceiver};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

/// Render events until every sender is dropped.
pub async fn drive(mut rx: ProgressReceiver, total: u64) {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {wide_msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);

    loop {
        match rx.recv().await {
            Ok(event) => match event.kind {
                HarvestEventKind::ItemStarted {
                    state,
                    district,
                    block,
                    ..
                } => bar.set_message(format!("{state} / {district} / {block}")),
                HarvestEventKind::ItemFinished { populated, position } => {
                    if !populated {
                        bar.println(format!("  [{position}] no data"));
                    }
                    bar.inc(1);
                }
                HarvestEventKind::NavigationFailed { partition, items } => {
                    bar.println(format!(
                        "  partition {partition}: navigation failed, {items} entries not fetched"
                    ));
                    bar.inc(items as u64);
                }
                HarvestEventKind::WorkerPanicked {
                    partition,
                    unfinished,
                } => {
                    bar.println(format!(
                        "  partition {partition}: worker panicked, {unfinished} entries not fetched"
                    ));
                    bar.inc(unfinished as u64);
                }
                HarvestEventKind::Warning { message } => bar.println(format!("  {message}")),
                HarvestEventKind::PartitionStarted { .. }
                | HarvestEventKind::PartitionFinished { .. } => {}
            },
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    bar.finish_with_message("done");
}
