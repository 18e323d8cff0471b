use std::future::Future;

use anyhow::Context;
use indicatif::ProgressStyle;
use tracing::{Instrument, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

pub fn style() -> anyhow::Result<ProgressStyle> {
    let style = ProgressStyle::with_template("{spinner:.blue} {wide_msg} {elapsed:.dim}")
        .context("invalid spinner template")?
        .tick_strings(TICKS);
    Ok(style)
}

/// Keeps a spinner pinned below the log output while `work` runs.
pub async fn with_spinner<F: Future>(message: &str, work: F) -> F::Output {
    let span = info_span!("activity", indicatif.pb_show = true);
    span.pb_set_message(message);
    work.instrument(span).await
}
