use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use colored::*;
use gummy_common::config::LoggingConfig;
use tracing::{Event, Level, Subscriber};
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::filter::IndicatifFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::{self, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::terminal::{print, spinner};

pub struct GummyFormatter {
    ansi: bool,
}

impl GummyFormatter {
    pub fn colored() -> Self {
        Self { ansi: true }
    }

    pub fn plain() -> Self {
        Self { ansi: false }
    }
}

/// Short tag of the component that emitted an event.
pub fn component_tag(target: &str) -> Option<&'static str> {
    if target.contains("scanner::masscan") {
        Some("[M]")
    } else if target.contains("scanner::nmap") {
        Some("[N]")
    } else if target.contains("orchestrator") {
        Some("[G]")
    } else {
        None
    }
}

impl<S, N> FormatEvent<S, N> for GummyFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> format::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();

        if meta.target() == print::TARGET {
            ctx.field_format().format_fields(writer.by_ref(), event)?;
            return writeln!(writer);
        }

        let (symbol, color_func): (&str, fn(ColoredString) -> ColoredString) = match *meta.level() {
            Level::TRACE => ("[ ]", |s| s.dimmed()),
            Level::DEBUG => ("[?]", |s| s.blue()),
            Level::INFO => ("[+]", |s| s.green().bold()),
            Level::WARN => ("[*]", |s| s.yellow().bold()),
            Level::ERROR => ("[-]", |s| s.red().bold()),
        };

        if self.ansi {
            write!(writer, "{} ", color_func(symbol.into()))?;
        } else {
            write!(writer, "{symbol} ")?;
        }

        if let Some(tag) = component_tag(meta.target()) {
            if self.ansi {
                write!(writer, "{} ", tag.bright_black())?;
            } else {
                write!(writer, "{tag} ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Installs the global subscriber: colored console output routed around the
/// spinner, plus an optional plain log file without the decorative output.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    let indicatif_layer = IndicatifLayer::new().with_progress_style(spinner::style()?);
    let console = tracing_subscriber::fmt::layer()
        .event_format(GummyFormatter::colored())
        .with_writer(indicatif_layer.get_stderr_writer());

    let file = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(GummyFormatter::plain())
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter_fn(|meta| meta.target() != print::TARGET)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .with(indicatif_layer.with_filter(IndicatifFilter::new(false)))
        .try_init()
        .context("logging is already initialized")?;
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_by_module_path() {
        assert_eq!(component_tag("gummy_core::scanner::masscan"), Some("[M]"));
        assert_eq!(component_tag("gummy_core::scanner::nmap"), Some("[N]"));
        assert_eq!(component_tag("gummy_core::orchestrator"), Some("[G]"));
        assert_eq!(component_tag("gummy_core::parser"), None);
    }
}
