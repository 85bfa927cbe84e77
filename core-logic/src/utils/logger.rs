use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target for per-attack outcome lines; always visible on console and in files.
pub const RESULT_TARGET: &str = "attack_result";

/// Installs the console + rolling-file subscriber.
///
/// The returned guard flushes the file writer on drop and must be held by
/// the caller for the lifetime of the program.
pub fn setup_logger(verbose: bool) -> Option<WorkerGuard> {
    if std::fs::create_dir_all("logs").is_err() {
        // Console-only fallback
        let _ = tracing_subscriber::fmt()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .try_init();
        return None;
    }

    let file_appender = tracing_appender::rolling::hourly("logs", "attack-runner");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(RESULT_TARGET, Level::INFO)
        .with_default(if verbose { Level::DEBUG } else { Level::WARN });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(RESULT_TARGET, Level::INFO)
        .with_default(if verbose { Level::DEBUG } else { Level::ERROR });

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    Some(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn paint_keywords(msg: String) -> String {
    let green = Style::new().fg(Color::LightGreen).bold();
    let red = Style::new().fg(Color::LightRed).bold();
    let yellow = Style::new().fg(Color::Yellow).bold();

    if msg.contains("SENT") {
        msg.replace("SENT", &green.paint("SENT").to_string())
    } else if msg.contains("CHALLENGE") {
        msg.replace("CHALLENGE", &yellow.paint("CHALLENGE").to_string())
    } else if msg.contains("FAILED") {
        msg.replace("FAILED", &red.paint("FAILED").to_string())
    } else {
        msg
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        let time = Local::now().format("%H:%M:%S");
        let dimmed = Style::new().dimmed();
        write!(writer, "{} ", dimmed.paint(time.to_string()))?;
        writeln!(writer, "{}", paint_keywords(msg_visitor.message))
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let meta = event.metadata();

        write!(writer, "{} [{}] {}: ", timestamp, meta.level(), meta.target())?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_colored() {
        let painted = paint_keywords("Attack 500|500 SENT".to_string());
        assert!(painted.contains("\u{1b}["));
        let plain = paint_keywords("nothing to see".to_string());
        assert_eq!(plain, "nothing to see");
    }
}
