use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";

/// Width of the `[component]` column
const COMPONENT_WIDTH: usize = 16;
/// Width of the `[level]` column, icon included
const LEVEL_WIDTH: usize = 9;

/// Log at info with a `component` tag picked up by [`FetcpLogFormatter`]
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(component = $component, $($arg)*)
    };
}

/// Label and ANSI colour for a level
fn level_style(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::ERROR => ("✗ ERROR", "\x1b[91m"),
        Level::WARN => ("⚠ WARN", "\x1b[93m"),
        Level::INFO => ("ℹ INFO", "\x1b[32m"),
        Level::DEBUG => ("◦ DEBUG", "\x1b[90m"),
        Level::TRACE => ("◦ TRACE", "\x1b[90m"),
    }
}

/// Left-align `text` in a column of `width` characters, cutting with `…` when too long
fn fit_column(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return format!("{:<width$}", text, width = width);
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// `[timestamp] [component] [level] message` formatter for the fetcp binary
pub struct FetcpLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl FetcpLogFormatter {
    pub fn new(service_name: impl Into<String>) -> Self {
        let color_enabled = std::env::var("TERM").map_or(false, |term| term != "dumb");
        Self::with_color(service_name, color_enabled)
    }

    pub fn with_color(service_name: impl Into<String>, color_enabled: bool) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled,
        }
    }

    fn component_column(&self, component: Option<&str>) -> String {
        match component {
            Some(component) => fit_column(&format!("{}-{}", self.service_name, component), COMPONENT_WIDTH),
            None => fit_column(&self.service_name, COMPONENT_WIDTH),
        }
    }

    fn paint(&self, color: &'static str) -> &'static str {
        if self.color_enabled {
            color
        } else {
            ""
        }
    }
}

impl<S, N> FormatEvent<S, N> for FetcpLogFormatter
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
        let mut fields = EventFields::default();
        event.record(&mut fields);

        let (label, color) = level_style(event.metadata().level());
        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] ",
            self.paint(CYAN),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            self.component_column(fields.component.as_deref()),
            self.paint(color),
            fit_column(label, LEVEL_WIDTH),
            self.paint(RESET),
        )?;
        writeln!(writer, "{}{}", fields.message, self.paint(RESET))
    }
}

/// The two event fields the formatter prints
#[derive(Default)]
struct EventFields {
    message: String,
    component: Option<String>,
}

impl EventFields {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            "component" => self.component = Some(value),
            _ => {}
        }
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // format_args! messages arrive here; their Debug output is unquoted
        self.store(field, format!("{:?}", value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_column() {
        let formatter = FetcpLogFormatter::with_color("fetcp", false);

        let plain = formatter.component_column(None);
        assert_eq!(plain.len(), COMPONENT_WIDTH);
        assert!(plain.starts_with("fetcp "));

        let tagged = formatter.component_column(Some("echo"));
        assert!(tagged.starts_with("fetcp-echo"));

        let long = formatter.component_column(Some("a-very-long-component"));
        assert_eq!(long.chars().count(), COMPONENT_WIDTH);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_colors_follow_setting() {
        let plain = FetcpLogFormatter::with_color("fetcp", false);
        assert_eq!(plain.paint(level_style(&Level::ERROR).1), "");

        let colored = FetcpLogFormatter::with_color("fetcp", true);
        assert_eq!(colored.paint(level_style(&Level::WARN).1), "\x1b[93m");
    }

    #[test]
    fn test_fit_column() {
        assert_eq!(fit_column("ab", 4), "ab  ");
        assert_eq!(fit_column("abcd", 4), "abcd");
        assert_eq!(fit_column("abcdef", 4), "abc…");
        assert_eq!(fit_column("ℹ INFO", LEVEL_WIDTH).chars().count(), LEVEL_WIDTH);
    }
}
