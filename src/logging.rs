use std::path::Path;
use std::sync::Once;

use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
    Layer,
};

use crate::error::Result;

// Log targets
pub const PDF_OPERATIONS: &str = "pdf_ops";
pub const PDF_PARSING: &str = "pdf_parse";
pub const HIGHLIGHT_STROKES: &str = "highlight_strokes";
pub const HIGHLIGHT_GEOMETRY: &str = "highlight_geometry";
pub const WORD_MATCHING: &str = "word_matching";

const DEBUG_TARGETS: &[&str] = &[
    PDF_OPERATIONS,
    HIGHLIGHT_STROKES,
    HIGHLIGHT_GEOMETRY,
    WORD_MATCHING,
];

static INIT: Once = Once::new();

fn ops_filter(debug_ops: bool) -> EnvFilter {
    let level = if debug_ops { "trace" } else { "info" };
    EnvFilter::new(
        DEBUG_TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn stderr_filter(debug_ops: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_ops {
            ops_filter(true).add_directive(tracing::Level::INFO.into())
        } else {
            EnvFilter::new("warn")
        }
    })
}

/// Log to stderr. `RUST_LOG` takes precedence; `debug_ops` traces every content
/// stream operator otherwise.
pub fn init_logging(debug_ops: bool) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_filter(stderr_filter(debug_ops)),
            )
            .try_init();
    });

    guard
}

/// Log to stderr and write operator level traces to `highlighter-ops.log` in `log_dir`.
pub fn init_logging_with_dir(debug_ops: bool, log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, "highlighter-ops.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    INIT.call_once(|| {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_writer(file_writer)
            .with_filter(ops_filter(debug_ops));

        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(stderr_filter(false));

        let _ = tracing_subscriber::registry()
            .with(file_layer)
            .with(stderr_layer)
            .try_init();
    });

    Ok(guard)
}
