use std::io::{self, IsTerminal};
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::ProgressStyle;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use tracing::level_filters::LevelFilter;
use tracing::{Level, Metadata};
use tracing_indicatif::{IndicatifLayer, TickSettings};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, filter, fmt};

use crate::error::TelemetryError;

/// Only spans from this crate drive progress spinners.
const PROGRESS_TARGET_PREFIX: &str = "gattcheck::";
const DEFAULT_DIRECTIVE: &str = "warn";
const SPINNER_TICK: Duration = Duration::from_millis(90);

static TRACING_INITIALISED: OnceLock<Result<(), TelemetryError>> = OnceLock::new();

/// Initialises structured logging and OpenTelemetry tracing support.
///
/// Only the first call in a process takes effect. `log_level` overrides
/// `RUST_LOG` when given.
pub(crate) fn initialise_tracing(
    service_name: &str,
    interactive_terminal: bool,
    log_level: Option<LevelFilter>,
) -> Result<(), &'static TelemetryError> {
    TRACING_INITIALISED
        .get_or_init(|| {
            let tracer = install_tracer(service_name);
            let env_filter = log_filter(log_level);
            if interactive_terminal && io::stderr().is_terminal() {
                install_interactive(env_filter, tracer)
            } else {
                install_json(env_filter, tracer)
            }
        })
        .as_ref()
        .copied()
}

fn install_tracer(service_name: &str) -> SdkTracer {
    let tracer_provider = SdkTracerProvider::builder().build();
    let tracer = tracer_provider.tracer(service_name.to_owned());
    global::set_tracer_provider(tracer_provider);
    tracer
}

/// Pretty logs share stderr with the progress spinners.
fn install_interactive(env_filter: EnvFilter, tracer: SdkTracer) -> Result<(), TelemetryError> {
    let indicatif_layer = IndicatifLayer::new()
        .with_progress_style(progress_style())
        .with_tick_settings(TickSettings {
            default_tick_interval: Some(SPINNER_TICK),
            ..TickSettings::default()
        });
    let log_layer = fmt::layer()
        .pretty()
        .with_target(false)
        .with_writer(indicatif_layer.get_stderr_writer())
        .with_filter(env_filter);
    let progress_layer = indicatif_layer.with_filter(filter::filter_fn(is_progress_span));

    tracing_subscriber::registry()
        .with(log_layer)
        .with(progress_layer)
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()?;
    Ok(())
}

fn install_json(env_filter: EnvFilter, tracer: SdkTracer) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(false).with_filter(env_filter))
        .with(OpenTelemetryLayer::new(tracer))
        .try_init()?;
    Ok(())
}

fn log_filter(log_level: Option<LevelFilter>) -> EnvFilter {
    match log_level {
        Some(level) => EnvFilter::default().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan.bold} {msg}")
        .unwrap_or_else(|_error| ProgressStyle::default_spinner())
}

fn is_progress_span(metadata: &Metadata<'_>) -> bool {
    metadata.is_span()
        && metadata.target().starts_with(PROGRESS_TARGET_PREFIX)
        && *metadata.level() <= Level::INFO
}
