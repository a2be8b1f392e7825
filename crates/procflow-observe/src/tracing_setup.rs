//! Tracing subscriber initialization.
//!
//! # Usage
//!
//! ```no_run
//! use procflow_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
//!
//! let _guard = init_tracing(&TracingOptions::default()).unwrap();
//! // ... run; dropping the guard flushes exported spans ...
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Kept so buffered spans can be flushed on exit.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingOptions {
    /// Directive used when `RUST_LOG` is unset, e.g. `"warn"` or
    /// `"procflow_core=debug"`.
    pub default_filter: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    /// Bridge spans to OpenTelemetry with a stdout exporter.
    pub otel: bool,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            default_filter: "warn".to_string(),
            json: false,
            otel: false,
        }
    }
}

impl TracingOptions {
    /// Default filter for a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace.
    pub fn from_verbosity(verbose: u8) -> Self {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        Self {
            default_filter: level.to_string(),
            ..Self::default()
        }
    }
}

/// Flushes the OpenTelemetry provider when dropped.
#[must_use = "dropping the guard immediately flushes and shuts down span export"]
pub struct TracingGuard {
    _private: (),
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        shutdown_tracing();
    }
}

/// Install the global subscriber.
///
/// Events go to stderr so command output on stdout stays machine-readable.
/// `RUST_LOG` overrides `default_filter`.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(options: &TracingOptions) -> Result<TracingGuard, Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_filter));

    let text_layer = (!options.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json_layer = options.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
    });

    let otel_layer = if options.otel {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("procflow");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TracingGuard { _private: () })
}

/// Flush and shut down the OpenTelemetry provider. No-op when OTel is off.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: OTel tracer provider shutdown error: {e}");
        }
    }
}
