// [libs/shared/telemetry/src/lib.rs]
/*!
 * =================================================================
 * APARATO: OBSERVABILITY BOOTSTRAP (V1.0)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4/L6)
 * RESPONSABILIDAD: INICIALIZACIÓN DE TRAZADO ESTRUCTURADO Y CAPTURA DE PÁNICOS
 *
 * Development gets a compact, human-readable layer; production gets
 * flattened JSON events suitable for ingestion by a log aggregator.
 * A global panic hook makes sure a panicked background task (the
 * command reaper, the nonce pruner, ...) leaves a trace instead of
 * disappearing silently.
 * =================================================================
 */

use std::panic;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global `tracing` subscriber for `service_name`.
///
/// Reads `RUST_LOG` if set; otherwise defaults `service_name` to
/// `debug` (debug builds) or `info` (release builds) and silences
/// noisy infrastructure crates. Panics if a global subscriber has
/// already been installed.
pub fn init_tracing(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{service_name}={level},tower_http=warn,hyper=warn,libsql=warn",
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    if cfg!(debug_assertions) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    }

    let service = service_name.to_string();
    panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");

        error!(
            target: "panic_monitor",
            service = %service,
            location = %location,
            "background task panicked: {payload}"
        );
    }));

    info!("telemetry initialized for {service_name}");
}
