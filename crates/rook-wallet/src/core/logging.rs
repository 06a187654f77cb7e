//! Logging setup and structured operation events
//!
//! Wallet actions are logged as operation start/success/error triples with
//! structured fields so a front-end log collector can correlate a wallet
//! prompt with the RPC calls and confirmations that followed it.

use tracing::{debug, error, info};

/// Install the global tracing subscriber
///
/// Honours `RUST_LOG` when set and otherwise logs this crate at `info`
/// (`debug` when requested) and everything else at `warn`. Calling it twice
/// is harmless; the second call reports the existing subscriber as an error.
pub fn init_logging(debug: bool) -> Result<(), String> {
	use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

	let default_filter = if debug {
		"rook_wallet=debug,warn"
	} else {
		"rook_wallet=info,warn"
	};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::registry()
		.with(
			fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.with(env_filter)
		.try_init()
		.map_err(|e| e.to_string())
}

/// Record the beginning of a wallet operation
pub fn operation_start(operation: &str, context: &str) {
	info!(
		operation = operation,
		context = context,
		"Operation started"
	);
}

/// Record a completed wallet operation
pub fn operation_success(operation: &str, details: &str) {
	info!(
		operation = operation,
		details = details,
		"Operation completed successfully"
	);
}

/// Record a failed wallet operation before the error is handed back
pub fn operation_error(operation: &str, error: &crate::types::Error) {
	error!(
		operation = operation,
		error = %error,
		"Operation failed"
	);
}

/// Debug-level progress note
pub fn debug_operation(operation: &str, details: &str) {
	debug!(operation = operation, details = details, "Operation step");
}
