//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use crane_core::error::{BuildError, CraneError};

    // Typed matches first; the chain may carry context layers above them.
    if let Some(be) = err.chain().find_map(|e| e.downcast_ref::<BuildError>()) {
        return match be {
            BuildError::MissingCommandSink => {
                "What happened: No command sink was provided to the controller.\nLikely causes: The bus interface failed to open or was not wired into the builder.\nHow to fix: Check the bus backend and pass it via with_command_sink(...).".to_string()
            }
            BuildError::MissingTelemetrySource => {
                "What happened: No telemetry source was provided to the controller.\nLikely causes: The bus interface failed to open or was not wired into the builder.\nHow to fix: Check the bus backend and pass it via with_telemetry_source(...).".to_string()
            }
            BuildError::MissingPerception => {
                "What happened: No perception source was provided to the controller.\nLikely causes: The scene provider was not wired into the builder.\nHow to fix: Pass a perception source via with_perception(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/crane_config.toml for a sample."
            ),
        };
    }

    if let Some(ce) = err.chain().find_map(|e| e.downcast_ref::<CraneError>()) {
        return match ce {
            CraneError::Disconnected => "What happened: The telemetry receiver stopped.\nLikely causes: The bus interface went down or the simulator was closed.\nHow to fix: Check the interface state (`ip link`), then restart the run.".to_string(),
            CraneError::Timeout => "What happened: No telemetry arrived in time.\nLikely causes: Board not powered, wrong bus.telemetry_id, or bus down.\nHow to fix: Verify the telemetry id and wiring; consider raising estimator.query_timeout_ms.".to_string(),
            CraneError::Transport(m) | CraneError::HardwareFault(m) => format!(
                "What happened: Bus transport failed ({m}).\nLikely causes: Interface missing, not up, or insufficient permissions.\nHow to fix: Check bus.interface in the config and bring the link up before running."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config <FILE> pointing at a readable TOML file. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: A TOML syntax error or out-of-range value ({msg}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("not compiled in") {
        return format!(
            "What happened: The bus backend is not available in this build.\nLikely causes: Built without the `hardware` feature.\nHow to fix: Pass --sim, or rebuild with `--features hardware`. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use crane_core::error::{BuildError, CraneError};
    if let Some(ce) = err.chain().find_map(|e| e.downcast_ref::<CraneError>()) {
        return match ce {
            CraneError::Transport(_) => "Transport",
            CraneError::HardwareFault(_) => "HardwareFault",
            CraneError::Config(_) => "Config",
            CraneError::Timeout => "Timeout",
            CraneError::InsufficientData => "InsufficientData",
            CraneError::Disconnected => "Disconnected",
            CraneError::Perception(_) => "Perception",
        };
    }
    if err.chain().any(|e| e.downcast_ref::<BuildError>().is_some()) {
        return "Build";
    }
    "Error"
}

/// Stable exit codes: 3 disconnected, 4 timeout, 5 transport/hardware, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Disconnected" => 3,
        "Timeout" => 4,
        "Transport" | "HardwareFault" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}
