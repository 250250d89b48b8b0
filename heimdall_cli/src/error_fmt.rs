//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use heimdall_core::error::{BuildError, DetectorError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No rangefinder was provided to the detector.\nLikely causes: The sensor failed to initialize or was not wired into the builder.\nHow to fix: Ensure the rangefinder opens successfully and is passed via with_sensor(...).".to_string()
            }
            BuildError::MissingLanes => {
                "What happened: No lanes were configured.\nLikely causes: The config has no [[lane]] tables, or the builder was never given any.\nHow to fix: Add at least one [[lane]] with min_cm and max_cm to the config.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DetectorError>() {
        return match de {
            DetectorError::Protocol(msg) => format!(
                "What happened: The sensor produced an unreadable frame ({msg}).\nLikely causes: Serial noise, a wrong baud rate, or another process holding the port.\nHow to fix: Check sensor.port and sensor.baud in the config and reseat the cable."
            ),
            DetectorError::UnknownLane(idx) => format!(
                "What happened: Lane index {idx} does not exist.\nLikely causes: A stale lane reference after the config changed.\nHow to fix: Use an index below the number of configured [[lane]] tables."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("failed to read config") {
        return "What happened: The config file could not be read.\nLikely causes: Wrong --config path or a missing file.\nHow to fix: Pass --config with the path to your TOML file.".to_string();
    }

    if lower.contains("invalid configuration") {
        let detail = err
            .source()
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid{detail}.\nLikely causes: Out-of-range values, overlapping lane zones, or a zone reaching the no-target distance.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("failed to open rangefinder") || lower.contains("serial") {
        return "What happened: The rangefinder serial port could not be opened.\nLikely causes: Wrong sensor.port, missing permissions, or the device is absent.\nHow to fix: Check the port path, the user's group permissions, and the wiring.".to_string();
    }

    if lower.contains("timeout") {
        return "What happened: The sensor did not answer within the configured timeout.\nLikely causes: Wiring or power issues, or a timeout configured too low.\nHow to fix: Verify TX/RX and power, and consider raising sensor.read_timeout_ms.".to_string();
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

/// Stable exit codes: 2 for configuration problems, 3 for sensor protocol
/// faults, 1 for everything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use heimdall_core::error::{BuildError, DetectorError};
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if matches!(
        err.downcast_ref::<DetectorError>(),
        Some(DetectorError::Protocol(_))
    ) {
        return 3;
    }
    // Scan the whole context chain, not just the outermost message.
    let chain = format!("{err:#}").to_ascii_lowercase();
    if chain.contains("invalid configuration") || chain.contains("failed to read config") {
        return 2;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use heimdall_core::error::{BuildError, DetectorError};
    use serde_json::json;

    let reason = if let Some(be) = err.downcast_ref::<BuildError>() {
        match be {
            BuildError::MissingSensor => "MissingSensor",
            BuildError::MissingLanes => "MissingLanes",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        }
    } else if let Some(de) = err.downcast_ref::<DetectorError>() {
        match de {
            DetectorError::Protocol(_) => "Protocol",
            DetectorError::UnknownLane(_) => "UnknownLane",
        }
    } else {
        let chain = format!("{err:#}").to_ascii_lowercase();
        if chain.contains("invalid configuration") {
            "InvalidConfig"
        } else {
            "Error"
        }
    };

    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
