//! Operator-facing error text, exit codes and the JSON error line.

use crate::cli::LAST_DEADLINE_MS;
use crate::motion::abort_reason_name;

/// Explain a failed command: what happened, why it usually happens, what to do.
pub fn humanize(err: &eyre::Report) -> String {
    use feeder_core::error::{AbortReason, BuildError, FeederError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPositionSource => {
                "What happened: No encoder was provided to the motion controller.\nLikely causes: The encoder failed to initialize or was not wired into the builder.\nHow to fix: Ensure the encoder is created successfully and passed via with_position_source(...).".to_string()
            }
            BuildError::MissingActuator => {
                "What happened: No motor driver was provided to the motion controller.\nLikely causes: The H-bridge failed to initialize or was not wired into the builder.\nHow to fix: Ensure the driver is created successfully and passed via with_actuator(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the [servo] table.\nHow to fix: Edit the config file, then rerun. See etc/feeder_config.toml for a sample."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FeederError>() {
        return match fe {
            FeederError::Abort(AbortReason::Deadline) => "What happened: The move did not finish before its deadline.\nLikely causes: Jammed tape, driver without power, PWM floor too low for the motor, or an encoder that is not counting.\nHow to fix: Check the mechanics and encoder wiring; raise feeder.deadline_factor or pass --deadline-ms if the feeder is just slow.".to_string(),
            FeederError::Abort(AbortReason::Shutdown) => "What happened: The move was interrupted by a shutdown request.\nThe drive was stopped where the tape came to rest.\nHow to fix: Re-run the command.".to_string(),
            FeederError::HardwareFault(msg) => format!(
                "What happened: The feeder hardware reported a fault ({msg}).\nLikely causes: Encoder counter not responding, GPIO already claimed, or missing permissions.\nHow to fix: Check the [pins] values and wiring, make sure no other process holds the GPIO, then retry."
            ),
            FeederError::Hardware(msg) => format!(
                "What happened: A hardware operation failed ({msg}).\nLikely causes: Wiring or driver problems.\nHow to fix: Re-run with --log-level=debug to see which operation failed."
            ),
            FeederError::Config(msg) => format!(
                "What happened: A value was out of range ({msg}).\nLikely causes: PWM floors or speeds outside 0..=100 in the config or on the command line.\nHow to fix: Correct the value and rerun."
            ),
            FeederError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let chain = format!("{err:#}");
    let lower = chain.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with a readable TOML file. Original: {chain}"
        );
    }

    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this feeder.\nLikely causes: A typo in a key, a missing [pins] entry, or a value of the wrong type.\nHow to fix: Compare with etc/feeder_config.toml. Original: {chain}"
        );
    }

    if lower.contains(" must be ") {
        return format!(
            "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
        );
    }

    if lower.contains("open feeder pins") {
        return "What happened: The feeder GPIO lines could not be claimed.\nLikely causes: Wrong BCM numbers in [pins], or no access to /dev/gpiomem.\nHow to fix: Check the [pins] table and run as a user in the gpio group.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "The command failed.{cause}\nHow to fix: Re-run with --log-level=debug to see the full error chain. Error: {msg}"
    )
}

/// Map AbortReason (if present) to stable exit codes; non-abort errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use feeder_core::error::{AbortReason, FeederError};
    if let Some(FeederError::Abort(reason)) = err.downcast_ref::<FeederError>() {
        return match reason {
            AbortReason::Deadline => 3,
            AbortReason::Shutdown => 4,
        };
    }
    1
}

/// One-line JSON error object for `--json` runs.
pub fn format_error_json(err: &eyre::Report) -> String {
    use feeder_core::error::{AbortReason, FeederError};
    use serde_json::json;

    if let Some(FeederError::Abort(reason)) = err.downcast_ref::<FeederError>() {
        let msg = humanize(err);
        let reason_name = abort_reason_name(reason);
        let obj = match (reason, LAST_DEADLINE_MS.get()) {
            (AbortReason::Deadline, Some(ms)) => {
                json!({ "reason": reason_name, "details": { "deadline_ms": ms }, "message": msg })
            }
            _ => json!({ "reason": reason_name, "message": msg }),
        };
        return obj.to_string();
    }

    // anything else
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
