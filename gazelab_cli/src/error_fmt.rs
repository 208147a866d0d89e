//! Human-readable error descriptions and structured JSON error formatting.

use gazelab_core::error::{BuildError, CoreError, RenderError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingRenderer => {
                "What happened: No renderer was provided to the sequencer.\nLikely causes: The display front end failed to start or was not wired into the builder.\nHow to fix: Pass a renderer via with_renderer(...).".to_string()
            }
            BuildError::MissingStimulus => {
                "What happened: No stimulus player was provided to the sequencer.\nLikely causes: The clip or collision player was not wired into the builder.\nHow to fix: Pass a player via with_stimulus(...).".to_string()
            }
            BuildError::MissingPersistence => {
                "What happened: No persistence target was provided to the sequencer.\nLikely causes: The output directory was not wired into the builder.\nHow to fix: Pass a persistence target via with_persistence(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or flags, then rerun `gazelab check-config`."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RenderError>() {
        return format!(
            "What happened: {re}.\nLikely causes: The display front end closed or the page is missing an element.\nHow to fix: Restart the display and rerun the session."
        );
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Cancelled => {
                "What happened: The session was stopped before it finished.\nLikely causes: Ctrl-C or an operator shutdown.\nHow to fix: Nothing was exported; start a new session for this participant.".to_string()
            }
            CoreError::RenderUnavailable(why) => format!(
                "What happened: The display became unavailable ({why}).\nLikely causes: The output stream or browser window closed mid-session.\nHow to fix: Restart the display and rerun the session."
            ),
            CoreError::Persistence(why) => format!(
                "What happened: The run data could not be saved ({why}).\nLikely causes: Output directory missing, read-only or full.\nHow to fix: Check --out and free disk space, then rerun."
            ),
            CoreError::Stalled { ms, step } => format!(
                "What happened: No participant or timer event for {ms} ms during '{step}'.\nLikely causes: The participant left or the display stopped responding.\nHow to fix: Check the display, then rerun the session."
            ),
            CoreError::Stimulus(why) => format!(
                "What happened: The stimulus could not be presented ({why}).\nLikely causes: Unknown condition name or missing clip file.\nHow to fix: Check experiment.conditions and stimulus.clip_dir in the config."
            ),
            // Fallback to generic for other domain errors
            CoreError::State(_) => format!(
                "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for gazelab.\nLikely causes: A typo, a wrong value type or an unknown section.\nHow to fix: Fix the config file and rerun. Parser said: {te}"
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("failed to read config") {
        return "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with a readable TOML file (see etc/gazelab.toml).".to_string();
    }

    if lower.contains("must be") || lower.contains("must not") || lower.contains("unreasonably") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the TOML config and run `gazelab check-config`."
        );
    }

    // Gaze trace CSV header special-case
    if lower.contains("gaze trace csv must have headers") {
        return "Invalid headers in gaze trace CSV. Expected 'timestamp_ms,x,y'.".to_string();
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

/// Stable exit codes: 2 cancelled, 3 render unavailable, 4 persistence, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Cancelled => 2,
            CoreError::RenderUnavailable(_) => 3,
            CoreError::Persistence(_) => 4,
            _ => 1,
        };
    }
    if matches!(
        err.downcast_ref::<RenderError>(),
        Some(RenderError::Unavailable(_))
    ) {
        return 3;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    if err.downcast_ref::<toml::de::Error>().is_some() {
        return "Config";
    }
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Cancelled) => "Cancelled",
        Some(CoreError::RenderUnavailable(_)) => "RenderUnavailable",
        Some(CoreError::Persistence(_)) => "Persistence",
        Some(CoreError::Stalled { .. }) => "Stalled",
        Some(CoreError::Stimulus(_)) => "Stimulus",
        Some(CoreError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(CoreError::Stalled { ms, step }) = err.downcast_ref::<CoreError>() {
        return json!({
            "reason": "Stalled",
            "details": { "idle_ms": ms, "step": step.tag() },
            "message": humanize(err),
        })
        .to_string();
    }

    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazelab_core::Step;
    use rstest::rstest;

    #[rstest]
    #[case(eyre::Report::new(CoreError::Cancelled), 2)]
    #[case(eyre::Report::new(CoreError::RenderUnavailable("closed".into())), 3)]
    #[case(eyre::Report::new(CoreError::Persistence("disk full".into())), 4)]
    #[case(eyre::Report::new(CoreError::Stimulus("boom".into())), 1)]
    #[case(eyre::eyre!("anything else"), 1)]
    fn exit_codes_are_stable(#[case] err: eyre::Report, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&err), code);
    }

    #[test]
    fn context_does_not_hide_the_typed_error() {
        let err = eyre::Report::new(CoreError::Persistence("disk full".into()))
            .wrap_err("session failed");
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn stalled_json_carries_details() {
        let err = eyre::Report::new(CoreError::Stalled {
            ms: 20,
            step: Step::Instructions,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Stalled");
        assert_eq!(v["details"]["idle_ms"], 20);
        assert_eq!(v["details"]["step"], "instructions");
        assert!(v["message"].as_str().unwrap().contains("20 ms"));
    }

    #[test]
    fn validation_messages_get_config_hint() {
        let err = eyre::eyre!("calibration.max_passes must be >= 1");
        let text = humanize(&err);
        assert!(text.contains("Configuration is invalid"), "{text}");
        assert!(text.contains("max_passes"));
    }
}
