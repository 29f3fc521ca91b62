//! Derivation of UI control affordances from activity state
//!
//! Pure and total over its input domain; the primary target for exhaustive
//! affordance tests. Never stored, always recomputed.

use crate::convo::phase::GenerationPhase;

/// Which controls are enabled right now, plus the status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsState {
    pub speak_enabled: bool,
    pub stop_enabled: bool,
    pub clear_enabled: bool,
    pub status_text: String,
}

/// Derive the control affordances for the current activity state.
///
/// Status priority, highest first: speaking > transcribing > generating >
/// listening with speech heard > listening > idle. Clearing is only allowed
/// when nothing at all is in progress, since a clear mid-turn would corrupt
/// in-flight state.
pub fn derive_controls(
    is_speaking: bool,
    is_listening: bool,
    is_hearing_speech: bool,
    is_transcribing: bool,
    phase: GenerationPhase,
) -> ControlsState {
    let generating = phase.is_generating();
    let any_active =
        is_speaking || is_listening || is_hearing_speech || is_transcribing || generating;

    let status_text = if is_speaking {
        "Speaking"
    } else if is_transcribing {
        "Transcribing"
    } else if generating {
        "Generating"
    } else if is_listening && is_hearing_speech {
        "Listening (speech detected)"
    } else if is_listening {
        "Listening"
    } else {
        "Ready"
    };

    ControlsState {
        speak_enabled: !(is_listening || is_transcribing),
        stop_enabled: any_active,
        clear_enabled: !any_active,
        status_text: status_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convo::phase::GenerationPhase::*;

    const PHASES: [GenerationPhase; 4] =
        [Idle, GeneratingFirst, GeneratingRemainder, SingleShotGenerating];

    fn flag_cube() -> impl Iterator<Item = (bool, bool, bool, bool)> {
        (0u8..16).map(|bits| {
            (
                bits & 1 != 0,
                bits & 2 != 0,
                bits & 4 != 0,
                bits & 8 != 0,
            )
        })
    }

    #[test]
    fn test_deterministic_over_full_domain() {
        for phase in PHASES {
            for (speaking, listening, hearing, transcribing) in flag_cube() {
                let a = derive_controls(speaking, listening, hearing, transcribing, phase);
                let b = derive_controls(speaking, listening, hearing, transcribing, phase);
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_speaking_always_wins_status() {
        for phase in PHASES {
            for (_, listening, hearing, transcribing) in flag_cube() {
                let controls = derive_controls(true, listening, hearing, transcribing, phase);
                assert_eq!(controls.status_text, "Speaking");
            }
        }
    }

    #[test]
    fn test_clear_never_enabled_while_active() {
        for phase in PHASES {
            for (speaking, listening, hearing, transcribing) in flag_cube() {
                let any = speaking || listening || hearing || transcribing || phase.is_generating();
                let controls = derive_controls(speaking, listening, hearing, transcribing, phase);
                assert_eq!(controls.clear_enabled, !any);
                assert_eq!(controls.stop_enabled, any);
            }
        }
    }

    #[test]
    fn test_speak_disabled_while_capturing() {
        let controls = derive_controls(false, true, false, false, Idle);
        assert!(!controls.speak_enabled);

        let controls = derive_controls(false, false, false, true, Idle);
        assert!(!controls.speak_enabled);

        let controls = derive_controls(false, false, false, false, Idle);
        assert!(controls.speak_enabled);
    }

    #[test]
    fn test_status_priority_order() {
        assert_eq!(
            derive_controls(false, true, false, true, GeneratingFirst).status_text,
            "Transcribing"
        );
        assert_eq!(
            derive_controls(false, true, true, false, GeneratingRemainder).status_text,
            "Generating"
        );
        assert_eq!(
            derive_controls(false, true, true, false, Idle).status_text,
            "Listening (speech detected)"
        );
        assert_eq!(
            derive_controls(false, true, false, false, Idle).status_text,
            "Listening"
        );
        assert_eq!(
            derive_controls(false, false, false, false, Idle).status_text,
            "Ready"
        );
    }
}
