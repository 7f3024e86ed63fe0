use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Sentence-level (non-turbo) resource that only speaks the standard protocol.
pub const STANDARD_RESOURCE_ID: &str = "volc.seedasr.auc";

/// Concrete protocol used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Single synchronous call
    Flash,
    /// Submit, then poll for the result
    Standard,
}

/// Protocol requested by the user.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeChoice {
    Flash,
    Standard,
    /// Derive the protocol from the resource id
    #[default]
    Auto,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Flash => write!(f, "flash"),
            Mode::Standard => write!(f, "standard"),
        }
    }
}

impl std::fmt::Display for ModeChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeChoice::Flash => write!(f, "flash"),
            ModeChoice::Standard => write!(f, "standard"),
            ModeChoice::Auto => write!(f, "auto"),
        }
    }
}

/// An explicit choice always wins; `auto` maps the designated standard
/// resource to [`Mode::Standard`] and everything else to [`Mode::Flash`].
pub fn select_mode(choice: ModeChoice, resource_id: &str, standard_resource_id: &str) -> Mode {
    match choice {
        ModeChoice::Flash => Mode::Flash,
        ModeChoice::Standard => Mode::Standard,
        ModeChoice::Auto if resource_id == standard_resource_id => Mode::Standard,
        ModeChoice::Auto => Mode::Flash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_picks_standard_only_for_designated_resource() {
        assert_eq!(
            select_mode(ModeChoice::Auto, STANDARD_RESOURCE_ID, STANDARD_RESOURCE_ID),
            Mode::Standard
        );
        for resource in ["volc.bigasr.auc_turbo", "volc.bigasr.auc", "", "VOLC.SEEDASR.AUC"] {
            assert_eq!(
                select_mode(ModeChoice::Auto, resource, STANDARD_RESOURCE_ID),
                Mode::Flash,
                "resource {resource:?}"
            );
        }
    }

    #[test]
    fn test_explicit_choice_overrides_resource() {
        for resource in [STANDARD_RESOURCE_ID, "volc.bigasr.auc_turbo"] {
            assert_eq!(
                select_mode(ModeChoice::Flash, resource, STANDARD_RESOURCE_ID),
                Mode::Flash
            );
            assert_eq!(
                select_mode(ModeChoice::Standard, resource, STANDARD_RESOURCE_ID),
                Mode::Standard
            );
        }
    }

    #[test]
    fn test_mode_choice_parses_from_cli_value() {
        assert_eq!(ModeChoice::from_str("auto", true).unwrap(), ModeChoice::Auto);
        assert_eq!(ModeChoice::from_str("STANDARD", true).unwrap(), ModeChoice::Standard);
        assert!(ModeChoice::from_str("turbo", true).is_err());
    }
}
