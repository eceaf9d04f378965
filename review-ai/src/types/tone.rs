//! Tone settings that shape generated replies.
//!
//! Each dial runs from 1.0 (left label) to 10.0 (right label). `Config` is
//! stored as camelCase JSON on the business account.

use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

pub const DIAL_MIN: f64 = 1.0;
pub const DIAL_MAX: f64 = 10.0;
pub const DIAL_DEFAULT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Casual (1) to professional (10)
    pub casual_professional: f64,
    /// Concise (1) to friendly (10)
    pub concise_friendly: f64,
    /// Humble (1) to confident (10)
    pub humble_confident: f64,
    /// Short (1) to detailed (10)
    pub short_detailed: f64,
    /// Calm (1) to excited (10)
    pub calm_excited: f64,
    /// Empathetic (1) to neutral (10); only applied to negative reviews
    pub empathetic_neutral: f64,
    pub support_email: Option<String>,
    pub include_support_email: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            casual_professional: DIAL_DEFAULT,
            concise_friendly: DIAL_DEFAULT,
            humble_confident: DIAL_DEFAULT,
            short_detailed: DIAL_DEFAULT,
            calm_excited: DIAL_DEFAULT,
            empathetic_neutral: DIAL_DEFAULT,
            support_email: None,
            include_support_email: false,
        }
    }
}

impl Config {
    fn dials(&self) -> [(&'static str, f64); 6] {
        [
            ("casualProfessional", self.casual_professional),
            ("conciseFriendly", self.concise_friendly),
            ("humbleConfident", self.humble_confident),
            ("shortDetailed", self.short_detailed),
            ("calmExcited", self.calm_excited),
            ("empatheticNeutral", self.empathetic_neutral),
        ]
    }

    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in self.dials() {
            if !value.is_finite() || !(DIAL_MIN..=DIAL_MAX).contains(&value) {
                return Err(Error::Configuration(format!(
                    "{name} must be between {DIAL_MIN} and {DIAL_MAX}, got {value}"
                )));
            }
        }

        if self.include_support_email {
            match self.support_email.as_deref() {
                Some(email) if EmailAddress::is_valid(email) => {}
                Some(email) => {
                    return Err(Error::Configuration(format!(
                        "supportEmail is not a valid address: {email}"
                    )))
                }
                None => {
                    return Err(Error::Configuration(
                        "includeSupportEmail requires a supportEmail".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }

    /// Support address to offer in replies, when enabled.
    pub fn support_contact(&self) -> Option<&str> {
        if self.include_support_email {
            self.support_email.as_deref().filter(|email| !email.is_empty())
        } else {
            None
        }
    }

    /// Style instructions for the reply model, one per line.
    pub fn style_guidance(&self) -> Vec<String> {
        vec![
            format!("Register: {}.", lean(self.casual_professional, "casual", "professional")),
            format!("Warmth: {}.", lean(self.concise_friendly, "concise", "friendly")),
            format!("Stance: {}.", lean(self.humble_confident, "humble", "confident")),
            format!("Energy: {}.", lean(self.calm_excited, "calm", "excited")),
            format!("Length: at most {} sentences.", self.sentence_budget()),
        ]
    }

    /// Guidance added when replying to a negative review.
    pub fn negative_review_guidance(&self) -> String {
        format!(
            "The customer is unhappy. Acknowledge the problem; be {}.",
            lean(self.empathetic_neutral, "empathetic", "neutral")
        )
    }

    /// Maps the short/detailed dial onto 1..=4 sentences.
    pub fn sentence_budget(&self) -> u32 {
        let span = (self.short_detailed.clamp(DIAL_MIN, DIAL_MAX) - DIAL_MIN) / (DIAL_MAX - DIAL_MIN);
        1 + (span * 3.0).round() as u32
    }
}

fn lean(value: f64, left: &str, right: &str) -> String {
    if value < 3.0 {
        format!("clearly {left}")
    } else if value < 4.5 {
        format!("somewhat {left}")
    } else if value <= 6.5 {
        format!("balanced between {left} and {right}")
    } else if value <= 8.0 {
        format!("somewhat {right}")
    } else {
        format!("clearly {right}")
    }
}

/// Named starting points offered in tone settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Corporate,
    Warm,
    Startup,
    Local,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Corporate, Preset::Warm, Preset::Startup, Preset::Local];

    /// Dial values for this preset. Empathy and support email keep their defaults.
    pub fn config(self) -> Config {
        let (cp, cf, hc, sd, ce) = match self {
            Preset::Corporate => (9.0, 2.0, 7.5, 4.0, 2.0),
            Preset::Warm => (4.0, 9.5, 3.5, 6.0, 7.0),
            Preset::Startup => (2.0, 5.0, 1.5, 4.0, 5.0),
            Preset::Local => (3.0, 7.0, 4.0, 8.0, 7.0),
        };
        Config {
            casual_professional: cp,
            concise_friendly: cf,
            humble_confident: hc,
            short_detailed: sd,
            calm_excited: ce,
            ..Config::default()
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Corporate => write!(f, "corporate"),
            Preset::Warm => write!(f, "warm"),
            Preset::Startup => write!(f, "startup"),
            Preset::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.to_string().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::Configuration(format!("unknown tone preset: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_centered_and_valid() {
        let config = Config::default();
        assert_eq!(config.casual_professional, 5.0);
        assert_eq!(config.empathetic_neutral, 5.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.sentence_budget(), 2);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"casualProfessional": 8.5}"#).unwrap();
        assert_eq!(config.casual_professional, 8.5);
        assert_eq!(config.calm_excited, DIAL_DEFAULT);
        assert!(!config.include_support_email);
    }

    #[test]
    fn out_of_range_dials_are_rejected() {
        for value in [0.5, 10.5, f64::NAN, f64::INFINITY] {
            let config = Config {
                calm_excited: value,
                ..Config::default()
            };
            assert!(
                matches!(config.validate(), Err(Error::Configuration(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn support_email_required_when_included() {
        let mut config = Config {
            include_support_email: true,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.support_email = Some("not an email".to_string());
        assert!(config.validate().is_err());

        config.support_email = Some("help@example.com".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(config.support_contact(), Some("help@example.com"));
    }

    #[test]
    fn support_contact_hidden_unless_included() {
        let config = Config {
            support_email: Some("help@example.com".to_string()),
            ..Config::default()
        };
        assert_eq!(config.support_contact(), None);
    }

    #[test]
    fn presets_match_settings_page() {
        let corporate = Preset::Corporate.config();
        assert_eq!(corporate.casual_professional, 9.0);
        assert_eq!(corporate.concise_friendly, 2.0);
        assert_eq!(corporate.humble_confident, 7.5);

        let local = Preset::Local.config();
        assert_eq!(local.short_detailed, 8.0);
        assert_eq!(local.empathetic_neutral, DIAL_DEFAULT);

        for preset in Preset::ALL {
            assert!(preset.config().validate().is_ok(), "{preset}");
        }
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!("Warm".parse::<Preset>().unwrap(), Preset::Warm);
        assert!("friendly".parse::<Preset>().is_err());
    }

    #[test]
    fn guidance_reflects_dial_positions() {
        let corporate = Preset::Corporate.config().style_guidance().join(" ");
        assert!(corporate.contains("clearly professional"));
        assert!(corporate.contains("clearly concise"));

        let startup = Preset::Startup.config().style_guidance().join(" ");
        assert!(startup.contains("clearly casual"));
        assert!(startup.contains("clearly humble"));
    }

    #[test]
    fn sentence_budget_spans_one_to_four() {
        let short = Config {
            short_detailed: 1.0,
            ..Config::default()
        };
        let long = Config {
            short_detailed: 10.0,
            ..Config::default()
        };
        assert_eq!(short.sentence_budget(), 1);
        assert_eq!(long.sentence_budget(), 4);
    }
}
