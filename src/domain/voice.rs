use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A speech-to-text input language and the reply accents it offers.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageOption {
    pub code: &'static str,
    pub label: &'static str,
    pub accents: Vec<AccentOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccentOption {
    pub code: &'static str,
    pub label: &'static str,
    /// Available voice names, the default (female) voice last.
    pub voices: Vec<&'static str>,
}

impl AccentOption {
    pub fn default_voice(&self) -> &'static str {
        self.voices
            .iter()
            .copied()
            .find(|v| v.ends_with("-Female"))
            .unwrap_or(self.voices[0])
    }
}

impl LanguageOption {
    pub fn default_accent(&self) -> &AccentOption {
        &self.accents[0]
    }

    pub fn accent(&self, code: &str) -> Option<&AccentOption> {
        self.accents.iter().find(|a| a.code == code)
    }
}

/// Languages, accents and voices the text-to-voice endpoint understands.
pub static VOICE_CATALOG: Lazy<Vec<LanguageOption>> = Lazy::new(|| {
    vec![
        LanguageOption {
            code: "en-US",
            label: "English",
            accents: vec![
                AccentOption {
                    code: "en-IN",
                    label: "English (India)",
                    voices: vec!["en-IN-Male", "en-IN-Female"],
                },
                AccentOption {
                    code: "en-US",
                    label: "English (US)",
                    voices: vec!["en-US-Male", "en-US-Female"],
                },
            ],
        },
        LanguageOption {
            code: "hi-IN",
            label: "Hindi",
            accents: vec![AccentOption {
                code: "hi-IN",
                label: "Hindi (India)",
                voices: vec!["hi-IN-Female"],
            }],
        },
    ]
});

fn language(code: &str) -> Option<&'static LanguageOption> {
    VOICE_CATALOG.iter().find(|l| l.code == code)
}

/// Reply voice selection for the anonymous demo surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceOptions {
    pub stt_language: String,
    pub accent_code: String,
    pub voice_name: String,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            stt_language: "en-US".to_string(),
            accent_code: "en-IN".to_string(),
            voice_name: "en-IN-Female".to_string(),
        }
    }
}

impl VoiceOptions {
    /// Switch input language; accent and voice reset to that language's defaults.
    pub fn set_language(&mut self, code: &str) -> Result<(), DomainError> {
        let lang = language(code)
            .ok_or_else(|| DomainError::Config(format!("Unsupported language: {}", code)))?;
        let accent = lang.default_accent();
        self.stt_language = lang.code.to_string();
        self.accent_code = accent.code.to_string();
        self.voice_name = accent.default_voice().to_string();
        Ok(())
    }

    /// Switch accent; the voice resets to the accent's default.
    pub fn set_accent(&mut self, code: &str) -> Result<(), DomainError> {
        let accent = self.language()?.accent(code).ok_or_else(|| {
            DomainError::Config(format!(
                "Accent {} is not offered for {}",
                code, self.stt_language
            ))
        })?;
        self.accent_code = accent.code.to_string();
        self.voice_name = accent.default_voice().to_string();
        Ok(())
    }

    pub fn set_voice(&mut self, name: &str) -> Result<(), DomainError> {
        let accent = self.accent()?;
        if !accent.voices.contains(&name) {
            return Err(DomainError::Config(format!(
                "Voice {} is not offered for {}",
                name, self.accent_code
            )));
        }
        self.voice_name = name.to_string();
        Ok(())
    }

    /// Check a deserialized selection against the catalog.
    pub fn validate(&self) -> Result<(), DomainError> {
        let accent = self.accent()?;
        if !accent.voices.contains(&self.voice_name.as_str()) {
            return Err(DomainError::Config(format!(
                "Voice {} is not offered for {}",
                self.voice_name, self.accent_code
            )));
        }
        Ok(())
    }

    fn language(&self) -> Result<&'static LanguageOption, DomainError> {
        language(&self.stt_language).ok_or_else(|| {
            DomainError::Config(format!("Unsupported language: {}", self.stt_language))
        })
    }

    fn accent(&self) -> Result<&'static AccentOption, DomainError> {
        self.language()?.accent(&self.accent_code).ok_or_else(|| {
            DomainError::Config(format!(
                "Accent {} is not offered for {}",
                self.accent_code, self.stt_language
            ))
        })
    }
}
