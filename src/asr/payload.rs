//! Request bodies for the two recognition protocols.

use serde::{Deserialize, Serialize};

use super::Mode;

/// Body of a submit or flash request. Serializes to the variant's fields only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProtocolBody {
    Flash(FlashBody),
    Standard(StandardBody),
}

impl ProtocolBody {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashBody {
    pub user: User,
    pub audio: InlineAudio,
    pub request: FlashOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineAudio {
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlashOptions {
    pub model_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardBody {
    pub user: User,
    pub audio: DescribedAudio,
    pub request: StandardOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescribedAudio {
    pub data: String,
    pub format: String,
    pub codec: String,
    pub rate: u32,
    pub bits: u32,
    pub channel: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardOptions {
    pub model_name: String,
    pub enable_itn: bool,
    pub enable_punc: bool,
    pub enable_ddc: bool,
    pub enable_speaker_info: bool,
    pub enable_channel_split: bool,
    pub show_utterances: bool,
    pub vad_segment: bool,
    pub sensitive_words_filter: String,
}

/// Audio description sent with standard-protocol jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfile {
    /// User label sent in place of the app id
    pub uid: String,
    /// Container format
    pub format: String,
    pub codec: String,
    /// Sample rate in Hz
    pub rate: u32,
    pub bits: u32,
    pub channel: u32,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            uid: "douyin-transcriptor".to_string(),
            format: "mp4".to_string(),
            codec: "raw".to_string(),
            rate: 16000,
            bits: 16,
            channel: 1,
        }
    }
}

/// Builds [`ProtocolBody`] values. Holds no state besides the fixed profile,
/// so equal inputs always give equal bodies.
#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    profile: AudioProfile,
}

impl PayloadBuilder {
    pub fn new(profile: AudioProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &AudioProfile {
        &self.profile
    }

    pub fn build(&self, mode: Mode, app_id: &str, audio_b64: &str, model_name: &str) -> ProtocolBody {
        match mode {
            Mode::Flash => ProtocolBody::Flash(FlashBody {
                user: User {
                    uid: app_id.to_string(),
                },
                audio: InlineAudio {
                    data: audio_b64.to_string(),
                },
                request: FlashOptions {
                    model_name: model_name.to_string(),
                },
            }),
            Mode::Standard => ProtocolBody::Standard(StandardBody {
                user: User {
                    uid: self.profile.uid.clone(),
                },
                audio: DescribedAudio {
                    data: audio_b64.to_string(),
                    format: self.profile.format.clone(),
                    codec: self.profile.codec.clone(),
                    rate: self.profile.rate,
                    bits: self.profile.bits,
                    channel: self.profile.channel,
                },
                request: StandardOptions {
                    model_name: model_name.to_string(),
                    enable_itn: true,
                    enable_punc: false,
                    enable_ddc: false,
                    enable_speaker_info: false,
                    enable_channel_split: false,
                    show_utterances: false,
                    vad_segment: false,
                    sensitive_words_filter: String::new(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flash_body_shape() {
        let body = PayloadBuilder::default().build(Mode::Flash, "12345", "QUJD", "bigmodel");
        assert!(matches!(body, ProtocolBody::Flash(_)));

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "user": { "uid": "12345" },
                "audio": { "data": "QUJD" },
                "request": { "model_name": "bigmodel" }
            })
        );
    }

    #[test]
    fn test_standard_body_shape() {
        let body = PayloadBuilder::default().build(Mode::Standard, "12345", "QUJD", "bigmodel");
        assert!(matches!(body, ProtocolBody::Standard(_)));

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "user": { "uid": "douyin-transcriptor" },
                "audio": {
                    "data": "QUJD",
                    "format": "mp4",
                    "codec": "raw",
                    "rate": 16000,
                    "bits": 16,
                    "channel": 1
                },
                "request": {
                    "model_name": "bigmodel",
                    "enable_itn": true,
                    "enable_punc": false,
                    "enable_ddc": false,
                    "enable_speaker_info": false,
                    "enable_channel_split": false,
                    "show_utterances": false,
                    "vad_segment": false,
                    "sensitive_words_filter": ""
                }
            })
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = PayloadBuilder::default();
        for mode in [Mode::Flash, Mode::Standard] {
            let a = builder.build(mode, "app", "AAAA", "bigmodel").to_json().unwrap();
            let b = builder.build(mode, "app", "AAAA", "bigmodel").to_json().unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_custom_profile_is_used_for_standard_only() {
        let builder = PayloadBuilder::new(AudioProfile {
            format: "mp3".to_string(),
            rate: 8000,
            ..AudioProfile::default()
        });

        let standard = serde_json::to_value(builder.build(Mode::Standard, "app", "", "m")).unwrap();
        assert_eq!(standard["audio"]["format"], "mp3");
        assert_eq!(standard["audio"]["rate"], 8000);

        let flash = serde_json::to_value(builder.build(Mode::Flash, "app", "", "m")).unwrap();
        assert!(flash["audio"].get("format").is_none());
    }
}
