use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use voxpromo_generation::{AdContent, MediaType, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(pub Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user asked for; enough to generate the ad again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdConfig {
    pub prompt: String,
    pub voice_id: String,
    pub tone: Tone,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music_id: Option<String>,
}

/// One generated ad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdArtifact {
    pub id: ArtifactId,
    pub created_at: DateTime<Utc>,
    pub prompt: String,
    pub voice_id: String,
    pub tone: Tone,
    pub media_type: MediaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music_id: Option<String>,
    pub script_text: String,
    pub music_suggestion_text: String,
    /// Playable audio, a `data:audio/wav;base64,...` URL
    pub audio_url: String,
    #[serde(default)]
    pub is_favorite: bool,
}

impl AdArtifact {
    pub fn new(
        config: AdConfig,
        content: AdContent,
        audio_url: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ArtifactId::new(),
            created_at,
            prompt: config.prompt,
            voice_id: config.voice_id,
            tone: config.tone,
            media_type: config.media_type,
            background_music_id: config.background_music_id,
            script_text: content.script_text,
            music_suggestion_text: content.music_suggestion_text,
            audio_url,
            is_favorite: false,
        }
    }

    /// Configuration that produced this artifact, for duplicate-as-new
    pub fn config(&self) -> AdConfig {
        AdConfig {
            prompt: self.prompt.clone(),
            voice_id: self.voice_id.clone(),
            tone: self.tone,
            media_type: self.media_type,
            background_music_id: self.background_music_id.clone(),
        }
    }
}
