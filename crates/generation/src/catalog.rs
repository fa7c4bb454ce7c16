//! Voices, tones, media types and background music offered to the user

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "Feminina")]
    Female,
    #[serde(rename = "Masculina")]
    Male,
}

/// A selectable narrator voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceOption {
    pub id: &'static str,
    pub name: &'static str,
    pub gender: Gender,
    pub style: &'static str,
    /// Prebuilt voice name understood by the speech synthesizer
    pub voice_name: &'static str,
    pub description: &'static str,
}

pub const VOICE_OPTIONS: [VoiceOption; 12] = [
    VoiceOption {
        id: "f1",
        name: "Aurora",
        gender: Gender::Female,
        style: "Jovem e Animada",
        voice_name: "Zephyr",
        description: "Uma voz feminina vibrante e jovial, ideal para campanhas dinâmicas.",
    },
    VoiceOption {
        id: "f2",
        name: "Luna",
        gender: Gender::Female,
        style: "Calma e Confiante",
        voice_name: "Kore",
        description: "Voz feminina suave e profissional, perfeita para mensagens institucionais.",
    },
    VoiceOption {
        id: "f3",
        name: "Estrela",
        gender: Gender::Female,
        style: "Amigável e Expressiva",
        voice_name: "Zephyr",
        description: "Uma voz versátil, amigável e com ótima dicção.",
    },
    VoiceOption {
        id: "f4",
        name: "Serena",
        gender: Gender::Female,
        style: "Sofisticada e Clara",
        voice_name: "Kore",
        description: "Voz feminina elegante e clara, ideal para público mais seleto.",
    },
    VoiceOption {
        id: "f5",
        name: "Vivian",
        gender: Gender::Female,
        style: "Entusiasta e Envolvente",
        voice_name: "Zephyr",
        description: "Uma voz que transmite entusiasmo e cativa a atenção.",
    },
    VoiceOption {
        id: "f6",
        name: "Clara",
        gender: Gender::Female,
        style: "Profissional e Direta",
        voice_name: "Kore",
        description: "Voz feminina direta e profissional para informações importantes.",
    },
    VoiceOption {
        id: "m1",
        name: "Titan",
        gender: Gender::Male,
        style: "Vigoroso e Jovem",
        voice_name: "Puck",
        description: "Uma voz masculina enérgica e jovial, perfeita para anúncios de impacto.",
    },
    VoiceOption {
        id: "m2",
        name: "Netuno",
        gender: Gender::Male,
        style: "Profundo e Autoritário",
        voice_name: "Charon",
        description: "Voz masculina grave e imponente, ideal para mensagens de autoridade.",
    },
    VoiceOption {
        id: "m3",
        name: "Orion",
        gender: Gender::Male,
        style: "Robusto e Confiante",
        voice_name: "Fenrir",
        description: "Uma voz masculina forte e segura, que inspira confiança.",
    },
    VoiceOption {
        id: "m4",
        name: "Apolo",
        gender: Gender::Male,
        style: "Animado e Expressivo",
        voice_name: "Puck",
        description: "Voz masculina dinâmica e cheia de vida, para campanhas divertidas.",
    },
    VoiceOption {
        id: "m5",
        name: "Atlas",
        gender: Gender::Male,
        style: "Sério e Persuasivo",
        voice_name: "Charon",
        description: "Uma voz masculina séria e focada, para persuadir o ouvinte.",
    },
    VoiceOption {
        id: "m6",
        name: "Zenith",
        gender: Gender::Male,
        style: "Amigável e Acolhedor",
        voice_name: "Fenrir",
        description: "Voz masculina calorosa e acessível, que gera conexão.",
    },
];

/// Look up a voice by id
pub fn voice(id: &str) -> Result<&'static VoiceOption, GenerationError> {
    VOICE_OPTIONS
        .iter()
        .find(|voice| voice.id == id)
        .ok_or_else(|| GenerationError::UnknownVoice(id.to_string()))
}

/// Tone of the ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tone {
    #[serde(rename = "Institucional")]
    Institutional,
    #[serde(rename = "Animado")]
    Animated,
    #[serde(rename = "Emocional")]
    Emotional,
    #[serde(rename = "Divertido")]
    Fun,
    #[serde(rename = "Épico")]
    Epic,
}

impl Tone {
    pub const ALL: [Tone; 5] = [
        Tone::Institutional,
        Tone::Animated,
        Tone::Emotional,
        Tone::Fun,
        Tone::Epic,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Tone::Institutional => "Institucional",
            Tone::Animated => "Animado",
            Tone::Emotional => "Emocional",
            Tone::Fun => "Divertido",
            Tone::Epic => "Épico",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tone {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tone::ALL
            .into_iter()
            .find(|tone| tone.label() == s)
            .ok_or_else(|| GenerationError::InvalidInput(format!("unknown tone: {}", s)))
    }
}

/// Where the ad will run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "Rádio")]
    Radio,
    #[serde(rename = "Televisão")]
    Television,
    Instagram,
    TikTok,
    YouTube,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::Radio,
        MediaType::Television,
        MediaType::Instagram,
        MediaType::TikTok,
        MediaType::YouTube,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MediaType::Radio => "Rádio",
            MediaType::Television => "Televisão",
            MediaType::Instagram => "Instagram",
            MediaType::TikTok => "TikTok",
            MediaType::YouTube => "YouTube",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MediaType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .into_iter()
            .find(|media| media.label() == s)
            .ok_or_else(|| GenerationError::InvalidInput(format!("unknown media type: {}", s)))
    }
}

/// Background track mixed under the narration by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundMusicOption {
    pub id: &'static str,
    pub name: &'static str,
    pub style_description: &'static str,
    /// Static asset path, empty for "none"
    pub audio_url: &'static str,
}

pub const NO_BACKGROUND_MUSIC: &str = "none";

pub const BACKGROUND_MUSIC_OPTIONS: [BackgroundMusicOption; 6] = [
    BackgroundMusicOption {
        id: NO_BACKGROUND_MUSIC,
        name: "Nenhuma",
        style_description: "Sem música de fundo.",
        audio_url: "",
    },
    BackgroundMusicOption {
        id: "pop-energetic",
        name: "Pop Energético",
        style_description: "Trilha pop com batida animada, ideal para produtos modernos.",
        audio_url: "/music/pop-energetic.mp3",
    },
    BackgroundMusicOption {
        id: "calm-corporate",
        name: "Calma Corporativa",
        style_description: "Música suave e inspiradora para mensagens institucionais.",
        audio_url: "/music/calm-corporate.mp3",
    },
    BackgroundMusicOption {
        id: "epic-dramatic",
        name: "Épico Dramático",
        style_description: "Trilha sonora grandiosa para anúncios de impacto e emoção.",
        audio_url: "/music/epic-dramatic.mp3",
    },
    BackgroundMusicOption {
        id: "jazzy-upbeat",
        name: "Jazz Alegre",
        style_description: "Ritmo descontraído e elegante para culinária e eventos.",
        audio_url: "/music/jazzy-upbeat.mp3",
    },
    BackgroundMusicOption {
        id: "acoustic-folk",
        name: "Folk Acústico",
        style_description: "Música orgânica e autêntica para produtos artesanais e natureza.",
        audio_url: "/music/acoustic-folk.mp3",
    },
];

/// Look up a background track by id
pub fn background_music(id: &str) -> Result<&'static BackgroundMusicOption, GenerationError> {
    BACKGROUND_MUSIC_OPTIONS
        .iter()
        .find(|music| music.id == id)
        .ok_or_else(|| GenerationError::InvalidInput(format!("unknown background music: {}", id)))
}
