//! Gemini HTTP client for script generation and text-to-speech

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::{
    AdContent, ContentGenerator, GenerationError, MediaType, PcmAudio, Result, SpeechSynthesizer,
    Tone, VoiceOption,
};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const SCRIPT_MODEL: &str = "gemini-2.5-flash";
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

const SYSTEM_INSTRUCTION: &str = "Você é um especialista em marketing e um criador de conteúdo para propagandas. \
Sua tarefa é gerar um roteiro de propaganda (adScript) e uma sugestão de trilha sonora (musicSuggestion) para um anúncio. \
O adScript deve ser conciso, criativo e adequado para o tipo de mídia e tom especificados. \
A musicSuggestion deve descrever o estilo musical, instrumentos, ritmo e emoção desejados para acompanhar o adScript. \
Responda apenas com um objeto JSON no formato: { \"adScript\": \"...\", \"musicSuggestion\": \"...\" }.";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
struct InlineData {
    data: String,
}

impl GenerateResponse {
    fn first_part(self) -> Option<Part> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()
    }
}

/// Gemini クライアント
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    script_model: String,
    speech_model: String,
    http_client: Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: GEMINI_API_URL.to_string(),
            api_key: api_key.to_string(),
            script_model: SCRIPT_MODEL.to_string(),
            speech_model: SPEECH_MODEL.to_string(),
            http_client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_script_model(mut self, model: &str) -> Self {
        self.script_model = model.to_string();
        self
    }

    pub fn with_speech_model(mut self, model: &str) -> Self {
        self.speech_model = model.to_string();
        self
    }

    async fn generate_content(&self, model: &str, body: Value) -> Result<GenerateResponse> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| GenerationError::UrlError(url::ParseError::EmptyHost))?
            .pop_if_empty()
            .push("v1beta")
            .push("models")
            .push(&format!("{}:generateContent", model));

        log::debug!("Calling {} model {}", url, model);
        let response = self
            .http_client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            log::error!("Model {} answered {}: {}", model, status, error_text);
            return Err(GenerationError::GenerationFailed(format!(
                "{}: {}",
                status, error_text
            )));
        }

        Ok(response.json::<GenerateResponse>().await?)
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, tone: Tone, media_type: MediaType) -> Result<AdContent> {
        let full_prompt = format!(
            "Crie uma propaganda com o seguinte tema e características:\nTema: \"{}\"\nTom: \"{}\"\nMídia-alvo: \"{}\"",
            prompt, tone, media_type
        );
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "parts": [{ "text": full_prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "adScript": {
                            "type": "STRING",
                            "description": "O roteiro narrativo ou cantado da propaganda."
                        },
                        "musicSuggestion": {
                            "type": "STRING",
                            "description": "Uma descrição da trilha sonora ou jingle sugerido para a propaganda."
                        }
                    },
                    "propertyOrdering": ["adScript", "musicSuggestion"]
                },
                "maxOutputTokens": 500,
                "thinkingConfig": { "thinkingBudget": 100 }
            }
        });

        let text = self
            .generate_content(&self.script_model, body)
            .await?
            .first_part()
            .and_then(|part| part.text)
            .ok_or_else(|| GenerationError::GenerationFailed("empty response".to_string()))?;

        serde_json::from_str::<AdContent>(text.trim()).map_err(|e| {
            log::error!("Unparseable ad content: {}", text);
            GenerationError::GenerationFailed(format!("malformed ad content: {}", e))
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GeminiClient {
    async fn synthesize(&self, text: &str, voice: &VoiceOption) -> Result<PcmAudio> {
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": voice.voice_name }
                    }
                }
            }
        });

        let encoded = match self.generate_content(&self.speech_model, body).await {
            Ok(response) => response
                .first_part()
                .and_then(|part| part.inline_data)
                .map(|inline| inline.data)
                .ok_or_else(|| {
                    GenerationError::SynthesisFailed("no audio data received".to_string())
                })?,
            Err(GenerationError::GenerationFailed(msg)) => {
                return Err(GenerationError::SynthesisFailed(msg))
            }
            Err(e) => return Err(e),
        };

        let pcm = STANDARD.decode(encoded.trim())?;
        log::debug!("Synthesized {} bytes of PCM with voice {}", pcm.len(), voice.id);
        Ok(PcmAudio::new(pcm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_part_of_empty_response() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.first_part().is_none());

        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "hi" }] } }]
        }))
        .unwrap();
        assert_eq!(response.first_part().and_then(|p| p.text), Some("hi".to_string()));
    }
}
