use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use voxpromo_generation::{
    voice, ContentGenerator, GeminiClient, GenerationError, MediaType, PcmFormat,
    SpeechSynthesizer, Tone,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(mock_server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key", reqwest::Client::new()).with_base_url(&mock_server.uri())
}

#[tokio::test]
async fn test_generate_ad_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json", "maxOutputTokens": 500 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{
                    "text": "{\"adScript\": \"Pão quentinho!\", \"musicSuggestion\": \"Jazz leve\"}"
                }] }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let content = client(&mock_server)
        .generate("Padaria do bairro", Tone::Fun, MediaType::Radio)
        .await
        .unwrap();

    assert_eq!(content.script_text, "Pão quentinho!");
    assert_eq!(content.music_suggestion_text, "Jazz leve");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Divertido"));
    assert!(prompt.contains("Rádio"));
}

#[tokio::test]
async fn test_generate_reports_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .generate("Padaria", Tone::Epic, MediaType::YouTube)
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::GenerationFailed(_)));
}

#[tokio::test]
async fn test_synthesize_returns_pcm() {
    let mock_server = MockServer::start().await;
    let pcm = vec![0u8, 1, 2, 3, 4, 5, 6, 7];

    Mock::given(method("POST"))
        .and(path(
            "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent",
        ))
        .and(body_partial_json(json!({
            "generationConfig": {
                "speechConfig": { "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } } }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{
                    "inlineData": { "mimeType": "audio/L16;rate=24000", "data": STANDARD.encode(&pcm) }
                }] }
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let audio = client(&mock_server)
        .synthesize("Olá", voice("f2").unwrap())
        .await
        .unwrap();

    assert_eq!(audio.data.as_ref(), pcm.as_slice());
    assert_eq!(audio.format, PcmFormat::default());
    assert!(audio.to_data_url().unwrap().starts_with("data:audio/wav;base64,"));
}

#[tokio::test]
async fn test_synthesize_without_audio() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .synthesize("Olá", voice("m1").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::SynthesisFailed(_)));
}
