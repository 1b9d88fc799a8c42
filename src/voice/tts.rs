//! Text-to-speech (TTS) processing

use std::time::Duration;

use secrecy::ExposeSecret;

use crate::config::{TtsConfig, TtsProviderKind};
use crate::{Error, Result};

/// Longest text the Google voice accepts per request
const GOOGLE_MAX_CHARS: usize = 100;

const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    lang: String,
    speed: f32,
    model: String,
    provider: TtsProviderKind,
}

impl TextToSpeech {
    /// Create a keyless TTS instance using the Google Translate voice
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_google(lang: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key: String::new(),
            voice: String::new(),
            lang,
            speed: 1.0,
            model: String::new(),
            provider: TtsProviderKind::Google,
        })
    }

    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai_with_model(
        api_key: String,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: http_client()?,
            api_key,
            voice,
            lang: String::new(),
            speed,
            model,
            provider: TtsProviderKind::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs_with_model(
        api_key: String,
        voice_id: String,
        model: String,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: http_client()?,
            api_key,
            voice: voice_id,
            lang: String::new(),
            speed: 1.0,
            model,
            provider: TtsProviderKind::ElevenLabs,
        })
    }

    /// Create the TTS instance selected by the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the provider needs an API key and none is set
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().to_string())
            .unwrap_or_default();

        match config.provider {
            TtsProviderKind::Google => Self::new_google(config.lang.clone()),
            TtsProviderKind::OpenAI => Self::new_openai_with_model(
                api_key,
                config.voice.clone(),
                config.speed,
                config.model.clone(),
            ),
            TtsProviderKind::ElevenLabs => Self::new_elevenlabs_with_model(
                api_key,
                config.voice.clone(),
                config.model.clone(),
            ),
        }
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        match self.provider {
            TtsProviderKind::Google => self.synthesize_google(text).await,
            TtsProviderKind::OpenAI => self.synthesize_openai(text).await,
            TtsProviderKind::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    /// Synthesize with the Google Translate voice, one request per chunk
    async fn synthesize_google(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_for_google(text, GOOGLE_MAX_CHARS);
        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();

            let request = self
                .client
                .get(GOOGLE_TTS_URL)
                .header("User-Agent", "Mozilla/5.0")
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.lang.as_str()),
                    ("q", chunk.as_str()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ]);
            audio.extend(fetch_audio(request, "Google").await?);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "google TTS complete");
        Ok(audio)
    }

    /// `POST /v1/audio/speech`
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "speed": self.speed,
        });

        let request = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&body);
        fetch_audio(request, "OpenAI").await
    }

    /// `POST /v1/text-to-speech/{voice_id}`
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model,
        });

        let request = self
            .client
            .post(format!(
                "https://api.elevenlabs.io/v1/text-to-speech/{}",
                self.voice
            ))
            .header("xi-api-key", &self.api_key)
            .json(&body);
        fetch_audio(request, "ElevenLabs").await
    }
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

/// Send a TTS request and return the audio body
async fn fetch_audio(request: reqwest::RequestBuilder, provider: &str) -> Result<Vec<u8>> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Tts(format!("{provider} TTS error {status}: {body}")));
    }

    Ok(response.bytes().await?.to_vec())
}

/// Split text into chunks of at most `max_chars` characters on word boundaries
///
/// Words longer than `max_chars` are cut.
fn split_for_google(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();

        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let head: String = word.chars().take(max_chars).collect();
            word = word.chars().skip(max_chars).collect();
            chunks.push(head);
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
