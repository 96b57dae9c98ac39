//! Azure Cognitive Services text-to-speech backend
//!
//! - Endpoint: `POST https://{region}.tts.speech.microsoft.com/cognitiveservices/v1`
//! - Headers: `Ocp-Apim-Subscription-Key`, `Content-Type: application/ssml+xml`,
//!   `X-Microsoft-OutputFormat`
//! - Body: SSML selecting the voice; the response body is the audio stream.

use futures::TryStreamExt;
use std::io;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::debug;

use super::provider::{AudioReader, OutputFormat, SpeakTask, SpeechBackend, SpeechConfig, Synthesizer};
use crate::error::{Error, Result};

pub const AZURE_OUTPUT_FORMAT_HEADER: &str = "X-Microsoft-OutputFormat";
pub const AZURE_SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

const USER_AGENT: &str = concat!("speechcast/", env!("CARGO_PKG_VERSION"));
const DEFAULT_LOCALE: &str = "en-US";

/// Azure Speech REST backend
#[derive(Clone)]
pub struct AzureBackend {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl AzureBackend {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: None,
        }
    }

    /// Send every request to `url` instead of the regional endpoint
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    fn endpoint_for(&self, region: &str) -> Result<String> {
        if let Some(url) = &self.endpoint {
            return Ok(url.clone());
        }
        if !region.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::ConfigError(format!("invalid speech region: {}", region)));
        }
        Ok(format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            region.to_ascii_lowercase()
        ))
    }
}

impl SpeechBackend for AzureBackend {
    fn name(&self) -> &str {
        "azure"
    }

    fn synthesizer(&self, config: &SpeechConfig) -> Result<Box<dyn Synthesizer>> {
        let voice = config
            .voice_name()
            .ok_or_else(|| Error::ConfigError("voice name is not set".to_string()))?;

        Ok(Box::new(AzureSynthesizer {
            client: self.client.clone(),
            url: self.endpoint_for(config.region())?,
            subscription_key: config.subscription_key().to_string(),
            voice: voice.to_string(),
            format: config.output_format(),
        }))
    }
}

struct AzureSynthesizer {
    client: reqwest::Client,
    url: String,
    subscription_key: String,
    voice: String,
    format: OutputFormat,
}

impl Synthesizer for AzureSynthesizer {
    fn start_speaking(&mut self, text: &str) -> SpeakTask {
        let request = self
            .client
            .post(&self.url)
            .header(AZURE_SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .header(reqwest::header::CONTENT_TYPE, "application/ssml+xml")
            .header(AZURE_OUTPUT_FORMAT_HEADER, self.format.as_str())
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .body(build_ssml(&self.voice, text));
        let voice = self.voice.clone();

        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|e| Error::ProviderError(format!("Azure TTS request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(Error::ProviderError(format!(
                    "Azure TTS API error ({}): {}",
                    status, body
                )));
            }

            debug!("Azure synthesis started for voice {}", voice);
            let body = response
                .bytes_stream()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e));
            Ok(Box::pin(StreamReader::new(body)) as AudioReader)
        })
    }
}

/// Wrap `text` in an SSML document for `voice`.
pub fn build_ssml(voice: &str, text: &str) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        locale_of(voice),
        escape_xml(voice),
        escape_xml(text)
    )
}

/// Locale prefix of a voice name, e.g. `en-US` for `en-US-JennyNeural`.
fn locale_of(voice: &str) -> &str {
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(_)) if !lang.is_empty() && !region.is_empty() => {
            &voice[..lang.len() + 1 + region.len()]
        }
        _ => DEFAULT_LOCALE,
    }
}

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(voice: &str) -> SpeechConfig {
        let mut config = SpeechConfig::from_subscription("test-key", "westus").unwrap();
        config.set_voice_name(voice).unwrap();
        config
    }

    #[test]
    fn test_ssml_escapes_text_and_sets_locale() {
        let ssml = build_ssml("zh-CN-XiaoyouNeural", "a < b & 'c'");
        assert!(ssml.contains("xml:lang='zh-CN'"));
        assert!(ssml.contains("<voice name='zh-CN-XiaoyouNeural'>"));
        assert!(ssml.contains("a &lt; b &amp; &apos;c&apos;"));
    }

    #[test]
    fn test_locale_fallback() {
        assert_eq!(locale_of("en-US-JennyNeural"), "en-US");
        assert_eq!(locale_of("narrator"), "en-US");
        assert_eq!(locale_of("-x-y"), "en-US");
    }

    #[test]
    fn test_regional_endpoint() {
        let backend = AzureBackend::new().unwrap();
        assert_eq!(
            backend.endpoint_for("WestUS").unwrap(),
            "https://westus.tts.speech.microsoft.com/cognitiveservices/v1"
        );
        assert!(backend.endpoint_for("evil.example.com/").is_err());
    }

    #[test]
    fn test_synthesizer_requires_voice() {
        let backend = AzureBackend::new().unwrap();
        let config = SpeechConfig::from_subscription("key", "westus").unwrap();
        assert!(matches!(
            backend.synthesizer(&config),
            Err(Error::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_streams_response_body() {
        let server = MockServer::start().await;
        let audio: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();
        Mock::given(method("POST"))
            .and(path("/cognitiveservices/v1"))
            .and(header(AZURE_SUBSCRIPTION_KEY_HEADER, "test-key"))
            .and(header(AZURE_OUTPUT_FORMAT_HEADER, "raw-16khz-16bit-mono-pcm"))
            .and(header("content-type", "application/ssml+xml"))
            .and(body_string_contains("en-US-JennyNeural"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let backend = AzureBackend::new()
            .unwrap()
            .with_endpoint(format!("{}/cognitiveservices/v1", server.uri()));
        let mut synthesizer = backend.synthesizer(&config("en-US-JennyNeural")).unwrap();
        let mut reader = synthesizer.start_speaking("hello").await.unwrap();

        let mut received = Vec::new();
        reader.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, audio);
    }

    #[tokio::test]
    async fn test_error_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid subscription"))
            .mount(&server)
            .await;

        let backend = AzureBackend::new().unwrap().with_endpoint(server.uri());
        let mut synthesizer = backend.synthesizer(&config("en-US-JennyNeural")).unwrap();
        let err = synthesizer.start_speaking("hello").await.err().unwrap();

        match err {
            Error::ProviderError(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid subscription"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
