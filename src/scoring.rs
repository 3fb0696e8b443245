//! Review scoring through an external text-rating model.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::config::ScorerConfig;
use crate::error::{HarvestError, Result};

/// Boilerplate injected into review bodies that embed a video
const MEDIA_ARTIFACT: &str = "The media could not be loaded.";

/// Model output for one text
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Score {
    pub prediction: f64,
    #[serde(default)]
    pub flags: serde_json::Value,
}

/// A text-rating model. Calls may fail; callers skip the affected text.
pub trait Scorer {
    fn score(&self, text: &str) -> impl Future<Output = Result<Score>>;
}

/// Strip page artifacts from a review body before scoring
pub fn sanitize(text: &str) -> String {
    text.replace(MEDIA_ARTIFACT, "").trim().to_string()
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    text: &'a str,
}

/// Scorer backed by a JSON-over-HTTP model service.
///
/// POSTs `{"text": ...}` and expects `{"prediction": <number>, "flags": ...}`.
pub struct HttpScorer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpScorer {
    pub fn new(config: &ScorerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HarvestError::Scoring(format!("failed to build client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

impl Scorer for HttpScorer {
    fn score(&self, text: &str) -> impl Future<Output = Result<Score>> {
        async move {
            let body = self
                .client
                .post(&self.endpoint)
                .json(&ScoreRequest { text })
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| HarvestError::Scoring(e.to_string()))?
                .text()
                .await
                .map_err(|e| HarvestError::Scoring(e.to_string()))?;

            parse_score(&body)
        }
    }
}

/// Decode and validate a scoring service response body
fn parse_score(body: &str) -> Result<Score> {
    let score: Score = serde_json::from_str(body)
        .map_err(|e| HarvestError::Scoring(format!("malformed response: {}", e)))?;
    validate(score)
}

/// Reject predictions that cannot be stored as a rating
fn validate(score: Score) -> Result<Score> {
    if !score.prediction.is_finite() {
        return Err(HarvestError::Scoring(format!(
            "non-finite prediction {}",
            score.prediction
        )));
    }
    Ok(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_media_artifact() {
        let raw = "                    The media could not be loaded.\n                Sturdy and cheap.  ";
        assert_eq!(sanitize(raw), "Sturdy and cheap.");
    }

    #[test]
    fn test_sanitize_plain_text() {
        assert_eq!(sanitize("  Love it \n"), "Love it");
        assert_eq!(sanitize("   "), "");
    }

    #[test]
    fn test_score_flags_optional() {
        let score: Score = serde_json::from_str(r#"{"prediction": 0.75}"#).unwrap();
        assert_eq!(score.prediction, 0.75);
        assert!(score.flags.is_null());

        let score: Score =
            serde_json::from_str(r#"{"prediction": 2.0, "flags": ["sarcasm"]}"#).unwrap();
        assert_eq!(score.flags, serde_json::json!(["sarcasm"]));
    }

    #[test]
    fn test_parse_score_rejects_invalid_output() {
        for body in [
            r#"{"prediction": NaN}"#,
            r#"{"flags": []}"#,
            r#"{"prediction": "high"}"#,
            "<html>502 Bad Gateway</html>",
            "",
        ] {
            let err = parse_score(body).unwrap_err();
            assert!(matches!(err, HarvestError::Scoring(_)), "{:?} -> {:?}", body, err);
        }

        assert_eq!(parse_score(r#"{"prediction": 3.5}"#).unwrap().prediction, 3.5);
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        for prediction in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let score = Score {
                prediction,
                flags: serde_json::Value::Null,
            };
            assert!(matches!(validate(score), Err(HarvestError::Scoring(_))));
        }
    }

    /// Serve a single canned HTTP response and return the endpoint URL
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            // Request body is a JSON object, so it ends with '}'
            while !request.ends_with(b"}") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });
        format!("http://{}/rate", addr)
    }

    fn scorer_for(endpoint: String) -> HttpScorer {
        HttpScorer::new(&ScorerConfig {
            endpoint,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_scorer_success() {
        let endpoint = serve_once("200 OK", r#"{"prediction": 4.25, "flags": ["sarcasm"]}"#).await;
        let score = scorer_for(endpoint).score("Great value").await.unwrap();
        assert_eq!(score.prediction, 4.25);
    }

    #[tokio::test]
    async fn test_http_scorer_error_status() {
        let endpoint = serve_once("500 Internal Server Error", r#"{"detail": "boom"}"#).await;
        let err = scorer_for(endpoint).score("Great value").await.unwrap_err();
        assert!(matches!(err, HarvestError::Scoring(ref m) if m.contains("500")), "{:?}", err);
    }

    #[tokio::test]
    async fn test_http_scorer_malformed_body() {
        let endpoint = serve_once("200 OK", r#"{"score": 4}"#).await;
        let err = scorer_for(endpoint).score("Great value").await.unwrap_err();
        assert!(matches!(err, HarvestError::Scoring(ref m) if m.contains("malformed")));
    }

    #[test]
    fn test_http_scorer_builds_from_config() {
        let scorer = HttpScorer::new(&ScorerConfig::default()).unwrap();
        assert_eq!(scorer.endpoint, "http://127.0.0.1:50051/rate");
    }
}
