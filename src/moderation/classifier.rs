use crate::core::error::ClassifierError;
use crate::moderation::patterns;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    Whitelisted,
    CriticalPattern,
    ModelFlagged,
    ModelBelowThreshold,
    ModelBenign,
    NoMatch,
}

impl fmt::Display for VerdictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictReason::Whitelisted => "whitelisted",
            VerdictReason::CriticalPattern => "critical_pattern",
            VerdictReason::ModelFlagged => "model_flagged",
            VerdictReason::ModelBelowThreshold => "model_below_threshold",
            VerdictReason::ModelBenign => "model_benign",
            VerdictReason::NoMatch => "no_match",
        };
        f.write_str(s)
    }
}

/// Safety decision for one input string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub safe: bool,
    pub reason: VerdictReason,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Verdict {
    fn safe(reason: VerdictReason, confidence: f32) -> Self {
        Self {
            safe: true,
            reason,
            confidence,
            label: None,
        }
    }

    fn with_label(mut self, label: String) -> Self {
        self.label = Some(label);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub score: f32,
}

impl Prediction {
    pub fn is_benign(&self) -> bool {
        self.label.eq_ignore_ascii_case("benign")
    }
}

/// Optional model-backed scoring tier
#[async_trait]
pub trait ProbabilisticClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Checked before every call; an unready model is skipped, never awaited
    fn is_ready(&self) -> bool;

    async fn predict(&self, text: &str) -> Result<Prediction, ClassifierError>;

    /// Probe the backend and update readiness
    async fn warm_up(&self) -> bool {
        self.is_ready()
    }
}

/// Regex tiers only
#[derive(Debug, Default)]
pub struct NoopClassifier;

#[async_trait]
impl ProbabilisticClassifier for NoopClassifier {
    fn name(&self) -> &str {
        "noop"
    }

    fn is_ready(&self) -> bool {
        false
    }

    async fn predict(&self, _text: &str) -> Result<Prediction, ClassifierError> {
        Err(ClassifierError::NotReady)
    }
}

/// Text-classification inference endpoint (`{"inputs": text}` in,
/// label/score pairs out)
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    token: Option<String>,
    ready: AtomicBool,
}

impl HttpClassifier {
    pub fn new(endpoint: String, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
            ready: AtomicBool::new(false),
        })
    }

    async fn request(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let mut request = self.client.post(&self.endpoint).json(&json!({ "inputs": text }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ClassifierError::Request(format!(
                "status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClassifierError::Request(e.to_string()))?;
        top_prediction(&body).ok_or(ClassifierError::NoPrediction)
    }
}

/// Accepts both `[{..}]` and the batched `[[{..}]]` shapes
fn top_prediction(body: &Value) -> Option<Prediction> {
    let candidates = match body.as_array()?.first()? {
        Value::Array(inner) => inner.clone(),
        _ => body.as_array()?.clone(),
    };

    candidates
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Prediction>(v).ok())
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

#[async_trait]
impl ProbabilisticClassifier for HttpClassifier {
    fn name(&self) -> &str {
        "http"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn predict(&self, text: &str) -> Result<Prediction, ClassifierError> {
        self.request(text).await
    }

    async fn warm_up(&self) -> bool {
        let ok = match self.request("hello").await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("[HttpClassifier] Warm-up failed, model tier disabled: {}", e);
                false
            }
        };
        if ok && !self.ready.swap(true, Ordering::SeqCst) {
            tracing::info!("[HttpClassifier] Model tier ready at {}", self.endpoint);
        }
        if !ok {
            self.ready.store(false, Ordering::SeqCst);
        }
        ok
    }
}

/// Tiered verdict engine: whitelist, critical patterns, then the model
pub struct ContentClassifier {
    model: Arc<dyn ProbabilisticClassifier>,
    threshold: f32,
    degraded: AtomicBool,
}

impl ContentClassifier {
    pub fn new(model: Arc<dyn ProbabilisticClassifier>, threshold: f32) -> Self {
        Self {
            model,
            threshold,
            degraded: AtomicBool::new(false),
        }
    }

    pub fn regex_only() -> Self {
        Self::new(Arc::new(NoopClassifier), 0.85)
    }

    pub fn model_ready(&self) -> bool {
        self.model.is_ready()
    }

    /// Re-probe the model tier if it is not ready yet
    pub async fn ensure_ready(&self) -> bool {
        if self.model.is_ready() {
            return true;
        }
        self.model.warm_up().await
    }

    pub async fn classify(&self, text: &str) -> Verdict {
        if patterns::is_whitelisted(text) {
            return Verdict::safe(VerdictReason::Whitelisted, 1.0);
        }

        if patterns::is_critical(text) {
            return Verdict {
                safe: false,
                reason: VerdictReason::CriticalPattern,
                confidence: 1.0,
                label: None,
            };
        }

        if !self.model.is_ready() {
            return Verdict::safe(VerdictReason::NoMatch, 0.0);
        }

        match self.model.predict(text).await {
            Ok(prediction) => {
                if self.degraded.swap(false, Ordering::SeqCst) {
                    tracing::info!("[ContentClassifier] Model tier '{}' recovered", self.model.name());
                }
                self.judge(prediction)
            }
            Err(e) => {
                if !self.degraded.swap(true, Ordering::SeqCst) {
                    tracing::warn!(
                        "[ContentClassifier] Model tier '{}' failed, falling back to patterns: {}",
                        self.model.name(),
                        e
                    );
                }
                Verdict::safe(VerdictReason::NoMatch, 0.0)
            }
        }
    }

    fn judge(&self, prediction: Prediction) -> Verdict {
        if prediction.is_benign() {
            return Verdict::safe(VerdictReason::ModelBenign, prediction.score)
                .with_label(prediction.label);
        }
        if prediction.score > self.threshold {
            Verdict {
                safe: false,
                reason: VerdictReason::ModelFlagged,
                confidence: prediction.score,
                label: Some(prediction.label),
            }
        } else {
            Verdict::safe(VerdictReason::ModelBelowThreshold, prediction.score)
                .with_label(prediction.label)
        }
    }
}
