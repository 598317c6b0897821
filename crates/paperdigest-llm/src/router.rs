//! LLM router: selects backend and model per pipeline stage.
//!
//! Each stage is configured with its own model identifier; all stages may share
//! one backend. Stages receive a [`ModelHandle`] and never see the router.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{LlmBackend, LlmError, LlmRequest};

/// Pipeline stages that call a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Filter,
    Institution,
    Note,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Filter      => "filter",
            Stage::Institution => "institution",
            Stage::Note        => "note",
        }
    }
}

/// A backend bound to a model name.
#[derive(Clone)]
pub struct ModelHandle {
    backend: Arc<dyn LlmBackend>,
    model: String,
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.backend.model_id())
            .field("model", &self.model)
            .finish()
    }
}

impl ModelHandle {
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>) -> Self {
        Self { backend, model: model.into() }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn completion; returns the trimmed reply text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
        extra_body: Option<serde_json::Value>,
    ) -> Result<String, LlmError> {
        let mut req = LlmRequest::chat(system, user);
        req.model = Some(self.model.clone());
        req.max_tokens = Some(max_tokens);
        req.temperature = Some(temperature);
        req.extra_body = extra_body;

        let t0 = Instant::now();
        let resp = self.backend.complete(req).await?;
        tracing::debug!(
            model = %resp.model,
            prompt_tokens = resp.prompt_tokens,
            completion_tokens = resp.completion_tokens,
            latency_ms = t0.elapsed().as_millis() as u64,
            "LLM call complete"
        );
        Ok(resp.content)
    }
}

/// Routes each stage to a (backend, model) pair.
pub struct StageRouter {
    backends: HashMap<String, Arc<dyn LlmBackend>>,
    routes: HashMap<Stage, (String, String)>,
}

impl StageRouter {
    pub fn new() -> Self {
        Self { backends: HashMap::new(), routes: HashMap::new() }
    }

    pub fn register_backend(&mut self, name: impl Into<String>, backend: Arc<dyn LlmBackend>) {
        self.backends.insert(name.into(), backend);
    }

    /// Route `stage` to `model` on the backend registered as `backend`.
    pub fn route(&mut self, stage: Stage, backend: impl Into<String>, model: impl Into<String>) {
        self.routes.insert(stage, (backend.into(), model.into()));
    }

    pub fn registered_backends(&self) -> Vec<&str> {
        self.backends.keys().map(|k| k.as_str()).collect()
    }

    pub fn handle(&self, stage: Stage) -> Result<ModelHandle, LlmError> {
        let (backend_name, model) = self.routes.get(&stage).ok_or_else(|| {
            LlmError::Unavailable(format!("no model configured for stage '{}'", stage.as_str()))
        })?;
        let backend = self.backends.get(backend_name).ok_or_else(|| {
            LlmError::Unavailable(format!("backend '{}' is not registered", backend_name))
        })?;

        tracing::info!(
            stage = stage.as_str(),
            backend = %backend_name,
            model = %model,
            is_local = backend.is_local(),
            "LLM stage routed"
        );
        Ok(ModelHandle::new(backend.clone(), model.clone()))
    }
}

impl Default for StageRouter {
    fn default() -> Self {
        Self::new()
    }
}
