//! Shared test doubles for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use streamchat_core::backend::{ChatBackend, ChatError, ModelInfo, RawFragmentStream};
use streamchat_core::{BackendKind, ModelDescriptor, Transcript};

/// Backend that replays a fixed list of fragments
#[derive(Clone)]
pub struct ScriptedBackend {
    kind: BackendKind,
    script: Vec<Result<String, ChatError>>,
    hang_after_script: bool,
    models: Vec<String>,
    requests: Arc<Mutex<Vec<(Transcript, ModelDescriptor)>>>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(fragments.into_iter().map(|f| Ok(f.into())).collect())
    }

    pub fn with_results(script: Vec<Result<String, ChatError>>) -> Self {
        Self {
            kind: BackendKind::Ollama,
            script,
            hang_after_script: false,
            models: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: ChatError) -> Self {
        Self::with_results(vec![Err(error)])
    }

    /// Never end the stream after the script runs out
    pub fn then_hang(mut self) -> Self {
        self.hang_after_script = true;
        self
    }

    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = models.iter().map(|m| (*m).to_string()).collect();
        self
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<(Transcript, ModelDescriptor)> {
        self.requests.lock().clone()
    }

    /// How many scripted items the consumer has pulled
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn chat_url(&self) -> String {
        "scripted://chat".to_string()
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn stream_chat(&self, transcript: &Transcript, model: &ModelDescriptor) -> RawFragmentStream {
        self.requests
            .lock()
            .push((transcript.clone(), model.clone()));

        let pulled = Arc::clone(&self.pulled);
        let scripted = stream::iter(self.script.clone()).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        if self.hang_after_script {
            scripted.chain(stream::pending()).boxed()
        } else {
            scripted.boxed()
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ChatError> {
        Ok(self
            .models
            .iter()
            .map(|name| ModelInfo {
                name: name.clone(),
                size: None,
                parameters: None,
            })
            .collect())
    }
}

/// Descriptor for a model on the scripted backend
pub fn model(name: &str) -> ModelDescriptor {
    ModelDescriptor::new(name, BackendKind::Ollama)
}

/// An address nothing is listening on
pub fn refused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
