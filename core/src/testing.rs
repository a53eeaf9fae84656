//! Scripted completion backend for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::completion::{CompletionError, CompletionRequest, CompletionService, RequestKind};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync>;

/// Replays queued responses per request kind and records every request.
///
/// Queued responses are used first; once a kind's queue is empty its
/// fallback responder (if any) answers.
#[derive(Default)]
pub struct ScriptedService {
    queues: Mutex<HashMap<RequestKind, VecDeque<Result<String, CompletionError>>>>,
    fallbacks: Mutex<HashMap<RequestKind, Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: RequestKind, response: impl Into<String>) {
        self.queue(kind, Ok(response.into()));
    }

    pub fn push_err(&self, kind: RequestKind, error: CompletionError) {
        self.queue(kind, Err(error));
    }

    /// Answers every further `kind` request with `response`.
    pub fn repeat(&self, kind: RequestKind, response: impl Into<String>) {
        let response = response.into();
        self.respond_with(kind, move |_| Ok(response.clone()));
    }

    pub fn respond_with<F>(&self, kind: RequestKind, responder: F)
    where
        F: Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
    {
        self.fallbacks
            .lock()
            .unwrap()
            .insert(kind, Box::new(responder));
    }

    /// Extractor double that answers with the first sentence of its window.
    pub fn echo_first_sentence(&self) {
        self.respond_with(RequestKind::ExtractSentence, |request| {
            Ok(first_sentence(window_of(&request.prompt)).to_string())
        });
    }

    pub fn calls(&self, kind: RequestKind) -> usize {
        self.requests(kind).len()
    }

    pub fn requests(&self, kind: RequestKind) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    fn queue(&self, kind: RequestKind, response: Result<String, CompletionError>) {
        self.queues
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(response);
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(request.clone());

        let queued = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front);
        if let Some(response) = queued {
            return response;
        }

        let fallbacks = self.fallbacks.lock().unwrap();
        match fallbacks.get(&request.kind) {
            Some(responder) => responder(request),
            None => Err(CompletionError::Backend(format!(
                "no scripted response for '{}'",
                request.kind
            ))),
        }
    }
}

/// The text window embedded in an extraction prompt.
pub fn window_of(prompt: &str) -> &str {
    prompt
        .rsplit_once("Text:\n")
        .map_or(prompt, |(_, window)| window.strip_suffix('\n').unwrap_or(window))
}

/// Text up to and including the first `.`, `?` or `!`, trimmed.
pub fn first_sentence(text: &str) -> &str {
    let trimmed = text.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| matches!(c, '.' | '?' | '!'))
        .map_or(trimmed.len(), |(i, c)| i + c.len_utf8());
    trimmed[..end].trim_end()
}
