//! Test doubles shared by the binary's test modules.

use async_trait::async_trait;
use quill_core::{
    error::QuillError,
    traits::{Generation, GenerationRequest, Generator},
};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

type Reply = Result<Generation, String>;

/// Replays canned replies per model and records every request.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn reply(self, model: &str, text: &str) -> Self {
        self.push(
            model,
            Ok(Generation {
                text: text.into(),
                model: model.into(),
                ..Default::default()
            }),
        )
    }

    pub fn fail(self, model: &str, message: &str) -> Self {
        self.push(model, Err(message.into()))
    }

    pub fn push(self, model: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, model: &str) -> Vec<GenerationRequest> {
        self.calls().into_iter().filter(|r| r.model == model).collect()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, QuillError> {
        self.calls.lock().unwrap().push(request.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(generation)) => Ok(generation),
            Some(Err(message)) => Err(QuillError::Provider(message)),
            None => Err(QuillError::Provider(format!(
                "no scripted reply for {}",
                request.model
            ))),
        }
    }
}
