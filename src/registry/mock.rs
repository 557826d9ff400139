//! Scripted in-memory registry for tests and local dry runs.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};

use super::client::RegistryClient;
use super::error::TransportError;
use super::wire::{EncounterRequest, EncounterResult, Information, RegistryResponse};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(RegistryResponse),
    Fail(TransportError),
}

type Responder = Box<dyn Fn(&EncounterRequest) -> MockReply + Send + Sync>;

/// Registry double: answers from a FIFO script, then from a responder.
///
/// Calls are recorded in order. A call can be held in flight until the test
/// releases it, which is how pause-between-batches is exercised.
pub struct MockRegistryClient {
    script: Mutex<VecDeque<MockReply>>,
    responder: Responder,
    calls: Mutex<Vec<EncounterRequest>>,
    gates: Mutex<HashMap<usize, oneshot::Receiver<()>>>,
}

impl Default for MockRegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistryClient {
    /// Every encounter recorded successfully.
    pub fn new() -> Self {
        Self::with_responder(|req| MockReply::Respond(all_recorded(req)))
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&EncounterRequest) -> MockReply + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Queue a reply for the next unscripted call.
    pub async fn push(&self, reply: MockReply) {
        self.script.lock().await.push_back(reply);
    }

    /// Hold the `call_number`-th call (1-based) until the returned sender
    /// fires or is dropped.
    pub async fn hold_call(&self, call_number: usize) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(call_number, rx);
        tx
    }

    pub async fn calls(&self) -> Vec<EncounterRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl RegistryClient for MockRegistryClient {
    async fn record_encounter(
        &self,
        request: &EncounterRequest,
    ) -> Result<RegistryResponse, TransportError> {
        let call_number = {
            let mut calls = self.calls.lock().await;
            calls.push(request.clone());
            calls.len()
        };

        let gate = self.gates.lock().await.remove(&call_number);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let scripted = self.script.lock().await.pop_front();
        match scripted.unwrap_or_else(|| (self.responder)(request)) {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(error) => Err(error),
        }
    }
}

/// Top-level informational response with one `AIR-I-1000` line per encounter.
pub fn all_recorded(request: &EncounterRequest) -> RegistryResponse {
    RegistryResponse {
        status_code: "AIR-I-1007".into(),
        message: "All encounter(s) processed successfully.".into(),
        claim_details: None,
        encounters: request
            .encounters
            .iter()
            .map(|e| EncounterResult {
                id: e.id,
                claim_sequence_number: None,
                information: Some(Information {
                    status: Some("SUCCESS".into()),
                    code: "AIR-I-1000".into(),
                    text: "Encounter was recorded.".into(),
                }),
                episodes: Vec::new(),
            })
            .collect(),
    }
}
