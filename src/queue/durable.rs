//! Durable queue over an SQS-protocol message service.
//!
//! A background poller long-polls the service and feeds a bounded channel;
//! `get` reads that channel. Messages stay invisible for three hours after
//! delivery, long enough for the writer to commit before redelivery.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::error_chain;
use crate::types::ModuleWork;
use crate::utils::config::{PipelineConsts, QueueConsts};
use crate::utils::sleep_with_cancel;

use super::{QueueError, WorkQueue};

#[derive(Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "Body")]
    body: String,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
}

#[derive(Deserialize, Default)]
struct ReceiveResponse {
    #[serde(rename = "Messages", default)]
    messages: Vec<ReceivedMessage>,
}

#[derive(Deserialize, Default)]
struct AttributesResponse {
    #[serde(rename = "Attributes", default)]
    attributes: std::collections::HashMap<String, String>,
}

const DEPTH_ATTRIBUTES: [&str; 3] = [
    "ApproximateNumberOfMessages",
    "ApproximateNumberOfMessagesDelayed",
    "ApproximateNumberOfMessagesNotVisible",
];

/// Low-level SQS-protocol calls. Request signing is delegated to the
/// environment; the endpoint is taken verbatim from configuration.
#[derive(Clone)]
struct SqsApi {
    client: Client,
    endpoint: String,
    queue_url: String,
}

impl SqsApi {
    fn call(
        &self,
        action: &'static str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, QueueError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-amz-target", format!("AmazonSQS.{action}"))
            .header("content-type", "application/x-amz-json-1.0")
            .body(body.to_string())
            .send()
            .map_err(|source| QueueError::Request { action, source })?;
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|source| QueueError::Request { action, source })?;
        if !status.is_success() {
            return Err(QueueError::Api {
                action,
                status: status.as_u16(),
                message: text,
            });
        }
        if text.is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&text).map_err(|source| QueueError::Decode { action, source })
    }

    fn send_message(&self, body: &str) -> Result<(), QueueError> {
        self.call(
            "SendMessage",
            json!({"QueueUrl": self.queue_url, "MessageBody": body}),
        )?;
        Ok(())
    }

    fn receive_messages(&self) -> Result<Vec<ReceivedMessage>, QueueError> {
        let raw = self.call(
            "ReceiveMessage",
            json!({
                "QueueUrl": self.queue_url,
                "MaxNumberOfMessages": QueueConsts::RECEIVE_BATCH,
                "VisibilityTimeout": QueueConsts::VISIBILITY_TIMEOUT_SECS,
                "WaitTimeSeconds": QueueConsts::WAIT_TIME_SECS,
            }),
        )?;
        let parsed: ReceiveResponse = serde_json::from_value(raw).map_err(|source| {
            QueueError::Decode {
                action: "ReceiveMessage",
                source,
            }
        })?;
        Ok(parsed.messages)
    }

    fn delete_message(&self, receipt: &str) -> Result<(), QueueError> {
        self.call(
            "DeleteMessage",
            json!({"QueueUrl": self.queue_url, "ReceiptHandle": receipt}),
        )?;
        Ok(())
    }

    fn queue_depth(&self) -> Result<u64, QueueError> {
        let raw = self.call(
            "GetQueueAttributes",
            json!({"QueueUrl": self.queue_url, "AttributeNames": DEPTH_ATTRIBUTES}),
        )?;
        let parsed: AttributesResponse = serde_json::from_value(raw).map_err(|source| {
            QueueError::Decode {
                action: "GetQueueAttributes",
                source,
            }
        })?;
        Ok(DEPTH_ATTRIBUTES
            .iter()
            .filter_map(|name| parsed.attributes.get(*name))
            .filter_map(|value| value.parse::<u64>().ok())
            .sum())
    }
}

/// Durable queue handle, shared behind an `Arc` by the stages. The poller
/// thread is detached: it observes the cancel flag on its own and may still
/// be inside a long poll when the process exits.
pub struct SqsQueue {
    api: SqsApi,
    rx: Receiver<ModuleWork>,
    cancel: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl SqsQueue {
    /// Connect to the queue service and start the long-poll loop.
    pub fn connect(endpoint: String, queue_url: String, cancel: Arc<AtomicBool>) -> Self {
        let api = SqsApi {
            client: Client::new(),
            endpoint,
            queue_url,
        };
        let (tx, rx) = bounded::<ModuleWork>(QueueConsts::BUFFER);
        thread::spawn({
            let api = api.clone();
            let cancel = Arc::clone(&cancel);
            move || poll_loop(api, tx, cancel)
        });
        SqsQueue {
            api,
            rx,
            cancel,
            closed: AtomicBool::new(false),
        }
    }
}

/// Perpetually long-poll the service, decode bodies, attach receipts, and
/// push onto the bounded channel. Receive failures are logged and retried
/// after a back-off; a full channel blocks the poller, not the service.
fn poll_loop(api: SqsApi, tx: Sender<ModuleWork>, cancel: Arc<AtomicBool>) {
    let send_tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
    while !cancel.load(Ordering::Relaxed) {
        let messages = match api.receive_messages() {
            Ok(messages) => messages,
            Err(err) => {
                warn!("queue receive failed: {}", error_chain(&err));
                sleep_with_cancel(
                    Duration::from_secs(QueueConsts::RECEIVE_BACKOFF_SECS),
                    &cancel,
                );
                continue;
            }
        };
        for message in messages {
            let mut work: ModuleWork = match serde_json::from_str(&message.body) {
                Ok(work) => work,
                Err(err) => {
                    warn!("skipping undecodable queue message: {}", err);
                    continue;
                }
            };
            work.receipt = Some(message.receipt_handle);
            let mut pending = work;
            loop {
                match tx.send_timeout(pending, send_tick) {
                    Ok(()) => break,
                    Err(crossbeam_channel::SendTimeoutError::Timeout(back)) => {
                        if cancel.load(Ordering::Relaxed) {
                            return;
                        }
                        pending = back;
                    }
                    Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => return,
                }
            }
        }
    }
    debug!("queue poller exiting");
}

impl WorkQueue for SqsQueue {
    fn put(&self, work: &ModuleWork) -> Result<(), QueueError> {
        let body = serde_json::to_string(work).map_err(QueueError::Encode)?;
        self.api.send_message(&body)
    }

    fn get(&self) -> Result<Option<ModuleWork>, QueueError> {
        let tick = Duration::from_millis(PipelineConsts::CANCEL_POLL_MS);
        loop {
            match self.rx.recv_timeout(tick) {
                Ok(work) => return Ok(Some(work)),
                Err(RecvTimeoutError::Timeout) => {
                    if self.cancel.load(Ordering::Relaxed) {
                        return Ok(None);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.closed.store(true, Ordering::Relaxed);
                    return Ok(None);
                }
            }
        }
    }

    fn delete(&self, receipt: &str) -> Result<(), QueueError> {
        self.api.delete_message(receipt)
    }

    fn approx_depth(&self) -> Result<u64, QueueError> {
        self.api.queue_depth()
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Relaxed) && !self.cancel.load(Ordering::Relaxed)
    }
}
