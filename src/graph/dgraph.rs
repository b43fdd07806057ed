//! Graph client over the alpha's HTTP API.

use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::utils::config::GRAPH_TIMEOUT_MS;

use super::{GraphError, GraphStore, GraphTxn};

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Default)]
struct TxnContext {
    #[serde(default)]
    start_ts: u64,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    preds: Vec<String>,
}

#[derive(Deserialize, Default)]
struct Extensions {
    #[serde(default)]
    txn: Option<TxnContext>,
}

#[derive(Deserialize)]
struct MutateData {
    #[serde(default)]
    uids: HashMap<String, String>,
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<MutateData>,
    #[serde(default)]
    errors: Option<Vec<ApiError>>,
    #[serde(default)]
    extensions: Option<Extensions>,
}

fn post_api(
    http: &Client,
    base: &str,
    path: &str,
    content_type: &str,
    body: String,
) -> Result<ApiResponse, GraphError> {
    let url = format!("{base}{path}");
    let resp = http
        .post(&url)
        .header("content-type", content_type)
        .body(body)
        .send()
        .map_err(|source| GraphError::Request {
            path: path.to_string(),
            source,
        })?;
    let status = resp.status();
    let text = resp.text().map_err(|source| GraphError::Request {
        path: path.to_string(),
        source,
    })?;
    let parsed: ApiResponse = match serde_json::from_str(&text) {
        Ok(parsed) => parsed,
        Err(err) => {
            if !status.is_success() {
                return Err(GraphError::Api {
                    message: format!("status {status}: {text}"),
                });
            }
            return Err(GraphError::Decode(err));
        }
    };
    if let Some(errors) = &parsed.errors
        && let Some(first) = errors.first()
    {
        return Err(GraphError::Api {
            message: first.message.clone(),
        });
    }
    Ok(parsed)
}

/// Client for one alpha endpoint. The underlying connection pool is shared
/// with the transactions it hands out.
pub struct DgraphClient {
    http: Client,
    base: String,
}

impl DgraphClient {
    pub fn new(base: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_millis(GRAPH_TIMEOUT_MS))
            .build()
            .unwrap_or_default();
        DgraphClient {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl GraphStore for DgraphClient {
    type Txn = DgraphTxn;

    fn alter(&self, schema: &str) -> Result<(), GraphError> {
        post_api(&self.http, &self.base, "/alter", "text/plain", schema.to_string())?;
        Ok(())
    }

    fn txn(&self) -> DgraphTxn {
        DgraphTxn {
            http: self.http.clone(),
            base: self.base.clone(),
            start_ts: 0,
            keys: Vec::new(),
            preds: Vec::new(),
        }
    }
}

/// Server-side transaction: the first mutation assigns `start_ts`, later
/// calls reuse it, and the accumulated keys/preds are handed to commit.
pub struct DgraphTxn {
    http: Client,
    base: String,
    start_ts: u64,
    keys: Vec<String>,
    preds: Vec<String>,
}

impl GraphTxn for DgraphTxn {
    fn mutate(&mut self, set: &serde_json::Value) -> Result<HashMap<String, String>, GraphError> {
        let path = if self.start_ts == 0 {
            "/mutate".to_string()
        } else {
            format!("/mutate?startTs={}", self.start_ts)
        };
        let body = serde_json::json!({ "set": set });
        let parsed = post_api(&self.http, &self.base, &path, "application/json", body.to_string())?;
        if let Some(ext) = parsed.extensions
            && let Some(ctx) = ext.txn
        {
            if self.start_ts == 0 {
                self.start_ts = ctx.start_ts;
            }
            self.keys.extend(ctx.keys);
            self.preds.extend(ctx.preds);
        }
        Ok(parsed.data.map(|d| d.uids).unwrap_or_default())
    }

    fn commit(self) -> Result<(), GraphError> {
        // A transaction with no mutations has nothing to commit.
        if self.start_ts == 0 {
            return Ok(());
        }
        let body = serde_json::json!({ "keys": self.keys, "preds": self.preds });
        post_api(
            &self.http,
            &self.base,
            &format!("/commit?startTs={}", self.start_ts),
            "application/json",
            body.to_string(),
        )?;
        Ok(())
    }

    fn discard(self) {
        if self.start_ts == 0 {
            return;
        }
        if let Err(err) = post_api(
            &self.http,
            &self.base,
            &format!("/commit?startTs={}&abort=true", self.start_ts),
            "application/json",
            String::new(),
        ) {
            debug!("failed to discard txn: {}", err);
        }
    }
}
