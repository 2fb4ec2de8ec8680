//! Local GPT proxy adapter.
//!
//! The proxy exposes three endpoints: `GET /newid` (fresh session id as plain
//! text), `GET /create?sid=` and `POST /api` with `{sid, msg, ensure_id}`.

use std::time::Duration;

use atb_core::{errors::Error, gpt::GptBackend, Result};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    sid: i64,
    msg: &'a str,
    ensure_id: bool,
}

#[derive(Clone, Debug)]
pub struct GptProxyClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl GptProxyClient {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    ///
    /// Must not be called from inside an async runtime: the blocking client
    /// owns one.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("gpt proxy client build error: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn read_ok(resp: reqwest::blocking::Response, what: &str) -> Result<String> {
        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| Error::External(format!("gpt proxy {what} read error: {e}")))?;
        if !status.is_success() {
            return Err(Error::External(format!(
                "gpt proxy {what} failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(body)
    }
}

impl GptBackend for GptProxyClient {
    fn new_session_id(&self) -> Result<i64> {
        let resp = self
            .http
            .get(self.url("/newid"))
            .send()
            .map_err(|e| Error::External(format!("gpt proxy request error: {e}")))?;
        let body = Self::read_ok(resp, "newid")?;
        body.trim().parse::<i64>().map_err(|e| {
            Error::External(format!("gpt proxy returned a bad session id {body:?}: {e}"))
        })
    }

    fn create(&self, sid: i64) -> Result<()> {
        let resp = self
            .http
            .get(self.url("/create"))
            .query(&[("sid", sid)])
            .send()
            .map_err(|e| Error::External(format!("gpt proxy request error: {e}")))?;
        Self::read_ok(resp, "create")?;
        debug!(sid, "gpt proxy session created");
        Ok(())
    }

    fn ask(&self, sid: i64, content: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/api"))
            .json(&AskRequest {
                sid,
                msg: content,
                ensure_id: true,
            })
            .send()
            .map_err(|e| Error::External(format!("gpt proxy request error: {e}")))?;
        Self::read_ok(resp, "api")
    }
}
