//! HTTP primitives consumed by the migration engine.
//!
//! Every operation makes a bounded number of attempts and reports plain
//! success or failure; the caller decides what a failure means for the file.
use std::io::Read;
use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;

use crate::MigrateError;
use crate::util::retry_operation;

/// Content stream handed to [`Transport::post`], built fresh for every attempt.
pub type Upload = Box<dyn Read + Send>;

pub trait Transport: Sync {
    /// GET `url` and decode the body of the first successful response.
    /// A decode error counts as a failed attempt. None once attempts run out.
    fn get<T, F>(&self, url: &str, max_attempts: usize, decode: F) -> Option<T>
    where
        F: FnMut(&mut dyn Read) -> anyhow::Result<T>;

    /// Upload one file as multipart field `file` named `file_name`.
    /// `provider` is called once per attempt so a retry never reuses a drained stream.
    fn post<P>(&self, url: &str, max_attempts: usize, file_name: &str, provider: P) -> bool
    where
        P: FnMut() -> std::io::Result<Upload>;

    fn delete(&self, url: &str, max_attempts: usize) -> bool;
}

/// [`Transport`] over a blocking reqwest client shared by all workers.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    backoff: Duration,
}

impl HttpTransport {
    /// `backoff` is the base delay between attempts; attempt `n` waits `n * backoff`.
    pub fn new(request_timeout: Duration, backoff: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self { client, backoff })
    }
}

fn check_status(url: &str, resp: &Response) -> Result<(), MigrateError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(MigrateError::UnexpectedStatus(url.to_string(), status.as_u16()))
    }
}

impl Transport for HttpTransport {
    fn get<T, F>(&self, url: &str, max_attempts: usize, mut decode: F) -> Option<T>
    where
        F: FnMut(&mut dyn Read) -> anyhow::Result<T>,
    {
        let res = retry_operation(max_attempts, self.backoff, || -> anyhow::Result<T> {
            let mut resp = self.client.get(url).header(ACCEPT, "*/*").send()?;
            check_status(url, &resp)?;
            decode(&mut resp)
        });
        match res {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("GET {} gave up after {} attempts: {:#}", url, max_attempts, e);
                None
            }
        }
    }

    fn post<P>(&self, url: &str, max_attempts: usize, file_name: &str, mut provider: P) -> bool
    where
        P: FnMut() -> std::io::Result<Upload>,
    {
        let res = retry_operation(max_attempts, self.backoff, || -> anyhow::Result<()> {
            let content = provider().map_err(|e| MigrateError::BufferIo(e.to_string()))?;
            let part = Part::reader(content).file_name(file_name.to_string()).mime_str("text/plain")?;
            let form = Form::new().part("file", part);
            let resp = self.client.post(url).header(ACCEPT, "*/*").multipart(form).send()?;
            check_status(url, &resp)?;
            if let Ok(body) = resp.text() {
                tracing::debug!("POST {} ({}) -> {}", url, file_name, body.trim());
            }
            Ok(())
        });
        if let Err(e) = &res {
            tracing::warn!("POST {} ({}) gave up: {:#}", url, file_name, e);
        }
        res.is_ok()
    }

    fn delete(&self, url: &str, max_attempts: usize) -> bool {
        let res = retry_operation(max_attempts, self.backoff, || -> anyhow::Result<()> {
            let resp = self.client.delete(url).header(ACCEPT, "*/*").send()?;
            check_status(url, &resp)?;
            Ok(())
        });
        if let Err(e) = &res {
            tracing::warn!("DELETE {} gave up: {:#}", url, e);
        }
        res.is_ok()
    }
}

/// Fetch the JSON array of file names served at `<base>/files`.
pub fn list_files<T: Transport>(
    transport: &T,
    base: &str,
    max_attempts: usize,
) -> Result<Vec<String>, MigrateError> {
    let url = crate::migrate::files_url(base)?;
    transport
        .get(url.as_str(), max_attempts, |body| {
            let names: Vec<String> = serde_json::from_reader(body)?;
            Ok(names)
        })
        .ok_or_else(|| MigrateError::FileListUnavailable(url.to_string()))
}
