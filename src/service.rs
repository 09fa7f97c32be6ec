//! Client for the remote chart-analysis service.
//!
//! The service sorts file batches, produces pre-annotations and turns the
//! recorded points into data values. All calls are blocking and are made
//! from worker threads; see `app`.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AnnotateError, Result};
use crate::model::ProcessDataRequest;

pub const NO_RELIABLE_DATA: &str = "No reliable data returned.";
pub const FETCH_FAILED: &str = "Error fetching data";

pub trait ChartService: Send + Sync {
    /// Order file names the way the service wants the batch shown.
    fn sort_files(&self, files: &[String]) -> Result<Vec<String>>;

    fn process_chart(&self, request: &ChartRequest) -> Result<ChartResponse>;

    fn process_data(&self, request: &ProcessDataRequest) -> Result<Value>;
}

#[derive(Serialize)]
struct SortRequest<'a> {
    files: &'a [String],
}

#[derive(Deserialize)]
struct SortResponse {
    sorted_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartRequest {
    /// The image itself, as a `data:` URL.
    pub image_dir: String,
    pub prompt: String,
    // field name is the service's
    pub threthold: f64,
}

impl ChartRequest {
    pub fn for_image(path: &Path, config: &Config) -> Result<Self> {
        Ok(Self {
            image_dir: data_url(path)?,
            prompt: config.prompt.clone(),
            threthold: config.threshold,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub axis: Option<Vec<Value>>,
}

/// What a pre-annotation request leaves in the record.
#[derive(Debug, Clone, PartialEq)]
pub struct PreAnnotation {
    pub text: String,
    pub axis_labels: Vec<String>,
}

impl PreAnnotation {
    pub fn from_response(response: ChartResponse) -> Self {
        let Some(data) = response.data.filter(|d| !d.is_null()) else {
            return Self {
                text: NO_RELIABLE_DATA.to_string(),
                axis_labels: Vec::new(),
            };
        };
        let axis_labels = response
            .axis
            .unwrap_or_default()
            .into_iter()
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect();
        Self {
            text: unescape_pretty(&data),
            axis_labels,
        }
    }

    pub fn failed() -> Self {
        Self {
            text: FETCH_FAILED.to_string(),
            axis_labels: Vec::new(),
        }
    }
}

/// Pretty-print `data` and strip the escaping the service leaves in
/// stringified payloads.
fn unescape_pretty(data: &Value) -> String {
    let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    pretty
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace('\\', "")
}

pub fn data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let mime = image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

pub struct HttpChartService {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpChartService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            base_url: config.service_url.clone(),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/", self.base_url, name)
    }

    fn post<B: Serialize + ?Sized, R: serde::de::DeserializeOwned>(
        &self,
        name: &str,
        body: &B,
    ) -> Result<R> {
        let url = self.endpoint(name);
        log::debug!("POST {url}");
        let response = self.client.post(&url).json(body).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(AnnotateError::Service(format!("{url} returned {status}: {text}")));
        }
        Ok(response.json()?)
    }
}

impl ChartService for HttpChartService {
    fn sort_files(&self, files: &[String]) -> Result<Vec<String>> {
        let response: SortResponse = self.post("sort_files", &SortRequest { files })?;
        Ok(response.sorted_files)
    }

    fn process_chart(&self, request: &ChartRequest) -> Result<ChartResponse> {
        self.post("process-chart", request)
    }

    fn process_data(&self, request: &ProcessDataRequest) -> Result<Value> {
        self.post("process-data", request)
    }
}
