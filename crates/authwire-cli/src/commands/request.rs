//! Request commands: get, post, patch, delete.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;

use authwire::http::Method;
use authwire::{MultipartForm, PendingRequest, ResponseBody};

use crate::output;
use crate::session::{self, SessionFile};

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// Path relative to the API base URL
    pub path: String,

    /// Query parameter as NAME=VALUE (repeatable)
    #[arg(short, long = "query", value_name = "NAME=VALUE")]
    pub query: Vec<String>,

    /// Extra header as "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    pub header: Vec<String>,

    /// Write the response body to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct BodyRequestArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// JSON body read from FILE, or `-` for stdin
    #[arg(long, value_name = "FILE", conflicts_with_all = ["form", "file"])]
    pub json: Option<String>,

    /// Multipart text field as NAME=VALUE (repeatable)
    #[arg(long, value_name = "NAME=VALUE")]
    pub form: Vec<String>,

    /// Multipart file field as NAME=PATH (repeatable)
    #[arg(long, value_name = "NAME=PATH")]
    pub file: Vec<String>,
}

impl From<RequestArgs> for BodyRequestArgs {
    fn from(request: RequestArgs) -> Self {
        Self {
            request,
            json: None,
            form: Vec::new(),
            file: Vec::new(),
        }
    }
}

pub async fn run(method: Method, args: BodyRequestArgs, file: &SessionFile) -> Result<()> {
    let client = session::require(file)?;
    let request = build(method, &args)?;

    let result = client.send(&request).await;

    // A renewal or a termination may have changed the store either way.
    file.save(&client).context("Failed to save session")?;
    let response = result.map_err(|e| session::explain(e, "Request failed"))?;

    tracing::debug!(status = response.status(), "Request succeeded");

    match &args.request.output {
        Some(path) => write_body(path, response.body()),
        None => output::body(response.body()),
    }
}

fn build(method: Method, args: &BodyRequestArgs) -> Result<PendingRequest> {
    let mut request = PendingRequest::new(method, args.request.path.as_str());

    for pair in &args.request.query {
        let (name, value) = split_pair(pair, '=')?;
        request = request.query(name, value);
    }

    for header in &args.request.header {
        let (name, value) = split_pair(header, ':')?;
        request = request
            .header(name, value)
            .with_context(|| format!("Invalid header: {}", header))?;
    }

    if args.request.output.is_some() {
        request = request.expect_binary();
    }

    if let Some(source) = &args.json {
        let value = read_json(source)?;
        request = request.json(&value).context("Invalid JSON body")?;
    } else if !args.form.is_empty() || !args.file.is_empty() {
        request = request.multipart(read_form(&args.form, &args.file)?);
    }

    Ok(request)
}

fn split_pair(raw: &str, separator: char) -> Result<(&str, &str)> {
    let (name, value) = raw
        .split_once(separator)
        .ok_or_else(|| anyhow!("Expected NAME{}VALUE, got '{}'", separator, raw))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("Missing name in '{}'", raw);
    }
    Ok((name, value.trim()))
}

fn read_json(source: &str) -> Result<serde_json::Value> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read JSON from stdin")?;
        buf
    } else {
        fs::read_to_string(source).with_context(|| format!("Failed to read {}", source))?
    };
    serde_json::from_str(&text).context("Body is not valid JSON")
}

fn read_form(fields: &[String], files: &[String]) -> Result<MultipartForm> {
    let mut form = MultipartForm::new();

    for field in fields {
        let (name, value) = split_pair(field, '=')?;
        form = form.text(name, value);
    }

    for entry in files {
        let (name, path) = split_pair(entry, '=')?;
        let path = Path::new(path);
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        form = form.file(name, data, file_name, None);
    }

    Ok(form)
}

fn write_body(path: &Path, body: &ResponseBody) -> Result<()> {
    let data = match body {
        ResponseBody::Empty => Vec::new(),
        ResponseBody::Binary(data) => data.to_vec(),
        ResponseBody::Text(text) => text.clone().into_bytes(),
        ResponseBody::Json(value) => serde_json::to_vec_pretty(value)?,
    };
    fs::write(path, &data).with_context(|| format!("Failed to write {}", path.display()))?;
    output::success(&format!("Wrote {} bytes to {}", data.len(), path.display()));
    Ok(())
}
