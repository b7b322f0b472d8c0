use super::{ModuleContext, ScriptResult};
use crate::error::CapabilityError;
use crate::sandbox::value::{Value, from_host, to_host};
use crate::security::url_validation::validate_script_url;
use indexmap::IndexMap;
use reqwest::{Client, Method};
use rhai::{Dynamic, ImmutableString, Map, Module};

/// Maximum response body a script may read (10 MiB).
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpCapability {
    client: Client,
    user_agent: String,
    max_body_bytes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: IndexMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    fn into_value(self) -> Value {
        let mut map = IndexMap::new();
        map.insert("status".to_string(), Value::Int(i64::from(self.status)));
        map.insert("body".to_string(), Value::String(self.body));
        map.insert(
            "headers".to_string(),
            Value::Map(
                self.headers
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect(),
            ),
        );
        Value::Map(map)
    }
}

/// Request body as handed over by a script.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(Value),
}

impl RequestBody {
    fn from_script(body: Dynamic) -> Self {
        match to_host(body) {
            Value::Null => Self::Text(String::new()),
            Value::String(text) => Self::Text(text),
            structured @ (Value::Map(_) | Value::List(_)) => Self::Json(structured),
            scalar => Self::Text(scalar.to_string()),
        }
    }
}

impl HttpCapability {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            max_body_bytes: MAX_RESPONSE_BYTES,
        }
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Issue one request.
    ///
    /// The URL scheme is checked before any network activity, and the body is
    /// streamed through a byte budget so an oversized response is never buffered.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<HttpResponse, CapabilityError> {
        let url = validate_script_url(url)?;

        let mut request = self.client.request(method, url);
        // Names are case-insensitive; the last value given for a name wins.
        let mut merged: IndexMap<String, &str> = IndexMap::with_capacity(headers.len());
        for (name, value) in headers {
            merged.insert(name.to_ascii_lowercase(), value.as_str());
        }
        let has_user_agent = merged.contains_key("user-agent");
        let has_content_type = merged.contains_key("content-type");
        for (name, value) in &merged {
            request = request.header(name.as_str(), *value);
        }
        if !has_user_agent {
            request = request.header(reqwest::header::USER_AGENT, self.user_agent.as_str());
        }

        match body {
            Some(RequestBody::Text(text)) => request = request.body(text),
            Some(RequestBody::Json(value)) => {
                let encoded = serde_json::to_string(&value)
                    .map_err(|e| CapabilityError::Encode(e.to_string()))?;
                if !has_content_type {
                    request = request.header(reqwest::header::CONTENT_TYPE, "application/json");
                }
                request = request.body(encoded);
            }
            None => {}
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Http(e.to_string()))?;

        let limit = self.max_body_bytes;
        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(CapabilityError::ResponseTooLarge { limit });
        }

        let status = response.status().as_u16();
        let mut response_headers = IndexMap::new();
        for (name, value) in response.headers() {
            response_headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| CapabilityError::Http(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(CapabilityError::ResponseTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers: response_headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

fn header_pairs(headers: Map) -> Vec<(String, String)> {
    headers
        .into_iter()
        .map(|(name, value)| (name.to_string(), to_host(value).to_text()))
        .collect()
}

fn request(
    ctx: &ModuleContext,
    method: Method,
    url: &str,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
) -> ScriptResult<Dynamic> {
    let http = ctx.http.clone();
    let url = url.to_string();
    let response = ctx.block_on(async move { http.send(method, &url, &headers, body).await })?;
    Ok(from_host(&response.into_value()))
}

/// `http::get(url[, headers])`, `http::post(url, body[, headers])`.
pub fn module(ctx: &ModuleContext) -> Module {
    let mut module = Module::new();

    let get_ctx = ctx.clone();
    module.set_native_fn("get", move |url: ImmutableString| {
        request(&get_ctx, Method::GET, &url, Vec::new(), None)
    });
    let get_headers_ctx = ctx.clone();
    module.set_native_fn("get", move |url: ImmutableString, headers: Map| {
        request(
            &get_headers_ctx,
            Method::GET,
            &url,
            header_pairs(headers),
            None,
        )
    });

    let post_ctx = ctx.clone();
    module.set_native_fn("post", move |url: ImmutableString, body: Dynamic| {
        request(
            &post_ctx,
            Method::POST,
            &url,
            Vec::new(),
            Some(RequestBody::from_script(body)),
        )
    });
    let post_headers_ctx = ctx.clone();
    module.set_native_fn(
        "post",
        move |url: ImmutableString, body: Dynamic, headers: Map| {
            request(
                &post_headers_ctx,
                Method::POST,
                &url,
                header_pairs(headers),
                Some(RequestBody::from_script(body)),
            )
        },
    );

    module
}
