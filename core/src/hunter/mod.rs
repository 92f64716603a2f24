//! Client for the Hunter email API.
//!
//! The four lookup endpoints come from `methods.json`; `verify_email`
//! responses are wrapped in `EmailDTO`, and `test_method_handler` is a
//! hand-written override. Every request carries the configured API key and
//! only the `data` member of the response body is returned.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::artifact::{HandlerCatalog, OverrideArtifact, Signature};
use crate::client::{MethodContext, ServiceClient};
use crate::config::ServiceConfig;
use crate::dto::{DtoSchema, FieldType};
use crate::error::{ClientError, ConfigError, TransportError};
use crate::http::HttpMethod;
use crate::synth::{CallArgs, DispatchHandler, Response};
use crate::transport::{BaseFetcher, Headers, Params, Transport, UreqTransport};

const METHODS: &str = include_str!("methods.json");

pub const CLIENT_NAME: &str = "HunterClient";

#[derive(Debug, Clone, Default)]
pub struct HunterConfig {
    pub base_url: String,
    pub api_key: String,
    /// Extra `*.override.json` manifests to load.
    pub artifact_dir: Option<PathBuf>,
    /// Where to write the stub document during construction.
    pub stubs_output: Option<PathBuf>,
}

impl HunterConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Read `HUNTER_API_URL` and `HUNTER_API_KEY`; unset means empty.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("HUNTER_API_URL").unwrap_or_default(),
            std::env::var("HUNTER_API_KEY").unwrap_or_default(),
        )
    }
}

/// Adds the API key to every request and unwraps `data`.
struct HunterHandler<T> {
    fetcher: BaseFetcher<T>,
    api_key: String,
}

impl<T: Transport> DispatchHandler for HunterHandler<T> {
    fn dispatch(&self, endpoint: &str, mut params: Params, headers: Headers) -> Result<Value, TransportError> {
        params.insert("api_key".to_string(), Value::String(self.api_key.clone()));
        let body = self.fetcher.send(endpoint, &params, &headers, HttpMethod::Get)?;
        Ok(match body {
            Value::Object(mut map) => map.remove("data").unwrap_or_else(|| json!({})),
            _ => json!({}),
        })
    }
}

/// Typed form of an `EmailDTO` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailVerification {
    pub status: String,
    pub score: f64,
    pub disposable: bool,
    #[serde(default)]
    pub email: Option<String>,
}

fn email_dto() -> DtoSchema {
    DtoSchema::new("EmailDTO")
        .field("status", FieldType::Str)
        .field("score", FieldType::Float)
        .field("disposable", FieldType::Bool)
}

fn test_method_handler(ctx: &MethodContext<'_>, args: &CallArgs) -> Result<Response, ClientError> {
    let text = args.positional.first().and_then(Value::as_str).unwrap_or_default();
    tracing::info!(method = ctx.method_name(), your_text = text, "test method handler");
    ctx.wrap(json!({"status": "success"}))
}

fn account(ctx: &MethodContext<'_>, _: &CallArgs) -> Result<Response, ClientError> {
    let raw = ctx.dispatch("account", Params::new(), Headers::new())?;
    Ok(Response::Raw(raw))
}

/// Handlers that Hunter override manifests may bind by name.
pub fn catalog() -> HandlerCatalog {
    HandlerCatalog::new().register("hunter.test_method", test_method_handler)
}

/// The artifacts shipped with the client.
pub fn artifacts() -> Vec<OverrideArtifact> {
    vec![
        OverrideArtifact::new("verify_email").dto(email_dto()),
        OverrideArtifact::new("test_method")
            .dto(DtoSchema::new("TestDTO").field("status", FieldType::Str))
            .method(
                "test_method_handler",
                Signature::new()
                    .param("your_text", "str")
                    .doc("Log the given text and report success."),
                test_method_handler,
            ),
    ]
}

#[derive(Debug)]
pub struct HunterClient {
    inner: ServiceClient,
}

impl HunterClient {
    pub fn new(config: HunterConfig) -> Result<Self, ConfigError> {
        Self::with_transport(config, UreqTransport::new())
    }

    pub fn with_transport<T: Transport + 'static>(config: HunterConfig, transport: T) -> Result<Self, ConfigError> {
        let handler = HunterHandler {
            fetcher: BaseFetcher::new(&config.base_url, transport),
            api_key: config.api_key,
        };

        let mut builder = ServiceClient::builder(CLIENT_NAME)
            .config(ServiceConfig::parse(METHODS)?)
            .default_handler(handler)
            .native(
                "account",
                Signature::new().doc("Return account information for the configured API key."),
                account,
            );
        for artifact in artifacts() {
            builder = builder.artifact(artifact);
        }
        if let Some(dir) = config.artifact_dir {
            builder = builder.artifact_dir(dir, catalog());
        }
        if let Some(path) = config.stubs_output {
            builder = builder.stubs_output(path);
        }

        Ok(Self {
            inner: builder.build()?,
        })
    }

    pub fn client(&self) -> &ServiceClient {
        &self.inner
    }

    pub fn call(&self, method: &str, args: CallArgs) -> Result<Response, ClientError> {
        self.inner.call(method, args)
    }

    pub fn verify_email(&self, email: &str) -> Result<EmailVerification, ClientError> {
        self.inner
            .call("verify_email", CallArgs::positional([email]))?
            .into_typed()
    }
}
