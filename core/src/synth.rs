//! Default methods synthesized from service definitions.
//!
//! # Design
//! A `SynthesizedMethod` captures everything one config entry needs at call
//! time: the definition, its `ServiceHandler`, and the DTO resolved for the
//! method name (if any). The handler is the client's default
//! `DispatchHandler` unless the client supplies one for that method name. Argument binding is split out into
//! `bind` so it can be checked without a dispatcher.
//!
//! Binding rules:
//! - positional values are zipped against `params` in order; extras are
//!   ignored and missing ones leave their key absent,
//! - keyword `params` are merged on top (explicit keys win),
//! - keyword `headers` are merged on top of the definition's headers.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::artifact::MethodHandler;
use crate::client::MethodContext;
use crate::config::ServiceDefinition;
use crate::dto::Dto;
use crate::error::{ClientError, TransportError};
use crate::resolver::ResolvedDto;
use crate::transport::{Headers, Params};

/// The client-wide default dispatcher every synthesized method calls.
pub trait DispatchHandler: Send + Sync {
    fn dispatch(&self, endpoint: &str, params: Params, headers: Headers) -> Result<Value, TransportError>;
}

impl<F> DispatchHandler for F
where
    F: Fn(&str, Params, Headers) -> Result<Value, TransportError> + Send + Sync,
{
    fn dispatch(&self, endpoint: &str, params: Params, headers: Headers) -> Result<Value, TransportError> {
        self(endpoint, params, headers)
    }
}

/// Arguments for one method invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub params: Params,
    pub headers: Headers,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            positional: values.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// What a method call returns: the raw mapping, or a DTO built from it.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Raw(Value),
    Dto(Dto),
}

impl Response {
    pub fn as_dto(&self) -> Option<&Dto> {
        match self {
            Response::Dto(dto) => Some(dto),
            Response::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Response::Raw(value) => Some(value),
            Response::Dto(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Response::Raw(value) => value,
            Response::Dto(dto) => dto.into_value(),
        }
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        match self {
            Response::Dto(dto) => dto.into_typed(),
            Response::Raw(value) => serde_json::from_value(value).map_err(|e| ClientError::Decode {
                target: std::any::type_name::<T>(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Zip positional values against declared names and merge keyword overrides.
pub fn bind(definition: &ServiceDefinition, args: &CallArgs) -> (Params, Headers) {
    let mut params: Params = definition
        .params
        .iter()
        .zip(&args.positional)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    params.extend(args.params.iter().map(|(k, v)| (k.clone(), v.clone())));

    let mut headers = definition.headers.clone();
    headers.extend(args.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

    (params, headers)
}

/// Apply an optional DTO to a raw response.
pub(crate) fn wrap(raw: Value, dto: Option<&ResolvedDto>) -> Result<Response, ClientError> {
    match dto {
        Some(resolved) => Ok(Response::Dto(resolved.schema.construct(&raw)?)),
        None => Ok(Response::Raw(raw)),
    }
}

/// What a synthesized method sends its bound request through.
#[derive(Clone)]
pub enum ServiceHandler {
    /// A dispatcher: the client default, or one registered for this method.
    Dispatch(Arc<dyn DispatchHandler>),
    /// A native method of the client named after the config entry. It
    /// receives the bound params and headers; the endpoint is on the context.
    Native(Arc<dyn MethodHandler>),
}

impl std::fmt::Debug for ServiceHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceHandler::Dispatch(_) => f.write_str("Dispatch(..)"),
            ServiceHandler::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// The default implementation of one configured method.
#[derive(Clone)]
pub struct SynthesizedMethod {
    definition: ServiceDefinition,
    handler: ServiceHandler,
    dto: Option<ResolvedDto>,
}

impl std::fmt::Debug for SynthesizedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedMethod")
            .field("definition", &self.definition)
            .field("handler", &self.handler)
            .field("dto", &self.dto.as_ref().map(|d| d.schema.name.as_str()))
            .finish()
    }
}

impl SynthesizedMethod {
    /// A method that dispatches through `handler`.
    pub fn new(
        definition: ServiceDefinition,
        handler: Arc<dyn DispatchHandler>,
        dto: Option<ResolvedDto>,
    ) -> Self {
        Self::with_handler(definition, ServiceHandler::Dispatch(handler), dto)
    }

    pub fn with_handler(definition: ServiceDefinition, handler: ServiceHandler, dto: Option<ResolvedDto>) -> Self {
        Self {
            definition,
            handler,
            dto,
        }
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.definition
    }

    pub fn handler(&self) -> &ServiceHandler {
        &self.handler
    }

    pub fn dto(&self) -> Option<&ResolvedDto> {
        self.dto.as_ref()
    }

    /// Bind `args`, send them through this method's handler once and wrap
    /// the result. `ctx` is what a native handler sees.
    pub fn invoke(&self, ctx: &MethodContext<'_>, args: &CallArgs) -> Result<Response, ClientError> {
        self.invoke_with(args, |endpoint, params, headers| match &self.handler {
            ServiceHandler::Dispatch(handler) => Ok(handler.dispatch(endpoint, params, headers)?),
            ServiceHandler::Native(handler) => {
                let bound = CallArgs {
                    positional: Vec::new(),
                    params,
                    headers,
                };
                Ok(handler.call(ctx, &bound)?.into_value())
            }
        })
    }

    /// Like `invoke`, with the round trip supplied by the caller.
    pub fn invoke_with<F>(&self, args: &CallArgs, send: F) -> Result<Response, ClientError>
    where
        F: FnOnce(&str, Params, Headers) -> Result<Value, ClientError>,
    {
        let (params, headers) = bind(&self.definition, args);
        tracing::debug!(
            method = %self.definition.method_name,
            endpoint = %self.definition.endpoint,
            handler = ?self.handler,
            "invoking synthesized method"
        );
        let raw = send(&self.definition.endpoint, params, headers)?;
        wrap(raw, self.dto.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{DtoSchema, FieldType};
    use serde_json::json;
    use std::sync::Mutex;

    fn definition() -> ServiceDefinition {
        ServiceDefinition {
            method_name: "pair".to_string(),
            endpoint: "pair".to_string(),
            params: vec!["a".to_string(), "b".to_string()],
            headers: Headers::from([("accept".to_string(), "application/json".to_string())]),
        }
    }

    fn to_params(value: Value) -> Params {
        value.as_object().unwrap().clone()
    }

    /// Run a dispatch-backed method without a client around it.
    fn run(method: &SynthesizedMethod, args: &CallArgs) -> Result<Response, ClientError> {
        let ServiceHandler::Dispatch(handler) = method.handler() else {
            panic!("expected a dispatch handler");
        };
        method.invoke_with(args, |endpoint, params, headers| Ok(handler.dispatch(endpoint, params, headers)?))
    }

    #[test]
    fn bind_zips_positional_in_order() {
        let (params, _) = bind(&definition(), &CallArgs::positional([1, 2]));
        assert_eq!(params, to_params(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn bind_leaves_missing_positional_absent() {
        let (params, _) = bind(&definition(), &CallArgs::positional([1]));
        assert_eq!(params, to_params(json!({"a": 1})));
        assert!(!params.contains_key("b"));
    }

    #[test]
    fn bind_ignores_extra_positional() {
        let (params, _) = bind(&definition(), &CallArgs::positional([1, 2, 3]));
        assert_eq!(params, to_params(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn keyword_params_win_over_positional() {
        let args = CallArgs::positional([1]).param("a", 99);
        let (params, _) = bind(&definition(), &args);
        assert_eq!(params, to_params(json!({"a": 99})));
    }

    #[test]
    fn keyword_headers_merge_over_definition_headers() {
        let args = CallArgs::new()
            .header("accept", "text/plain")
            .header("x-trace", "abc");
        let (_, headers) = bind(&definition(), &args);
        assert_eq!(headers["accept"], "text/plain");
        assert_eq!(headers["x-trace"], "abc");
    }

    #[test]
    fn invoke_dispatches_once_and_returns_raw() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let handler = move |endpoint: &str, params: Params, _: Headers| -> Result<Value, TransportError> {
            seen.lock().unwrap().push((endpoint.to_string(), params));
            Ok(json!({"ok": true}))
        };
        let method = SynthesizedMethod::new(definition(), Arc::new(handler), None);

        let response = run(&method, &CallArgs::positional(["x"])).unwrap();
        assert_eq!(response, Response::Raw(json!({"ok": true})));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "pair");
        assert_eq!(calls[0].1, to_params(json!({"a": "x"})));
    }

    #[test]
    fn invoke_wraps_response_in_dto() {
        let handler = |_: &str, _: Params, _: Headers| -> Result<Value, TransportError> { Ok(json!({"status": "valid"})) };
        let dto = ResolvedDto {
            artifact: "pair".to_string(),
            schema: Arc::new(DtoSchema::new("PairDTO").field("status", FieldType::Str)),
        };
        let method = SynthesizedMethod::new(definition(), Arc::new(handler), Some(dto));

        let response = run(&method, &CallArgs::new()).unwrap();
        assert_eq!(response.as_dto().unwrap().str("status"), Some("valid"));
    }

    #[test]
    fn invoke_surfaces_validation_error() {
        let handler = |_: &str, _: Params, _: Headers| -> Result<Value, TransportError> { Ok(json!({"status": 7})) };
        let dto = ResolvedDto {
            artifact: "pair".to_string(),
            schema: Arc::new(DtoSchema::new("PairDTO").field("status", FieldType::Str)),
        };
        let method = SynthesizedMethod::new(definition(), Arc::new(handler), Some(dto));

        let err = run(&method, &CallArgs::new()).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn invoke_propagates_transport_error_unchanged() {
        let handler = |_: &str, _: Params, _: Headers| -> Result<Value, TransportError> {
            Err(TransportError::HttpError {
                status: 502,
                body: "bad gateway".to_string(),
            })
        };
        let method = SynthesizedMethod::new(definition(), Arc::new(handler), None);

        let err = run(&method, &CallArgs::new()).unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::HttpError { status: 502, .. })));
    }
}
