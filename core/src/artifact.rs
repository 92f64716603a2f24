//! Override artifacts: hand-written methods, response DTOs and attributes
//! that shadow what the service config would otherwise provide.
//!
//! # Design
//! An artifact is plain data plus handler handles. It is built one of two
//! ways:
//! - in code, with the `OverrideArtifact` builder (static registration),
//! - from a `*.override.json` manifest, whose methods name handlers that
//!   were registered in a `HandlerCatalog`. Parsing a manifest never runs
//!   anything; it only looks handlers up.
//!
//! ```json
//! {
//!   "types": [{"name": "TestDTO", "fields": [{"name": "status", "type": "str"}]}],
//!   "attributes": {"greeting": "hello"},
//!   "methods": [{
//!     "name": "test_method_handler",
//!     "handler": "hunter.test_method",
//!     "params": [{"name": "your_text", "type": "str"}],
//!     "doc": "Echo the given text."
//!   }]
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::client::MethodContext;
use crate::dto::DtoSchema;
use crate::error::{ClientError, OverrideLoadError};
use crate::resolver::select_dto;
use crate::synth::{CallArgs, Response};

/// File-name suffix of override manifests.
pub const MANIFEST_SUFFIX: &str = ".override.json";

/// A hand-written method implementation.
pub trait MethodHandler: Send + Sync {
    fn call(&self, ctx: &MethodContext<'_>, args: &CallArgs) -> Result<Response, ClientError>;
}

impl<F> MethodHandler for F
where
    F: Fn(&MethodContext<'_>, &CallArgs) -> Result<Response, ClientError> + Send + Sync,
{
    fn call(&self, ctx: &MethodContext<'_>, args: &CallArgs) -> Result<Response, ClientError> {
        self(ctx, args)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Option<String>,
}

/// Declared shape of a method, used for stubs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<String>,
    pub doc: Option<String>,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: Some(ty.into()),
        });
        self
    }

    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: None,
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A named method with its handler.
#[derive(Clone)]
pub struct CustomMethod {
    pub name: String,
    pub signature: Signature,
    pub handler: Arc<dyn MethodHandler>,
}

impl CustomMethod {
    pub fn new<F>(name: impl Into<String>, signature: Signature, handler: F) -> Self
    where
        F: Fn(&MethodContext<'_>, &CallArgs) -> Result<Response, ClientError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            handler: Arc::new(handler),
        }
    }
}

impl fmt::Debug for CustomMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMethod")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// One override unit, named after the method it overrides.
#[derive(Debug, Clone)]
pub struct OverrideArtifact {
    name: String,
    methods: Vec<CustomMethod>,
    types: Vec<DtoSchema>,
    response_type: Option<String>,
    attributes: BTreeMap<String, Value>,
}

impl OverrideArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            types: Vec::new(),
            response_type: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn method<F>(mut self, name: impl Into<String>, signature: Signature, handler: F) -> Self
    where
        F: Fn(&MethodContext<'_>, &CallArgs) -> Result<Response, ClientError> + Send + Sync + 'static,
    {
        self.methods.push(CustomMethod::new(name, signature, handler));
        self
    }

    pub fn dto(mut self, schema: DtoSchema) -> Self {
        self.types.push(schema);
        self
    }

    /// Name the declared type that wraps this artifact's responses.
    pub fn response_type(mut self, name: impl Into<String>) -> Self {
        self.response_type = Some(name.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[CustomMethod] {
        &self.methods
    }

    pub fn types(&self) -> &[DtoSchema] {
        &self.types
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// The DTO this artifact's responses are wrapped in, if any.
    pub fn response_dto(&self) -> Option<&DtoSchema> {
        select_dto(&self.types, self.response_type.as_deref())
    }

    /// Parse a manifest, binding method handlers from `catalog`.
    pub fn from_manifest(
        name: &str,
        raw: &str,
        catalog: &HandlerCatalog,
    ) -> Result<Self, OverrideLoadError> {
        let fail = |reason: String| OverrideLoadError {
            artifact: name.to_string(),
            reason,
        };

        let manifest: Manifest = serde_json::from_str(raw).map_err(|e| fail(e.to_string()))?;

        if let Some(response_type) = &manifest.response_type {
            if !manifest.types.iter().any(|t| &t.name == response_type) {
                return Err(fail(format!("response_type '{response_type}' is not declared")));
            }
        }

        let mut methods = Vec::with_capacity(manifest.methods.len());
        for method in manifest.methods {
            let handler = catalog
                .get(&method.handler)
                .ok_or_else(|| fail(format!("unknown handler '{}'", method.handler)))?;
            methods.push(CustomMethod {
                name: method.name,
                signature: Signature {
                    params: method.params,
                    returns: method.returns,
                    doc: method.doc,
                },
                handler,
            });
        }

        Ok(Self {
            name: name.to_string(),
            methods,
            types: manifest.types,
            response_type: manifest.response_type,
            attributes: manifest.attributes,
        })
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    #[serde(default)]
    types: Vec<DtoSchema>,
    #[serde(default)]
    response_type: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    methods: Vec<ManifestMethod>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestMethod {
    name: String,
    handler: String,
    #[serde(default)]
    params: Vec<Param>,
    #[serde(default)]
    returns: Option<String>,
    #[serde(default)]
    doc: Option<String>,
}

/// Handlers that manifests may refer to, keyed by a stable name.
#[derive(Clone, Default)]
pub struct HandlerCatalog {
    handlers: BTreeMap<String, Arc<dyn MethodHandler>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, key: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&MethodContext<'_>, &CallArgs) -> Result<Response, ClientError> + Send + Sync + 'static,
    {
        self.handlers.insert(key.into(), Arc::new(handler));
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn MethodHandler>> {
        self.handlers.get(key).cloned()
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
