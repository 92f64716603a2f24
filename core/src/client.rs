//! A service client assembled from config, native methods and overrides.
//!
//! # Design
//! `ServiceClientBuilder::build` is the only way to get a `ServiceClient`,
//! and it does all the work up front: load the config, require a default
//! dispatch handler, load overrides, resolve DTOs, synthesize defaults,
//! resolve the method table, generate the stub document and optionally
//! write it. It
//! either returns a fully usable client or a `ConfigError`; nothing is
//! re-read or re-synthesized afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::artifact::{CustomMethod, HandlerCatalog, OverrideArtifact, Signature};
use crate::config::ServiceConfig;
use crate::error::{ClientError, ConfigError, OverrideLoadError, StubGenerationError};
use crate::overrides::MethodOverrideLoader;
use crate::registry::{Implementation, MethodEntry, MethodTable, Origin};
use crate::resolver::{DtoResolver, ResolvedDto};
use crate::stubs::{StubDocument, StubsGenerator};
use crate::synth::{self, CallArgs, DispatchHandler, Response, ServiceHandler, SynthesizedMethod};
use crate::transport::{Headers, Params};

enum ConfigSource {
    Empty,
    Parsed(ServiceConfig),
    Path(PathBuf),
}

pub struct ServiceClientBuilder {
    name: String,
    config: ConfigSource,
    handler: Option<Arc<dyn DispatchHandler>>,
    natives: Vec<CustomMethod>,
    service_handlers: BTreeMap<String, Arc<dyn DispatchHandler>>,
    overrides: MethodOverrideLoader,
    stubs_output: Option<PathBuf>,
}

impl ServiceClientBuilder {
    /// Use an already parsed config.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = ConfigSource::Parsed(config);
        self
    }

    /// Read the config from `path` during `build`.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = ConfigSource::Path(path.into());
        self
    }

    pub fn default_handler(mut self, handler: impl DispatchHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Dispatch the config entry `method` through `handler` instead of the
    /// default handler.
    pub fn service_handler(mut self, method: impl Into<String>, handler: impl DispatchHandler + 'static) -> Self {
        self.service_handlers.insert(method.into(), Arc::new(handler));
        self
    }

    /// Register a method implemented by the client itself. A native named
    /// after a config entry becomes that entry's service handler.
    pub fn native<F>(mut self, name: impl Into<String>, signature: Signature, handler: F) -> Self
    where
        F: Fn(&MethodContext<'_>, &CallArgs) -> Result<Response, ClientError> + Send + Sync + 'static,
    {
        self.natives.push(CustomMethod::new(name, signature, handler));
        self
    }

    pub fn artifact(mut self, artifact: OverrideArtifact) -> Self {
        self.overrides.push(artifact);
        self
    }

    /// Load `*.override.json` manifests from `dir`, binding handlers from
    /// `catalog`.
    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>, catalog: HandlerCatalog) -> Self {
        self.overrides.push_directory(dir, Arc::new(catalog));
        self
    }

    /// Write the stub document to `path` at the end of construction.
    pub fn stubs_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.stubs_output = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ServiceClient, ConfigError> {
        let config = match self.config {
            ConfigSource::Empty => ServiceConfig::default(),
            ConfigSource::Parsed(config) => config,
            ConfigSource::Path(path) => ServiceConfig::load(&path)?,
        };

        let handler = self.handler.ok_or_else(|| ConfigError::MissingDefaultHandler {
            client: self.name.clone(),
        })?;

        let loaded = self.overrides.load()?;
        let resolver = DtoResolver::new(&loaded.artifacts);

        let mut natives: BTreeMap<String, CustomMethod> = self
            .natives
            .into_iter()
            .map(|method| (method.name.clone(), method))
            .collect();
        let mut service_handlers = self.service_handlers;

        let mut defaults: Vec<MethodEntry> = Vec::with_capacity(config.len());
        for definition in config.iter() {
            let name = &definition.method_name;
            let service = match service_handlers.remove(name) {
                Some(dispatch) => ServiceHandler::Dispatch(dispatch),
                None => match natives.remove(name) {
                    Some(native) => ServiceHandler::Native(native.handler),
                    None => ServiceHandler::Dispatch(Arc::clone(&handler)),
                },
            };
            let dto = resolver.resolve(name).cloned();
            defaults.push(MethodEntry::config_default(SynthesizedMethod::with_handler(
                definition.clone(),
                service,
                dto,
            )));
        }
        for name in service_handlers.keys() {
            tracing::warn!(client = %self.name, method = %name, "service handler has no config entry");
        }

        let natives: Vec<MethodEntry> = natives
            .into_values()
            .map(|method| custom_entry(method, Origin::Native, &resolver))
            .collect();

        let overrides: Vec<MethodEntry> = loaded
            .methods()
            .map(|(artifact, method)| {
                let origin = Origin::Override {
                    artifact: artifact.to_string(),
                };
                custom_entry(method.clone(), origin, &resolver)
            })
            .collect();

        let table = MethodTable::from_layers([natives, defaults, overrides]);
        let stubs = StubsGenerator::new(&self.name, &table, &loaded.errors).generate();

        let client = ServiceClient {
            name: self.name,
            table,
            attributes: loaded.attributes(),
            resolver,
            handler,
            load_errors: loaded.errors,
            stubs,
        };

        tracing::info!(
            client = %client.name,
            methods = client.table.len(),
            skipped_artifacts = client.load_errors.len(),
            "service client constructed"
        );

        if let Some(path) = self.stubs_output {
            if let Err(err) = client.stubs.write(&path) {
                tracing::warn!(client = %client.name, error = %err, "stub generation failed");
            }
        }

        Ok(client)
    }
}

fn custom_entry(method: CustomMethod, origin: Origin, resolver: &DtoResolver) -> MethodEntry {
    MethodEntry {
        dto: resolver.resolve(&method.name).cloned(),
        name: method.name,
        origin,
        signature: method.signature,
        implementation: Implementation::Custom(method.handler),
    }
}

pub struct ServiceClient {
    name: String,
    table: MethodTable,
    attributes: BTreeMap<String, Value>,
    resolver: DtoResolver,
    handler: Arc<dyn DispatchHandler>,
    load_errors: Vec<OverrideLoadError>,
    stubs: StubDocument,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("name", &self.name)
            .field("methods", &self.table.names().collect::<Vec<_>>())
            .field("attributes", &self.attributes)
            .field("load_errors", &self.load_errors)
            .finish_non_exhaustive()
    }
}

impl ServiceClient {
    pub fn builder(name: impl Into<String>) -> ServiceClientBuilder {
        ServiceClientBuilder {
            name: name.into(),
            config: ConfigSource::Empty,
            handler: None,
            natives: Vec::new(),
            service_handlers: BTreeMap::new(),
            overrides: MethodOverrideLoader::new(),
            stubs_output: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the active implementation of `method`.
    pub fn call(&self, method: &str, args: CallArgs) -> Result<Response, ClientError> {
        let entry = self
            .table
            .get(method)
            .ok_or_else(|| ClientError::UnknownMethod(method.to_string()))?;
        match &entry.implementation {
            Implementation::ConfigDefault(synthesized) => {
                let ctx = MethodContext { client: self, entry };
                synthesized.invoke(&ctx, &args)
            }
            Implementation::Custom(handler) => {
                let ctx = MethodContext { client: self, entry };
                handler.call(&ctx, &args)
            }
        }
    }

    pub fn contains(&self, method: &str) -> bool {
        self.table.contains(method)
    }

    pub fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.table.get(name)
    }

    pub fn methods(&self) -> &MethodTable {
        &self.table
    }

    /// A value bound by an override artifact.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn resolver(&self) -> &DtoResolver {
        &self.resolver
    }

    /// Artifacts that were skipped during construction.
    pub fn load_errors(&self) -> &[OverrideLoadError] {
        &self.load_errors
    }

    /// The stub document generated during construction.
    pub fn stubs(&self) -> &StubDocument {
        &self.stubs
    }

    /// Generate a fresh stub document from the current method table.
    pub fn generate_stubs(&self) -> StubDocument {
        self.stubs_generator().generate()
    }

    /// Regenerate and write the stub document. Returns whether the file changed.
    pub fn write_stubs(&self, path: &std::path::Path) -> Result<bool, StubGenerationError> {
        self.stubs_generator().write(path)
    }

    fn stubs_generator(&self) -> StubsGenerator<'_> {
        StubsGenerator::new(&self.name, &self.table, &self.load_errors)
    }
}

/// What a hand-written handler sees of the client it is bound to.
pub struct MethodContext<'a> {
    client: &'a ServiceClient,
    entry: &'a MethodEntry,
}

impl<'a> MethodContext<'a> {
    pub fn client(&self) -> &'a ServiceClient {
        self.client
    }

    pub fn method_name(&self) -> &'a str {
        &self.entry.name
    }

    /// The configured endpoint, when this method comes from a config entry.
    pub fn endpoint(&self) -> Option<&'a str> {
        match &self.entry.implementation {
            Implementation::ConfigDefault(method) => Some(&method.definition().endpoint),
            Implementation::Custom(_) => None,
        }
    }

    /// The DTO resolved for this method.
    pub fn dto(&self) -> Option<&'a ResolvedDto> {
        self.entry.dto.as_ref()
    }

    pub fn attribute(&self, name: &str) -> Option<&'a Value> {
        self.client.attribute(name)
    }

    /// Call the client's default dispatch handler directly.
    pub fn dispatch(&self, endpoint: &str, params: Params, headers: Headers) -> Result<Value, ClientError> {
        Ok(self.client.handler.dispatch(endpoint, params, headers)?)
    }

    /// Wrap a raw response in this method's DTO, if it has one.
    pub fn wrap(&self, raw: Value) -> Result<Response, ClientError> {
        synth::wrap(raw, self.dto())
    }

    /// A handler-specific failure attributed to this method.
    pub fn fail(&self, message: impl Into<String>) -> ClientError {
        ClientError::Handler {
            method: self.entry.name.clone(),
            message: message.into(),
        }
    }
}
