//! Config-driven API clients with hand-written overrides and generated stubs.
//!
//! # Overview
//! A `ServiceClient` is assembled once from three sources: a declarative
//! service config (`methods.json`), methods the client implements itself,
//! and override artifacts that supply hand-written handlers, response DTOs
//! and attributes. The result is a single resolved method table that can be
//! invoked by name and described as a static stub document.
//!
//! # Design
//! - Resolution is explicit: native, then config, then override, with later
//!   layers replacing same-named entries. No namespace mutation.
//! - Overrides are data plus handler handles, registered in code or loaded
//!   from `*.override.json` manifests that bind handlers by catalog key.
//! - Transport follows the host-does-IO split: `BaseFetcher` builds and
//!   parses plain-data requests, a `Transport` performs the round trip.
//! - Everything happens inside `build`; a client either constructs fully or
//!   fails with a `ConfigError`.

pub mod artifact;
pub mod client;
pub mod config;
pub mod dto;
pub mod error;
pub mod http;
pub mod hunter;
pub mod overrides;
pub mod registry;
pub mod resolver;
pub mod stubs;
pub mod synth;
pub mod transport;

pub use artifact::{CustomMethod, HandlerCatalog, MethodHandler, OverrideArtifact, Param, Signature};
pub use client::{MethodContext, ServiceClient, ServiceClientBuilder};
pub use config::{ServiceConfig, ServiceDefinition};
pub use dto::{Dto, DtoField, DtoSchema, FieldType};
pub use error::{
    ClientError, ConfigError, OverrideLoadError, StubGenerationError, TransportError, ValidationError,
    ValidationFailure,
};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use hunter::{EmailVerification, HunterClient, HunterConfig};
pub use overrides::{LoadedOverrides, MethodOverrideLoader};
pub use registry::{Implementation, MethodEntry, MethodTable, Origin};
pub use resolver::{DtoResolver, ResolvedDto};
pub use stubs::{stubs_path_for, StubDocument, StubEntry, StubParam, StubsGenerator};
pub use synth::{CallArgs, DispatchHandler, Response, ServiceHandler, SynthesizedMethod};
pub use transport::{BaseFetcher, Headers, Params, Transport, UreqTransport, DEFAULT_TIMEOUT};
