//! Per-method response DTO lookup.
//!
//! Each artifact contributes at most one DTO: the type it names as its
//! `response_type`, or else the first declared type whose name contains
//! "dto" (case-insensitive). Only that schema is kept; the rest of the
//! artifact is not touched again. Lookups are computed once when the
//! resolver is built, so repeated resolutions always agree.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::artifact::OverrideArtifact;
use crate::dto::DtoSchema;

/// A DTO together with the artifact that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDto {
    pub artifact: String,
    pub schema: Arc<DtoSchema>,
}

/// Pick the response type among `types`.
pub fn select_dto<'a>(types: &'a [DtoSchema], explicit: Option<&str>) -> Option<&'a DtoSchema> {
    match explicit {
        Some(name) => types.iter().find(|t| t.name == name),
        None => types
            .iter()
            .find(|t| t.name.to_ascii_lowercase().contains("dto")),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DtoResolver {
    by_artifact: BTreeMap<String, ResolvedDto>,
    by_method: BTreeMap<String, ResolvedDto>,
}

impl DtoResolver {
    pub fn new(artifacts: &[OverrideArtifact]) -> Self {
        let mut resolver = Self::default();
        for artifact in artifacts {
            let Some(schema) = artifact.response_dto() else {
                continue;
            };
            let resolved = ResolvedDto {
                artifact: artifact.name().to_string(),
                schema: Arc::new(schema.clone()),
            };
            tracing::debug!(artifact = artifact.name(), dto = %schema.name, "resolved response type");
            for method in artifact.methods() {
                resolver
                    .by_method
                    .insert(method.name.clone(), resolved.clone());
            }
            resolver
                .by_artifact
                .insert(artifact.name().to_string(), resolved);
        }
        resolver
    }

    /// The DTO for `method_name`: the artifact named after it first, then
    /// the artifact that declares a method of that name.
    pub fn resolve(&self, method_name: &str) -> Option<&ResolvedDto> {
        self.by_artifact
            .get(method_name)
            .or_else(|| self.by_method.get(method_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Signature;
    use crate::client::MethodContext;
    use crate::dto::FieldType;
    use crate::synth::{CallArgs, Response};
    use serde_json::Value;

    fn status_dto(name: &str) -> DtoSchema {
        DtoSchema::new(name).field("status", FieldType::Str)
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let types = vec![status_dto("Helper"), status_dto("emailDto")];
        assert_eq!(select_dto(&types, None).unwrap().name, "emailDto");
    }

    #[test]
    fn first_matching_type_wins() {
        let types = vec![status_dto("FirstDTO"), status_dto("SecondDTO")];
        assert_eq!(select_dto(&types, None).unwrap().name, "FirstDTO");
    }

    #[test]
    fn no_matching_type_resolves_to_none() {
        let types = vec![status_dto("Helper")];
        assert!(select_dto(&types, None).is_none());
    }

    #[test]
    fn resolve_by_artifact_name() {
        let artifacts = vec![OverrideArtifact::new("verify_email").dto(status_dto("EmailDTO"))];
        let resolver = DtoResolver::new(&artifacts);
        let resolved = resolver.resolve("verify_email").unwrap();
        assert_eq!(resolved.artifact, "verify_email");
        assert_eq!(resolved.schema.name, "EmailDTO");
        assert!(resolver.resolve("domain_search").is_none());
    }

    #[test]
    fn resolve_by_declared_method() {
        let artifacts = vec![OverrideArtifact::new("test_method")
            .dto(status_dto("TestDTO"))
            .method(
                "test_method_handler",
                Signature::new(),
                |_: &MethodContext<'_>, _: &CallArgs| Ok(Response::Raw(Value::Null)),
            )];
        let resolver = DtoResolver::new(&artifacts);
        assert_eq!(
            resolver.resolve("test_method_handler").unwrap().schema.name,
            "TestDTO"
        );
    }

    #[test]
    fn resolution_is_stable_across_calls() {
        let artifacts = vec![OverrideArtifact::new("verify_email").dto(status_dto("EmailDTO"))];
        let resolver = DtoResolver::new(&artifacts);
        let first = resolver.resolve("verify_email").cloned();
        let second = resolver.resolve("verify_email").cloned();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first.unwrap().schema, &second.unwrap().schema));
    }
}
