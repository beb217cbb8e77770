//! Operation Descriptor and Schema.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value as Params;

use crate::{Command, CommandArg, CommandError, DataType, KeyBuilder, RawValue};

/// `{command, buildArgs(params)→[args…], parseResult(raw)→typed?}`.
///
/// `params` is an erased JSON value rather than a generic type parameter so
/// that heterogeneous descriptors can live side by side in one [`Schema`];
/// individual callers (the facade, the action engine) know the concrete
/// shape they passed in and decode `parse_result`'s `serde_json::Value`
/// output back into it.
#[derive(Clone)]
pub struct OperationDescriptor {
    pub command: Command,
    pub build_args: fn(&Params) -> Result<Vec<CommandArg>, CommandError>,
    pub parse_result: Option<fn(&RawValue) -> Result<serde_json::Value, CommandError>>,
}

impl OperationDescriptor {
    pub fn new(
        command: Command,
        build_args: fn(&Params) -> Result<Vec<CommandArg>, CommandError>,
    ) -> Self {
        Self {
            command,
            build_args,
            parse_result: None,
        }
    }

    pub fn with_parser(
        mut self,
        parser: fn(&RawValue) -> Result<serde_json::Value, CommandError>,
    ) -> Self {
        self.parse_result = Some(parser);
        self
    }
}

/// Groups operation descriptors sharing a key template, declared structure
/// type, and default TTL. `version`/`tags` are opaque to the
/// runtime — they exist purely for caller-side invalidation policy.
#[derive(Clone)]
pub struct Schema {
    pub name: String,
    pub key_builder: KeyBuilder,
    pub data_type: DataType,
    pub ttl: Option<Duration>,
    pub max_size: Option<usize>,
    pub namespace: Option<String>,
    pub version: Option<String>,
    pub tags: Vec<String>,
    descriptors: HashMap<String, OperationDescriptor>,
}

impl Schema {
    pub fn new(name: impl Into<String>, key_builder: KeyBuilder, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            key_builder,
            data_type,
            ttl: None,
            max_size: None,
            namespace: None,
            version: None,
            tags: Vec::new(),
            descriptors: HashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_descriptor(mut self, name: impl Into<String>, descriptor: OperationDescriptor) -> Self {
        self.descriptors.insert(name.into(), descriptor);
        self
    }

    pub fn descriptor(&self, name: &str) -> Option<&OperationDescriptor> {
        self.descriptors.get(name)
    }

    pub fn descriptor_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CommandArg;

    fn build_get_args(params: &Params) -> Result<Vec<CommandArg>, CommandError> {
        let key = params["key"]
            .as_str()
            .ok_or_else(|| CommandError::Command("missing key".into()))?;
        Ok(vec![CommandArg::Key(key.to_string())])
    }

    #[test]
    fn schema_groups_descriptors_by_name() {
        let schema = Schema::new(
            "feed",
            KeyBuilder::new("user:{userId}:feed"),
            DataType::List,
        )
        .with_ttl(Duration::from_secs(60))
        .with_descriptor("get", OperationDescriptor::new(Command::Get, build_get_args));

        assert_eq!(schema.ttl, Some(Duration::from_secs(60)));
        assert!(schema.descriptor("get").is_some());
        assert!(schema.descriptor("missing").is_none());
        assert_eq!(schema.descriptor_names().collect::<Vec<_>>(), vec!["get"]);
    }
}
