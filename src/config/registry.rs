// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::errors::GraphConfigError;
use crate::traits::Node;

/// Builds a node instance from its configuration. Errors are plain messages.
pub type NodeFactory = Arc<dyn Fn(&NodeConfig) -> Result<Arc<dyn Node>, String> + Send + Sync>;

/// Explicit table of node kinds, built at startup and handed to the graph.
///
/// # Example
/// ```
/// use streamgraph::config::{NodeConfig, NodeRegistry};
///
/// let registry = NodeRegistry::with_builtin_nodes();
/// assert!(registry.contains("pass_through"));
///
/// let node = registry.create(&NodeConfig::new("p", "pass_through")).unwrap();
/// assert_eq!(node.name(), "pass_through");
/// ```
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every node kind shipped with the crate.
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();
        crate::nodes::register_builtin_nodes(&mut registry);
        registry
    }

    /// Register a factory under `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> &mut Self
    where
        F: Fn(&NodeConfig) -> Result<Arc<dyn Node>, String> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds in sorted order
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate the node a configuration describes.
    pub fn create(&self, config: &NodeConfig) -> Result<Arc<dyn Node>, GraphConfigError> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| GraphConfigError::UnknownNodeKind {
                node_id: config.id.clone(),
                kind: config.kind.clone(),
            })?;

        factory(config).map_err(|reason| GraphConfigError::NodeCreation {
            node_id: config.id.clone(),
            kind: config.kind.clone(),
            reason,
        })
    }
}

impl Debug for NodeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::PassThroughNode;

    #[test]
    fn test_registry_create_table_driven() {
        struct TestCase {
            name: &'static str,
            kind: &'static str,
            expect_ok: bool,
        }

        let mut registry = NodeRegistry::new();
        registry
            .register("ok", |_| Ok(Arc::new(PassThroughNode::new()) as Arc<dyn Node>))
            .register("broken", |cfg| Err(format!("'{}' is not configured", cfg.id)));

        let test_cases = vec![
            TestCase {
                name: "registered kind",
                kind: "ok",
                expect_ok: true,
            },
            TestCase {
                name: "factory failure",
                kind: "broken",
                expect_ok: false,
            },
            TestCase {
                name: "unknown kind",
                kind: "missing",
                expect_ok: false,
            },
        ];

        for tc in test_cases {
            let result = registry.create(&NodeConfig::new("n", tc.kind));
            assert_eq!(result.is_ok(), tc.expect_ok, "case '{}'", tc.name);
        }
    }

    #[test]
    fn test_error_kinds() {
        let mut registry = NodeRegistry::new();
        registry.register("broken", |_| Err("bad options".to_string()));

        match registry.create(&NodeConfig::new("n", "missing")) {
            Err(GraphConfigError::UnknownNodeKind { node_id, kind }) => {
                assert_eq!(node_id, "n");
                assert_eq!(kind, "missing");
            }
            other => panic!("Expected unknown kind, got {:?}", other.map(|n| n.name())),
        }

        match registry.create(&NodeConfig::new("n", "broken")) {
            Err(GraphConfigError::NodeCreation { reason, .. }) => assert_eq!(reason, "bad options"),
            other => panic!("Expected creation failure, got {:?}", other.map(|n| n.name())),
        }
    }

    #[test]
    fn test_builtin_kinds() {
        let registry = NodeRegistry::with_builtin_nodes();
        for kind in ["pass_through", "text_case", "counter_source", "timestamp_shift", "packet_collector"] {
            assert!(registry.contains(kind), "missing builtin '{}'", kind);
        }
    }
}
