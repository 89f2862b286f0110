use crate::context::AgentContext;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// The capability every agent exposes: a stable name, a human description,
/// and optional lifecycle hooks. This is polymorphism over the capability
/// set `{name, description, run}`, not inheritance of state.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    async fn setup(&self) -> Result<()> {
        Ok(())
    }

    async fn teardown(&self) -> Result<()> {
        Ok(())
    }
}

/// Agents that participate in the translation workflow: `run(AgentContext)
/// -> AgentContext`. Standalone agents (e.g. `TerminologyAgent` in `extract`
/// mode) don't implement this; they expose their own typed operations
/// instead, while still implementing the base `Agent` trait for registry
/// purposes.
#[async_trait]
pub trait ContextAgent: Agent {
    async fn run(&self, ctx: AgentContext) -> Result<AgentContext>;

    /// Convenience invocation performing `setup -> run -> teardown`, even on
    /// failure.
    async fn invoke(&self, ctx: AgentContext) -> Result<AgentContext> {
        self.setup().await?;
        let result = self.run(ctx).await;
        let _ = self.teardown().await;
        result
    }
}

type AgentConstructor = Box<dyn Fn() -> Arc<dyn Agent> + Send + Sync>;

/// A process-wide type-indexed map from a stable class/type key to an agent
/// constructor, populated declaratively at module load. Production code
/// should prefer explicit constructor injection (resolved dependencies
/// passed directly); the registry exists for dynamic lookup in CLIs and
/// tests.
#[derive(Default)]
pub struct AgentRegistry {
    constructors: HashMap<String, AgentConstructor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, constructor: AgentConstructor) {
        self.constructors.insert(key.into(), constructor);
    }

    pub fn resolve(&self, key: &str) -> Option<Arc<dyn Agent>> {
        self.constructors.get(key).map(|ctor| ctor())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.constructors.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(|k| k.as_str())
    }
}
