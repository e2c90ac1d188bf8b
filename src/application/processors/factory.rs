//! Action key to processor dispatch table

use super::{ActivityProcessor, BridgeProcessor, EventLedger, HangupProcessor, OriginateProcessor};
use crate::domain::call::Action;
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::SwitchClient;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a processor from the shared switch client and event ledger
pub type ProcessorConstructor =
    Arc<dyn Fn(Arc<dyn SwitchClient>, Arc<EventLedger>) -> Box<dyn ActivityProcessor> + Send + Sync>;

/// Wrap a processor constructor function
pub fn processor_constructor<P, F>(build: F) -> ProcessorConstructor
where
    P: ActivityProcessor + 'static,
    F: Fn(Arc<dyn SwitchClient>, Arc<EventLedger>) -> P + Send + Sync + 'static,
{
    Arc::new(move |client, ledger| Box::new(build(client, ledger)) as Box<dyn ActivityProcessor>)
}

/// Maps action keys to processors.
///
/// `originate`, `bridge` and `hangup` are registered by default; further
/// actions are added with [`ActivityProcessorFactory::register`].
pub struct ActivityProcessorFactory {
    client: Arc<dyn SwitchClient>,
    ledger: Arc<EventLedger>,
    registry: HashMap<String, ProcessorConstructor>,
}

impl ActivityProcessorFactory {
    pub fn new(client: Arc<dyn SwitchClient>, ledger: Arc<EventLedger>) -> Self {
        let mut factory = Self {
            client,
            ledger,
            registry: HashMap::new(),
        };

        factory.register(
            Action::Originate.as_str(),
            processor_constructor(OriginateProcessor::new),
        );
        factory.register(
            Action::Bridge.as_str(),
            processor_constructor(BridgeProcessor::new),
        );
        factory.register(
            Action::Hangup.as_str(),
            processor_constructor(HangupProcessor::new),
        );

        factory
    }

    /// Add or replace the processor for an action key
    pub fn register(&mut self, action: impl Into<String>, constructor: ProcessorConstructor) {
        self.registry.insert(action.into(), constructor);
    }

    /// Processor for an action key
    pub fn create(&self, action: &str) -> Result<Box<dyn ActivityProcessor>> {
        let constructor = self
            .registry
            .get(action)
            .ok_or_else(|| FlowError::UnsupportedAction(action.to_string()))?;
        Ok(constructor(self.client.clone(), self.ledger.clone()))
    }

    /// Registered action keys, sorted
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.registry.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}
