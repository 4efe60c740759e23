//! Per-request dispatch pipeline:
//! decode, resolve target, materialize, invoke, classify, respond.

use std::sync::Arc;

use crate::fault;
use crate::{
    classify, declared_is_async, decode_envelope, invoke, materialize, CapabilityTable,
    DispatchError, EntityStore, ErrorResponse, Location, LocationResponse, TargetRef,
};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Result stored at `location`.
    Success {
        location: Location,
        response: LocationResponse,
    },
    Failure(ErrorResponse),
}

/// Shared dispatch state: the entity store plus the capability table.
#[derive(Debug)]
pub struct Dispatcher {
    store: EntityStore,
    capabilities: CapabilityTable,
}

impl Dispatcher {
    pub fn new(capabilities: CapabilityTable) -> Self {
        Self {
            store: EntityStore::new(),
            capabilities,
        }
    }

    pub fn with_sdk_bindings() -> Self {
        Self::new(CapabilityTable::with_sdk_bindings())
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn capabilities(&self) -> &CapabilityTable {
        &self.capabilities
    }

    /// Runs one command against `target`. Never panics and never fails: every
    /// fault, including a panic in the invoked capability, becomes a
    /// [`DispatchOutcome::Failure`].
    pub async fn dispatch(&self, target: TargetRef, body: &[u8]) -> DispatchOutcome {
        let is_async = declared_is_async(body);
        match fault::contain(self.run(&target, body)).await {
            Ok(Ok((location, response))) => {
                tracing::info!(address = %target, location = %location, "command stored");
                DispatchOutcome::Success { location, response }
            }
            Ok(Err(error)) => {
                tracing::warn!(address = %target, is_async, %error, "command failed");
                DispatchOutcome::Failure(ErrorResponse::new(error.to_string(), is_async, ""))
            }
            Err(caught) => {
                let error = DispatchError::Panic(caught.message);
                tracing::error!(address = %target, is_async, %error, "command panicked");
                DispatchOutcome::Failure(ErrorResponse::new(
                    error.to_string(),
                    is_async,
                    caught.stack,
                ))
            }
        }
    }

    async fn run(
        &self,
        target: &TargetRef,
        body: &[u8],
    ) -> Result<(Location, LocationResponse), DispatchError> {
        let decoded = decode_envelope(body);
        let entity = self
            .store
            .lookup(target)
            .await
            .ok_or_else(|| DispatchError::NotFound(target.to_string()))?;
        let envelope = decoded?;
        tracing::info!(
            command = envelope.command.as_str(),
            address = %target,
            is_async = envelope.is_async,
            "dispatching command"
        );

        let arguments = materialize(&envelope)?;
        let outcome = invoke(
            &self.capabilities,
            &entity,
            target.is_client(),
            &envelope.command,
            arguments,
        )
        .await?;
        let classified = classify(outcome)?;
        let location = self
            .store
            .record_result(&envelope.command, Arc::clone(&classified.entity))
            .await;
        Ok((
            location,
            LocationResponse {
                entity_type: classified.kind.as_str().to_string(),
                data: classified.data,
                logs: Vec::new(),
            },
        ))
    }
}
