//! Lightweight server summary for event payloads.

use serde::{Deserialize, Serialize};

use crate::domain::{ServerDefinition, TransportKind};

/// Summary of a server definition, not the full definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub name: String,
    pub category: String,
    pub transport: TransportKind,
    pub install_required: bool,
}

impl From<&ServerDefinition> for ServerSummary {
    fn from(def: &ServerDefinition) -> Self {
        Self {
            name: def.name.clone(),
            category: def.category.clone(),
            transport: def.transport,
            install_required: def.install_required,
        }
    }
}
