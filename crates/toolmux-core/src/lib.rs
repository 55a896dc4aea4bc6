#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod events;
pub mod ports;
pub mod settings;
pub mod templates;

// Re-export commonly used types for convenience
pub use domain::{
    CommandFailure, ConnectionSnapshot, ConnectionState, CorrelationId, EnvEntry, FieldSpec,
    FieldType, InputSchema, InstallCommand, InstallFailure, InstallMethod, InstallSpec,
    InstallStatus, InstallStep, InstallationJob, InvalidTransition, InvocationOutcome,
    InvocationRequest, InvocationResult, LaunchSpec, ResourceContent, ResourceDescriptor,
    SchemaViolation, ServerDefinition, ServerIdentity, ServerStatus, ToolDescriptor,
    TransportErrorKind, TransportKind,
};
pub use events::{LogLevel, RuntimeEvent, ServerSummary};
pub use ports::{
    ChannelEmitter, CommandOutput, CredentialError, CredentialStore, DefinitionStore,
    ErrorCategory, ErrorInfo, EventEmitter, NoopEmitter, PackageRunner, StoreError,
};
pub use settings::{BackoffPolicy, RuntimeSettings, SettingsError, validate_settings};
pub use templates::{
    BUILTIN_BINARIES, CALCULATOR_BINARY, DATETIME_BINARY, ServerTemplate, find_template, search_templates,
    template_categories, templates,
};
