use optic_gpu::DeviceError;
use thiserror::Error;

/// Fatal overlay initialization failures.
///
/// Steady-state rendering never returns these; draw paths degrade to
/// logged no-ops instead so a debugger session survives a bad frame.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("shader '{entry_point}' failed to compile: {diagnostics}")]
    ShaderCompile {
        entry_point: &'static str,
        diagnostics: String,
    },
    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error("failed to create {what} pipeline: {source}")]
    PipelineCreation {
        what: &'static str,
        #[source]
        source: DeviceError,
    },
    #[error("descriptor heap exhausted while reserving {what}")]
    DescriptorExhausted { what: &'static str },
    #[error(transparent)]
    Device(#[from] DeviceError),
}
