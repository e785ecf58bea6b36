mod tracing;

pub use tracing::trace_layer;
