use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the telemetry core.
///
/// `Unavailable` is the only variant a caller should retry; everything else
/// is a deterministic rejection or an opaque internal failure.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("device not found: {0}")]
    DeviceNotFound(Uuid),

    #[error("devices not found: {}", fmt_ids(.0))]
    DevicesNotFound(Vec<Uuid>),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("batch size {size} exceeds maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Storage (or another required dependency) could not be reached.
    /// Distinct from an empty result set, which is never an error.
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn fmt_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devices_not_found_lists_every_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let msg = TelemetryError::DevicesNotFound(vec![a, b]).to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
    }

    #[test]
    fn batch_too_large_names_the_limit() {
        let msg = TelemetryError::BatchTooLarge { size: 1500, max: 1000 }.to_string();
        assert!(msg.contains("1500"));
        assert!(msg.contains("1000"));
    }
}
