//! API request handlers

mod crash;
mod events;
mod health;
mod loadtest;
mod memory;
mod simulations;
mod streams;

pub use crash::*;
pub use events::*;
pub use health::*;
pub use loadtest::*;
pub use memory::*;
pub use simulations::*;
pub use streams::*;

use crate::error::{ApiError, ApiResult};
use perfsim_types::SimulationId;
use std::time::Duration;

/// Helper to parse a simulation ID from a path segment
fn parse_simulation_id(id: &str) -> ApiResult<SimulationId> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid simulation ID: {}", id)))
}

/// Helper to validate a positive whole number of seconds
fn positive_seconds(field: &str, value: i64) -> ApiResult<Duration> {
    u64::try_from(value)
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| ApiError::Validation(format!("{} must be positive, got {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simulation_id() {
        let id = SimulationId::generate();
        assert_eq!(parse_simulation_id(&id.to_string()).unwrap(), id);
        assert_eq!(parse_simulation_id(&format!("sim:{}", id)).unwrap(), id);
        assert!(matches!(
            parse_simulation_id("not-a-uuid"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_positive_seconds() {
        assert_eq!(positive_seconds("d", 5).unwrap(), Duration::from_secs(5));
        assert!(matches!(positive_seconds("d", 0), Err(ApiError::Validation(_))));
        assert!(matches!(positive_seconds("d", -3), Err(ApiError::Validation(_))));
    }
}
