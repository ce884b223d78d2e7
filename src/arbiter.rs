//! Duplicate-executor arbitration.
//!
//! At most one executor session may hold a room. The server enforces this by
//! closing the second executor's push connection with a reserved reason; this
//! module is the client-side rule that turns that close event into an
//! eviction, regardless of which lifecycle state the controller was in.

use tracing::warn;

use crate::controller::DiscussionSessionController;
use crate::transport::{DisconnectReason, RoomRole};

/// Notice shown to an evicted executor.
pub const DUPLICATE_EXECUTOR_NOTICE: &str =
    "Another executor already controls this room. Rejoining as a viewer.";

/// What to do about a transport close event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusivityVerdict {
    /// Transport-level closure; not this module's concern.
    Ignore(DisconnectReason),
    /// Duplicate executor: suppress rendering, surface the blocking notice,
    /// and rejoin the room in the given non-exclusive role. Never reconnect
    /// as executor.
    Evict {
        notice: &'static str,
        rejoin_as: RoomRole,
    },
}

/// Stateless reactive rule over close events.
pub struct ExclusivityArbiter;

impl ExclusivityArbiter {
    /// Classify a close event.
    pub fn judge(reason: &DisconnectReason) -> ExclusivityVerdict {
        if reason.is_duplicate_executor() {
            ExclusivityVerdict::Evict {
                notice: DUPLICATE_EXECUTOR_NOTICE,
                rejoin_as: RoomRole::View,
            }
        } else {
            ExclusivityVerdict::Ignore(reason.clone())
        }
    }

    /// Classify and, on eviction, pre-empt the whole pipeline: the
    /// controller's owned timers are cancelled and the session marked not
    /// running before the caller redirects.
    pub fn judge_and_preempt(
        reason: &DisconnectReason,
        controller: &mut DiscussionSessionController,
    ) -> ExclusivityVerdict {
        let verdict = Self::judge(reason);
        if let ExclusivityVerdict::Evict { .. } = verdict {
            warn!(
                room_id = controller.room_id(),
                "duplicate executor rejected; evicting view"
            );
            controller.teardown();
        }
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_executor_evicts_to_viewer() {
        let verdict = ExclusivityArbiter::judge(&DisconnectReason::DuplicateExecutor);
        assert_eq!(
            verdict,
            ExclusivityVerdict::Evict {
                notice: DUPLICATE_EXECUTOR_NOTICE,
                rejoin_as: RoomRole::View,
            }
        );
    }

    #[test]
    fn test_other_close_is_ignored() {
        let reason = DisconnectReason::Other("going away".to_string());
        let verdict = ExclusivityArbiter::judge(&reason);
        assert_eq!(verdict, ExclusivityVerdict::Ignore(reason));
    }
}
