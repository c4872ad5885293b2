mod clock;
mod partial;
mod run;

pub use clock::ActivityClock;
pub use partial::PartialFileGuard;
pub use run::{
    DEFAULT_STALL_TIMEOUT, RunHandle, RunOutcome, RunState, StopReason, Supervisor,
    SupervisorEvent,
};
