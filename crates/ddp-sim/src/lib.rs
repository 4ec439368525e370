//! Simulated display hardware.
//!
//! Implements every collaborator contract from `ddp-hw` in memory: register files, clocks and
//! power domains with reference counts, display mutexes, routing links, a command-queue engine
//! and the host's vblank/event machinery. Every call is appended to a shared [`SimLog`] so tests
//! can assert on exact ordering, and most collaborators accept injected faults.
#![forbid(unsafe_code)]

pub mod clock;
pub mod cmdq;
pub mod comp;
pub mod drm;
pub mod log;
pub mod mutex;
pub mod paths;
pub mod platform;

pub use clock::{ClockSnapshot, SimClocks};
pub use cmdq::{ExecRecord, SimCmdq, CMDQ_EVENT_BASE};
pub use comp::{CompCall, SimComponent, SimRegs};
pub use drm::{DeliveredEvent, SimDrm};
pub use log::{SimEvent, SimLog};
pub use mutex::{SimMutex, SimMutexProvider, SimMutexState};
pub use paths::SimPaths;
pub use platform::SimPlatform;
