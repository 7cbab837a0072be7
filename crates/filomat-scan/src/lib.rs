//! Scan workflows for Filomat.
//!
//! - [`session`]: the two-step [`ScanSession`] state machine that pairs an
//!   item tag with a container tag and applies the result to the store
//! - [`radio`]: the [`TagRadio`] boundary, the [`RadioSession`] guard,
//!   cancellation, and [`write_then_verify`]
//! - [`sim`]: a [`SimulatedRadio`] fed with in-memory tags

pub mod error;
pub mod radio;
pub mod session;
pub mod sim;

pub use error::{ScanError, ScanResult};
pub use radio::{
    cancel_pair, write_then_verify, CancelHandle, CancelToken, RadioMode, RadioSession, TagRadio,
    Verification,
};
pub use session::{ScanEvent, ScanMode, ScanOutcome, ScanSession, ScanState, ScanWarning};
pub use sim::{PresentedTag, SharedTag, SimulatedRadio};
