//! Detector/tracker boundary.
//!
//! Backends produce raw `TrackerOutput`; the adapter normalizes it into
//! `Detection`s that carry a class name and an optional run-scoped identity.

mod adapter;
mod backend;
mod backends;
mod registry;
mod result;

pub use adapter::adapt_detections;
pub use backend::TrackerBackend;
pub use backends::{ReplayBackend, StubBackend};
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{ClassNames, Detection, RawBox, TrackerOutput};
