pub mod school;
pub mod traits;

pub use school::SchoolTransform;
pub use traits::{RejectReason, RejectedRecord, Transform, TransformOutput};
