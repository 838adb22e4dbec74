pub use sekolah_core as core;
pub use sekolah_utils as utils;

// Convenience re-exports for common usage
pub use sekolah_core::builder::PipelineBuilder;
pub use sekolah_core::config::{load_config, FlowConfig};
pub use sekolah_core::engine::SekolahFlow;
pub use sekolah_core::events::trigger::Trigger;
pub use sekolah_core::sources::traits::Source;
pub use sekolah_core::transforms::traits::Transform;
pub use sekolah_core::destinations::traits::Destination;
pub use sekolah_utils::{RawRecords, SekolahResult, TabularFrame};
