pub mod bus;
pub mod daily;
pub mod interval;
pub mod trigger;

pub use trigger::{Trigger, TriggerEvent};
