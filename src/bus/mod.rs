pub mod events;

pub use events::{ChatCommand, Entity, EntityLabel, EventDetail, InboundEvent, TopProcess, WireEvent};
