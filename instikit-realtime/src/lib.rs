//! InstiKit Realtime - Server push, decoupled from the screens that react
//!
//! [`RealtimeBridge`] follows the session lifecycle: one websocket channel
//! per authenticated interval, never more, torn down deterministically when
//! the session ends. Each inbound server event produces an ambient
//! [`Toast`] and a typed refresh hint republished through the [`EventHub`],
//! so interested modules subscribe locally instead of being wired to the
//! transport. Hints carry the original payload but are never authoritative;
//! consumers refetch their own canonical state.

pub mod bridge;
pub mod events;
pub mod hub;

pub use bridge::RealtimeBridge;
pub use events::{LocalUpdate, RealtimeEvent, ServerTopic, Toast};
pub use hub::EventHub;
