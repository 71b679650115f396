//! Side-effect boundaries of the dispatch core.
//!
//! Everything in this crate is best-effort by contract: an assignment is
//! durable the moment the order/staff mutation commits, and nothing here
//! may fail it afterwards. Delivery errors are logged and swallowed;
//! the Notifier collaborator owns its own retries.
//!
//! Three boundaries live here:
//! - `Notifier`: templated messages to patients, staff and operators
//! - `EventBus`: at-least-once terminal-outcome events for analytics
//! - `Geocoder`: address resolution that never blocks order creation

pub mod dispatcher;
pub mod events;
pub mod geocoder;
pub mod notifier;

pub use dispatcher::NotificationDispatcher;
pub use events::{DispatchEvent, EventBus, LogEventBus, RecordingEventBus};
pub use geocoder::{FallbackGeocoder, GeoResolution, GeocodeAccuracy, Geocoder};
pub use notifier::{
    LogNotifier, Notification, Notifier, NullNotifier, Recipient, RecordingNotifier,
    TemplateKind, Urgency,
};
