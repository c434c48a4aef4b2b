//! Collaborators the saga calls, with adapters for the in-process engines.

pub mod inventory;
pub mod notification;
pub mod payment;
pub mod shipping;

pub use self::inventory::{InventoryService, ReservationItem};
pub use self::notification::{
    Channel, InMemoryNotifier, Notification, NotificationKind, NotificationService,
};
pub use self::payment::{PaymentResult, PaymentService};
pub use self::shipping::{ShipmentRequest, ShipmentResult, ShippingService};
