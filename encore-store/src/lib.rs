pub mod app_config;
pub mod events;
pub mod locks;
pub mod store;
pub mod tx;

pub use events::EventBus;
pub use locks::{LockCoordinator, SeatLockSet};
pub use store::{default_seat_layout, ReservationStore};
pub use tx::Transaction;
