pub mod error;
pub mod events;
pub mod models;

pub use error::{BookingError, BookingResult};
pub use events::{BookingChangedEvent, EngineEvent, SeatReleasedEvent};
pub use models::{
    Booking, BookingStatus, EventRecord, Seat, SeatStatus, Ticket, WaitlistEntry,
};
