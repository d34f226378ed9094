pub mod manager;
pub mod sweeper;
pub mod waitlist;

pub use manager::BookingManager;
pub use sweeper::ExpirySweeper;
pub use waitlist::WaitlistService;
