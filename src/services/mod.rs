pub mod bookings;
pub mod holds;

pub use bookings::BookingService;
pub use holds::HoldService;
