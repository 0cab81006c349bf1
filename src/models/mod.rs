pub mod show;
pub mod seat;
pub mod booking;

pub use show::{NewShow, Show};
pub use seat::{Seat, SeatEvent, SeatStatus};
pub use booking::{Booking, BookingStatus, BookingWithSeats};
