pub mod availability;
pub mod booking;
pub mod coupon;
pub mod history;
pub mod service;
pub mod user;

pub use availability::{WasherAvailability, WasherProfile, WorkingHours};
pub use booking::{
    Address, Booking, BookingDetail, BookingStatus, CreateBookingRequest, NewBooking, Payment,
    PaymentMethod, PaymentStatus, UpdateStatusRequest,
};
pub use coupon::{ApplyCouponRequest, Coupon, CreateCouponRequest};
pub use history::WashHistory;
pub use service::{Service, ServiceSummary};
pub use user::{Role, User, UserSummary};
