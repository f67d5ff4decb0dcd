pub mod availability;
pub mod booking;
pub mod clock;
pub mod coupons;
pub mod history;
pub mod notifications;
pub mod pricing;
