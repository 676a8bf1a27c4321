pub mod email;
pub mod geocode;
pub mod pricing;
pub mod reminders;
pub mod weather;
