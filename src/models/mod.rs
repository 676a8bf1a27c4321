pub mod address;
pub mod comment;
pub mod event;
pub mod event_type;
pub mod pricing;
pub mod rating;
pub mod registration;
pub mod user;
