pub mod account;
pub mod notification;
pub mod recipient;
pub mod trigger;
