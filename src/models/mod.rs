pub mod user;

pub use user::{UserBanData, UserData};
