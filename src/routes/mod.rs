pub mod ping;
pub mod mw_auth;

pub mod faces;
pub mod photos;
