pub mod credentials;
pub mod oam_api;
