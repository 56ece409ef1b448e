pub mod edition;
pub mod health;
pub mod relay;
pub mod sessions;
