pub mod health;
pub mod trades;
pub mod tv;
