pub mod auth;
pub mod lookup;
pub mod total;
pub mod utils;
