pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod search;
pub mod server;
pub mod users;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 { 1 }
