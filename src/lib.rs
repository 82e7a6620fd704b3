use std::sync::Arc;

use crate::config::Config;
use crate::database::PgUserStore;
use crate::service::UserDataService;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<UserDataService<PgUserStore>>,
    pub config: Config,
}
