use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::security::password::PasswordManager;
use crate::security::session::{SessionBackend, SessionManager};
use crate::shared::utils::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub conn: DbPool,
    pub sessions: Arc<SessionManager<SessionBackend>>,
    pub passwords: Arc<PasswordManager>,
}

impl AppState {
    pub fn new(config: &AppConfig, conn: DbPool) -> Result<Self> {
        let passwords = PasswordManager::new(
            &config.password.argon2,
            config.password.policy.clone(),
        )?;
        let backend = SessionBackend::from_kind(config.session.backend, &conn);
        let sessions = SessionManager::new(backend, config.session.clone());

        Ok(Self {
            conn,
            sessions: Arc::new(sessions),
            passwords: Arc::new(passwords),
        })
    }
}
