//! Application state management
//!
//! This module provides the shared application state that is passed
//! to all request handlers via Axum's state extraction.
//!
//! Every field is cheap to clone: stores sit behind `Arc`, the pool is
//! internally reference counted, and the services only hold `Arc`s.

use crate::auth::{AuthGate, CredentialHasher, Pepper, SessionToucher};
use crate::config::AppConfig;
use crate::repositories::{
    MemoryQapStore, MemorySessionStore, MemoryUserStore, PgQapStore, PgSessionStore, PgUserStore,
    QuestionAnswerStore, SessionStore, UserStore,
};
use crate::services::{AuthService, Repositioner};
use kummerkasten_shared::AuthError;
use sqlx::PgPool;
use std::sync::Arc;

/// Storage backends behind the services
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub faqs: Arc<dyn QuestionAnswerStore>,
}

impl Stores {
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            sessions: Arc::new(PgSessionStore::new(pool.clone())),
            users: Arc::new(PgUserStore::new(pool.clone())),
            faqs: Arc::new(PgQapStore::new(pool.clone())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            sessions: Arc::new(MemorySessionStore::new()),
            users: Arc::new(MemoryUserStore::new()),
            faqs: Arc::new(MemoryQapStore::new()),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool; `None` when running on in-memory stores
    pub db: Option<PgPool>,
    /// Application configuration
    pub config: Arc<AppConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub auth: AuthService,
    pub gate: AuthGate,
    pub faqs: Repositioner,
}

impl AppState {
    /// State over Postgres
    ///
    /// Must be called inside a tokio runtime; it starts the touch worker.
    pub fn new(db: PgPool, config: AppConfig, pepper: Pepper) -> Result<Self, AuthError> {
        let stores = Stores::postgres(&db);
        let hasher = CredentialHasher::new(pepper)?;
        Ok(Self::from_stores(Some(db), stores, config, hasher))
    }

    /// State over in-process stores
    pub fn in_memory(config: AppConfig, pepper: Pepper) -> Result<Self, AuthError> {
        let hasher = CredentialHasher::new(pepper)?;
        Ok(Self::from_stores(None, Stores::in_memory(), config, hasher))
    }

    pub fn from_stores(
        db: Option<PgPool>,
        stores: Stores,
        config: AppConfig,
        hasher: CredentialHasher,
    ) -> Self {
        let toucher = SessionToucher::spawn(
            Arc::clone(&stores.sessions),
            config.session.touch_queue_capacity,
        );
        let gate = AuthGate::new(
            Arc::clone(&stores.sessions),
            Arc::clone(&stores.users),
            toucher,
            &config.session.cookie_name,
        );
        let auth = AuthService::new(
            Arc::clone(&stores.users),
            Arc::clone(&stores.sessions),
            hasher,
            config.session.ttl(),
        );

        Self {
            db,
            config: Arc::new(config),
            sessions: stores.sessions,
            auth,
            gate,
            faqs: Repositioner::new(stores.faqs),
        }
    }

    /// Get a reference to the database pool, if any
    #[inline]
    pub fn db(&self) -> Option<&PgPool> {
        self.db.as_ref()
    }

    /// Get a reference to the configuration
    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    #[inline]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[inline]
    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    #[inline]
    pub fn faqs(&self) -> &Repositioner {
        &self.faqs
    }
}
