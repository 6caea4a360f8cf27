//! Shared setup for integration tests: in-memory store, recording mailer.

#![allow(dead_code)]

use std::sync::Arc;

use accountd::{
    auth::repo::MemoryUserStore,
    config::{AppConfig, MailConfig, SessionConfig},
    mail::MemoryMailer,
    state::AppState,
};

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        secret_key: "integration-test-secret".into(),
        public_base_url: "http://accounts.test".into(),
        link_max_age_secs: 3600,
        host: "127.0.0.1".into(),
        port: 0,
        session: SessionConfig {
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 5,
        },
        mail: MailConfig {
            server: "localhost".into(),
            port: 25,
            use_tls: false,
            username: None,
            password: None,
            sender: None,
        },
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryUserStore>,
    pub mailer: Arc<MemoryMailer>,
}

pub fn test_app() -> TestApp {
    test_app_with(MemoryMailer::new())
}

pub fn test_app_with(mailer: MemoryMailer) -> TestApp {
    let store = Arc::new(MemoryUserStore::new());
    let mailer = Arc::new(mailer);
    let state = AppState::from_parts(Arc::new(test_config()), store.clone(), mailer.clone());
    TestApp {
        state,
        store,
        mailer,
    }
}

impl TestApp {
    /// Token from the last link mailed to `to`.
    pub fn mailed_token(&self, to: &str) -> String {
        let mail = self
            .mailer
            .last_to(to)
            .unwrap_or_else(|| panic!("no mail sent to {to}"));
        mail.body
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}
