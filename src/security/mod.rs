pub mod password;
pub mod request_id;
pub mod session;

pub use password::{Argon2Config, PasswordConfig, PasswordIssue, PasswordManager};
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use session::{
    DatabaseSessionStore, InMemorySessionStore, Session, SessionBackend, SessionBackendKind,
    SessionConfig, SessionManager, SessionStore,
};
