mod lock;
mod session;
mod store;

pub use lock::{FileLock, LockService, MemoryLock};
pub use session::{SessionChoice, SessionDecision, SessionSignal, SessionState};
pub use store::{
    IntegrityEnvelope, NewTarget, RegistryError, ScopeStatus, SessionStore, TargetRecord,
    SCHEMA_HEADERS, SCHEMA_VERSION,
};
