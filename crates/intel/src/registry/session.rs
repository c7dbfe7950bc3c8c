use tracing::{info, warn};

use crate::registry::store::{RegistryError, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Healthy,
    Corrupted,
}

/// Outcome of the startup handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    New,
    Resumed,
    RunNow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChoice {
    Resume,
    New,
}

/// The interactive layer's side of the handshake. Kept behind a trait so
/// the library never touches stdin and tests can script both answers.
pub trait SessionDecision {
    fn resume_or_new(&self) -> SessionChoice;
    fn run_immediately(&self) -> bool;
}

impl SessionStore {
    /// Startup handshake: corruption is recovered by reinitialization, a
    /// healthy registry defers to the caller's decision layer, and a
    /// missing one is created. Runs entirely under exclusive access and
    /// releases it on every path, including internal failure.
    pub fn resume_or_new(
        &self,
        decision: &dyn SessionDecision,
    ) -> Result<SessionSignal, RegistryError> {
        self.with_exclusive(|| match self.inspect_state() {
            SessionState::Corrupted => {
                warn!("registry corruption detected; reinitializing");
                self.initialize_new()?;
                Ok(SessionSignal::New)
            }
            SessionState::Healthy => match decision.resume_or_new() {
                SessionChoice::New => {
                    self.initialize_new()?;
                    Ok(SessionSignal::New)
                }
                SessionChoice::Resume => {
                    info!("resuming verified registry");
                    if decision.run_immediately() {
                        Ok(SessionSignal::RunNow)
                    } else {
                        Ok(SessionSignal::Resumed)
                    }
                }
            },
            SessionState::New => {
                self.initialize_new()?;
                Ok(SessionSignal::New)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::lock::MemoryLock;
    use crate::registry::store::NewTarget;
    use std::fs;
    use tempfile::TempDir;

    struct Scripted {
        choice: SessionChoice,
        run_now: bool,
    }

    impl SessionDecision for Scripted {
        fn resume_or_new(&self) -> SessionChoice {
            self.choice
        }

        fn run_immediately(&self) -> bool {
            self.run_now
        }
    }

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::with_paths(
            dir.path().join("targets.csv"),
            &dir.path().join(".runtime_integrity"),
            Box::new(MemoryLock::new()),
        )
    }

    #[test]
    fn missing_registry_initializes_and_reports_new() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let decision = Scripted {
            choice: SessionChoice::Resume,
            run_now: false,
        };
        assert_eq!(store.resume_or_new(&decision).unwrap(), SessionSignal::New);
        assert_eq!(store.inspect_state(), SessionState::Healthy);
    }

    #[test]
    fn corruption_reinitializes_and_reports_new() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.initialize_new().unwrap();
        fs::write(dir.path().join("targets.csv"), "tampered").unwrap();

        let decision = Scripted {
            choice: SessionChoice::Resume,
            run_now: true,
        };
        assert_eq!(store.resume_or_new(&decision).unwrap(), SessionSignal::New);
        assert_eq!(store.inspect_state(), SessionState::Healthy);
    }

    #[test]
    fn healthy_resume_honors_the_run_now_choice() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.initialize_new().unwrap();

        let resume = Scripted {
            choice: SessionChoice::Resume,
            run_now: true,
        };
        assert_eq!(
            store.resume_or_new(&resume).unwrap(),
            SessionSignal::RunNow
        );

        let wait = Scripted {
            choice: SessionChoice::Resume,
            run_now: false,
        };
        assert_eq!(
            store.resume_or_new(&wait).unwrap(),
            SessionSignal::Resumed
        );
    }

    #[test]
    fn healthy_new_discards_existing_rows() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.initialize_new().unwrap();
        store
            .append_targets(&[NewTarget {
                name: "T_0".to_string(),
                input_value: "192.0.2.1".to_string(),
            }])
            .unwrap();

        let decision = Scripted {
            choice: SessionChoice::New,
            run_now: false,
        };
        assert_eq!(store.resume_or_new(&decision).unwrap(), SessionSignal::New);
        assert!(store.load_targets().unwrap().is_empty());
    }

    #[test]
    fn lock_is_released_after_the_handshake() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let decision = Scripted {
            choice: SessionChoice::Resume,
            run_now: false,
        };
        store.resume_or_new(&decision).unwrap();
        // A second acquire must succeed immediately.
        store.lock().try_acquire().unwrap();
        store.lock().release().unwrap();
    }
}
