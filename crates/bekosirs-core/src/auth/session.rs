use tokio::sync::watch;
use tracing::info;

/// The derived "signed in" flag, owned by the session controller.
///
/// Readers get a [`SessionHandle`]; only the owner can change the value.
#[derive(Debug)]
pub struct Session {
    tx: watch::Sender<bool>,
}

impl Session {
    pub fn new(authenticated: bool) -> Self {
        let (tx, _rx) = watch::channel(authenticated);
        Self { tx }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        *self.tx.borrow()
    }

    /// Publish a new value. Subscribers are only woken on an actual change.
    pub(crate) fn set(&self, authenticated: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == authenticated {
                false
            } else {
                *current = authenticated;
                true
            }
        });
        if changed {
            info!(authenticated, "Session state changed");
        }
    }
}

/// Read/subscribe view of the session flag. Clone freely.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn is_authenticated(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next change and return the new value. Returns `None`
    /// once the owning session has been dropped.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    /// A raw receiver, for callers that want to select over it.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_reads_current_value() {
        let session = Session::new(false);
        let handle = session.handle();
        assert!(!handle.is_authenticated());

        session.set(true);
        assert!(handle.is_authenticated());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let session = Session::new(false);
        let mut handle = session.handle();

        session.set(true);
        assert_eq!(handle.changed().await, Some(true));
    }

    #[tokio::test]
    async fn test_setting_same_value_does_not_notify() {
        let session = Session::new(true);
        let handle = session.handle();
        let rx = handle.subscribe();

        session.set(true);
        assert!(!rx.has_changed().unwrap());

        session.set(false);
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_changed_ends_when_session_dropped() {
        let session = Session::new(false);
        let mut handle = session.handle();
        drop(session);
        assert_eq!(handle.changed().await, None);
    }
}
