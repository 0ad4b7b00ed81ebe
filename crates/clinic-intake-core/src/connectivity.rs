//! Online/offline state tracking.
//!
//! The host environment reports reachability changes (OS network callback);
//! the monitor turns them into state transitions and notifies subscribers.
//! Nothing but the monitor writes the state.

use std::sync::mpsc::Receiver;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::events::EventFanout;

/// Process-wide connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    /// Map an environment reachability reading. Unknown counts as online;
    /// the first failed request corrects it.
    pub fn from_reachability(reachable: Option<bool>) -> Self {
        match reachable {
            Some(false) => ConnectivityState::Offline,
            Some(true) | None => ConnectivityState::Online,
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ConnectivityState::Online)
    }
}

/// A connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityEvent {
    /// Back online; a sync attempt should be made
    WentOnline,
    /// Lost connectivity; writes should be deferred to the queue
    WentOffline,
}

/// Owner of [`ConnectivityState`].
pub struct ConnectivityMonitor {
    state: RwLock<ConnectivityState>,
    subscribers: EventFanout<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        Self {
            state: RwLock::new(initial),
            subscribers: EventFanout::new(),
        }
    }

    /// Start from an environment reading taken at startup.
    pub fn from_environment(reachable: Option<bool>) -> Self {
        Self::new(ConnectivityState::from_reachability(reachable))
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Receive every future transition.
    pub fn subscribe(&self) -> Receiver<ConnectivityEvent> {
        self.subscribers.subscribe()
    }

    /// Apply a reachability signal from the environment.
    ///
    /// Returns the transition, if any. Repeating the current state is not a
    /// transition and notifies nobody.
    pub fn report(&self, reachable: bool) -> Option<ConnectivityEvent> {
        let next = ConnectivityState::from_reachability(Some(reachable));
        {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if *state == next {
                return None;
            }
            *state = next;
        }

        let event = match next {
            ConnectivityState::Online => {
                info!("connectivity: back online");
                ConnectivityEvent::WentOnline
            }
            ConnectivityState::Offline => {
                warn!("connectivity: gone offline, deferring writes");
                ConnectivityEvent::WentOffline
            }
        };
        self.subscribers.publish(event);
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_online() {
        assert_eq!(
            ConnectivityState::from_reachability(None),
            ConnectivityState::Online
        );
        assert!(ConnectivityMonitor::from_environment(None).is_online());
        assert!(!ConnectivityMonitor::from_environment(Some(false)).is_online());
    }

    #[test]
    fn test_transitions_notify() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Online);
        let events = monitor.subscribe();

        assert_eq!(monitor.report(false), Some(ConnectivityEvent::WentOffline));
        assert_eq!(monitor.state(), ConnectivityState::Offline);
        assert_eq!(monitor.report(true), Some(ConnectivityEvent::WentOnline));

        assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::WentOffline);
        assert_eq!(events.try_recv().unwrap(), ConnectivityEvent::WentOnline);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_repeat_signal_is_not_a_transition() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let events = monitor.subscribe();

        assert_eq!(monitor.report(false), None);
        assert!(events.try_recv().is_err());

        assert_eq!(monitor.report(true), Some(ConnectivityEvent::WentOnline));
        assert_eq!(monitor.report(true), None);
        assert_eq!(events.try_iter().count(), 1);
    }
}
