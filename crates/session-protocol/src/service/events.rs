//! Bus notification handling.
//!
//! Notifications enter the worker queue alongside commands and are applied
//! here, one at a time.

use shared_types::entities::{Advertisement, BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::{BusNotification, Disposition, InboundSignal};
use tracing::{debug, info, trace, warn};

use crate::domain::{CoordinatorEvent, SessionOrigin};
use crate::service::messenger::Delivery;
use crate::service::SessionCoordinator;

impl SessionCoordinator {
    /// Apply one notification from the bus runtime.
    pub async fn on_notification(&mut self, notification: BusNotification) {
        trace!(kind = notification.kind(), "Notification");
        match notification {
            BusNotification::FoundAdvertisedName(advert) => self.on_found(advert).await,
            BusNotification::LostAdvertisedName(advert) => self.on_lost(advert),
            BusNotification::SessionJoined {
                port,
                session_id,
                joiner,
            } => self.on_session_joined(port, session_id, joiner).await,
            BusNotification::SessionLost { session_id } => self.on_session_lost(session_id),
            BusNotification::Signal(signal) => {
                self.on_signal(&signal);
            }
            BusNotification::NameOwnerChanged {
                name, new_owner, ..
            } => self.on_name_owner_changed(&name, new_owner.as_ref()),
            BusNotification::BusStopping => self.on_bus_stopping(),
        }
    }

    async fn on_found(&mut self, advert: Advertisement) {
        if self.stopping_discovery {
            debug!(name = %advert.name, "Discovery stopping; found ignored");
            return;
        }
        let Some(advert) = self.discovery.on_found(&self.names, advert) else {
            return;
        };
        info!(name = %advert.name, prefix = %advert.prefix, transport = %advert.transport, "Found channel");
        let name = advert.name.clone();
        self.publish(CoordinatorEvent::PeerFound(advert));

        if self.names.is_owned(&name) || self.names.is_advertised(&name) {
            debug!(name = %name, "Found our own advertisement; not joining");
            return;
        }
        if !self.config.auto_join {
            return;
        }
        if self.table.joined_to(&name).is_some() {
            debug!(name = %name, "Already joined; not joining again");
            return;
        }

        let port = self.config.contact_port;
        if let Err(error) = self.join_session(name.clone(), port).await {
            warn!(name = %name, %error, "Automatic join failed");
            self.publish(CoordinatorEvent::JoinFailed { name, error });
        }
    }

    fn on_lost(&mut self, advert: Advertisement) {
        let Some(advert) = self.discovery.on_lost(advert) else {
            trace!("Lost without a preceding found; swallowed");
            return;
        };
        info!(name = %advert.name, prefix = %advert.prefix, "Lost channel");
        self.publish(CoordinatorEvent::PeerLost(advert));
    }

    async fn on_session_joined(&mut self, port: SessionPort, session_id: SessionId, joiner: BusId) {
        match self
            .table
            .record_implicit(&self.binder, port, session_id, joiner.clone())
        {
            Ok(created) => {
                info!(session_id = %session_id, port = %port, joiner = %joiner, "Joiner admitted");
                if created {
                    self.publish(CoordinatorEvent::SessionJoined {
                        session_id,
                        origin: SessionOrigin::Implicit,
                    });
                }
                self.refresh_state();
            }
            Err(error) => {
                warn!(session_id = %session_id, port = %port, %error, "Joiner arrived on an unbound port");
                if self.table.is_joined(session_id) {
                    return;
                }
                match self.runtime.leave_session(session_id).await {
                    Disposition::Success | Disposition::NotFound => {
                        debug!(session_id = %session_id, "Left session of an unbound port");
                    }
                    other => {
                        warn!(session_id = %session_id, disposition = %other, "Leaving stray session failed");
                    }
                }
            }
        }
    }

    fn on_session_lost(&mut self, session_id: SessionId) {
        let outcome = self.table.on_lost(session_id);
        if !outcome.is_known() {
            debug!(session_id = %session_id, "Loss of an untracked session");
            return;
        }
        info!(
            session_id = %session_id,
            joined = outcome.was_joined,
            hosted = outcome.was_hosted,
            "Session lost"
        );
        self.publish(CoordinatorEvent::SessionLost { session_id });
        self.publish_canonical(outcome.canonical);
        self.refresh_state();
    }

    /// Filter and dispatch an inbound signal.
    pub fn on_signal(&mut self, signal: &InboundSignal) -> Delivery {
        let canonical = self.table.canonical();
        self.messenger.on_receive(signal, canonical, &self.local)
    }

    fn on_name_owner_changed(&mut self, name: &WellKnownName, new_owner: Option<&BusId>) {
        if !self.names.on_owner_changed(name, new_owner, &self.local) {
            return;
        }
        warn!(name = %name, new_owner = ?new_owner, "Lost ownership of name");
        if self.hosted_name.as_ref() == Some(name) {
            self.hosted_name = None;
        }
        self.refresh_state();
    }

    fn on_bus_stopping(&mut self) {
        warn!(unique_name = %self.local, "Bus stopping; dropping protocol state");
        self.reset();
        self.publish(CoordinatorEvent::BusStopping);
    }
}
