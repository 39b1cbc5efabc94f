use shared_types::entities::{BusId, SessionId, WellKnownName};
use shared_types::ipc::Disposition;
use tracing::{info, warn};

use crate::domain::{CoordinatorEvent, ProtocolError};
use crate::service::SessionCoordinator;

/// Keep the first error of a multi-step operation, log the rest.
fn keep_first(first: &mut Option<ProtocolError>, step: &'static str, result: Result<(), ProtocolError>) {
    if let Err(error) = result {
        warn!(step, %error, "Teardown step failed");
        first.get_or_insert(error);
    }
}

impl SessionCoordinator {
    /// Connect the attachment. Connecting twice is harmless.
    pub async fn connect(&mut self) -> Result<BusId, ProtocolError> {
        match self.runtime.connect().await {
            Disposition::Success | Disposition::AlreadyExists => {
                if !self.connected {
                    self.connected = true;
                    info!(unique_name = %self.local, "Connected to bus");
                    self.publish(CoordinatorEvent::Connected {
                        unique_name: self.local.clone(),
                    });
                }
                Ok(self.local.clone())
            }
            other => Err(ProtocolError::runtime("connect", other)),
        }
    }

    /// Request `<prefix>.<instance>`, bind the contact port, advertise.
    ///
    /// A failing step undoes the steps before it.
    pub async fn host_channel(&mut self, instance: &str) -> Result<WellKnownName, ProtocolError> {
        self.ensure_connected()?;
        if let Some(hosted) = &self.hosted_name {
            return Err(ProtocolError::invalid_state(
                "host channel",
                format!("already hosting {hosted}"),
            ));
        }
        let name = WellKnownName::from_prefix(&self.config.name_prefix, instance)?;

        self.request_name(name.clone()).await?;
        self.hosted_name = Some(name.clone());
        self.refresh_state();

        let port = match self
            .bind_port(self.config.contact_port, self.policy.clone())
            .await
        {
            Ok(port) => port,
            Err(error) => {
                warn!(name = %name, %error, "Binding contact port failed; releasing name");
                self.rollback_name(&name).await;
                return Err(error);
            }
        };
        self.hosted_port = Some(port);
        self.refresh_state();

        if let Err(error) = self.advertise(name.clone()).await {
            warn!(name = %name, %error, "Advertising failed; rolling back");
            if let Err(unbind) = self.unbind_port(port).await {
                warn!(port = %port, error = %unbind, "Rollback unbind failed");
            }
            self.rollback_name(&name).await;
            return Err(error);
        }

        info!(name = %name, port = %port, "Hosting channel");
        Ok(name)
    }

    async fn rollback_name(&mut self, name: &WellKnownName) {
        if let Err(error) = self.release_name(name.clone()).await {
            warn!(name = %name, %error, "Rollback release failed");
        }
        self.hosted_name = None;
        self.refresh_state();
    }

    /// Cancel the advertisement, unbind the contact port, release the name.
    pub async fn stop_hosting(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        let Some(name) = self.hosted_name.clone() else {
            return Err(ProtocolError::invalid_state("stop hosting", "not hosting a channel"));
        };
        if self.names.is_advertised(&name) {
            self.cancel_advertise(name.clone()).await?;
        }
        if let Some(port) = self.hosted_port {
            self.unbind_port(port).await?;
        }
        self.release_name(name.clone()).await?;
        self.hosted_name = None;
        self.refresh_state();
        info!(name = %name, "Stopped hosting channel");
        Ok(())
    }

    /// Discover the configured name prefix.
    pub async fn start_discovery(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        self.stopping_discovery = false;
        let prefix = self.config.name_prefix.clone();
        self.find_prefix(prefix.clone()).await?;
        info!(prefix = %prefix, "Discovery started");
        Ok(())
    }

    /// Stop discovering the configured name prefix.
    pub async fn stop_discovery(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        self.stopping_discovery = true;
        let prefix = self.config.name_prefix.clone();
        self.cancel_prefix(prefix.clone()).await?;
        info!(prefix = %prefix, "Discovery stopped");
        Ok(())
    }

    /// Join `name` on the contact port. May target our own hosted channel.
    pub async fn use_channel(&mut self, name: &WellKnownName) -> Result<SessionId, ProtocolError> {
        self.join_session(name.clone(), self.config.contact_port).await
    }

    /// Leave the canonical session.
    pub async fn leave_channel(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        let Some(id) = self.table.canonical() else {
            return Err(ProtocolError::invalid_state("leave channel", "no channel in use"));
        };
        self.leave_session(id).await
    }

    /// Full teardown in a fixed order: stop discovery, unbind every port,
    /// leave every membership, cancel discovery prefixes, cancel
    /// advertisements, release names.
    ///
    /// Every step runs even if an earlier one failed; the first error is
    /// returned.
    pub async fn leave(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        info!(unique_name = %self.local, "Tearing down");
        let mut first = None;

        self.stopping_discovery = true;

        for port in self.binder.ports() {
            let result = self.unbind_port(port).await;
            keep_first(&mut first, "unbind", result);
        }

        // A self-joined id is held twice; each membership is left once.
        for (id, origin) in self.table.memberships() {
            let result = match self.runtime.leave_session(id).await {
                Disposition::Success | Disposition::NotFound => Ok(()),
                other => Err(ProtocolError::runtime("leave session", other)),
            };
            if result.is_ok() {
                info!(session_id = %id, ?origin, "Left session");
            }
            keep_first(&mut first, "leave session", result);
        }
        let change = self.table.clear();
        self.publish_canonical(change);

        let prefixes: Vec<String> = self.names.prefixes().cloned().collect();
        for prefix in prefixes {
            let result = self.cancel_prefix(prefix).await;
            keep_first(&mut first, "cancel prefix", result);
        }
        self.discovery.clear();

        let adverts: Vec<WellKnownName> = self.names.advertised_names().cloned().collect();
        for name in adverts {
            let result = self.cancel_advertise(name).await;
            keep_first(&mut first, "cancel advertise", result);
        }

        let owned: Vec<WellKnownName> = self.names.owned_names().cloned().collect();
        for name in owned {
            let result = self.release_name(name).await;
            keep_first(&mut first, "release name", result);
        }

        self.hosted_name = None;
        self.hosted_port = None;
        self.refresh_state();

        match first {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Tear down, then disconnect the attachment.
    pub async fn disconnect(&mut self) -> Result<(), ProtocolError> {
        self.ensure_connected()?;
        let teardown = self.leave().await;
        let disposition = self.runtime.disconnect().await;
        self.reset();
        info!(unique_name = %self.local, "Disconnected from bus");
        teardown?;
        match disposition {
            Disposition::Success | Disposition::NotFound => Ok(()),
            other => Err(ProtocolError::runtime("disconnect", other)),
        }
    }

    /// Drop all protocol state without talking to the runtime.
    pub(crate) fn reset(&mut self) {
        self.connected = false;
        self.stopping_discovery = false;
        self.hosted_name = None;
        self.hosted_port = None;
        self.names.clear();
        self.binder.clear();
        self.discovery.clear();
        let change = self.table.clear();
        self.publish_canonical(change);
        self.refresh_state();
    }
}
