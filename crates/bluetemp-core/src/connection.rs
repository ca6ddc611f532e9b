//! Connection setup.
//!
//! A [`ConnectionSession`] connects to a discovered peripheral, enumerates
//! the sensing service and collects a handle for every requested role into
//! a [`CharacteristicSet`]. It resolves the moment the set is complete.
//!
//! The attempt is bounded by a deadline armed when connect is issued. Every
//! failure (error, timeout, link loss or cancellation) disconnects the
//! peripheral and forgets the attempt. A success is kept until
//! [`ConnectionSession::reset`] or until the link is seen to be down.
//!
//! A caller that joins an attempt started for fewer roles enumerates the
//! missing ones itself over the same link.

use std::collections::BTreeMap;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use bluetemp_types::{Role, uuids};

use crate::error::{Error, Result};
use crate::events::LinkState;
use crate::guard::{DEFAULT_CONNECTION_TIMEOUT, Deadline};
use crate::peripheral::{PeripheralHandle, disconnected};
use crate::pending::{Pending, PendingSlot, SlotState};
use crate::traits::Characteristic;

use std::sync::Arc;

/// Options for connection setup.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Service UUID holding the characteristics.
    pub service: Uuid,
    /// How long setup may take before it is abandoned.
    pub timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            service: uuids::ENVIRONMENTAL_SENSING_SERVICE,
            timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl ConnectOptions {
    /// Create connect options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service UUID.
    #[must_use]
    pub fn service(mut self, service: Uuid) -> Self {
        self.service = service;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Characteristic handles keyed by role.
///
/// Built up as enumeration results arrive; complete once every requested
/// role has a handle.
#[derive(Debug, Clone, Default)]
pub struct CharacteristicSet {
    requested: Vec<Role>,
    handles: BTreeMap<Role, Characteristic>,
}

impl CharacteristicSet {
    /// Create an empty set for `roles`. Duplicates are ignored.
    pub fn new(roles: &[Role]) -> Self {
        let mut requested = Vec::with_capacity(roles.len());
        for role in roles {
            if !requested.contains(role) {
                requested.push(*role);
            }
        }
        Self {
            requested,
            handles: BTreeMap::new(),
        }
    }

    /// Classify a characteristic and keep it if its role was requested.
    ///
    /// The first handle found for a role wins.
    pub fn insert(&mut self, characteristic: Characteristic) -> Option<Role> {
        let role = Role::from_characteristic(&characteristic.uuid)?;
        if !self.requested.contains(&role) || self.handles.contains_key(&role) {
            return None;
        }
        self.handles.insert(role, characteristic);
        Some(role)
    }

    /// Whether every requested role has a handle.
    pub fn is_complete(&self) -> bool {
        self.requested.iter().all(|role| self.handles.contains_key(role))
    }

    /// The handle for `role`, if found.
    pub fn get(&self, role: Role) -> Option<&Characteristic> {
        self.handles.get(&role)
    }

    /// The roles this set was built for.
    pub fn requested(&self) -> &[Role] {
        &self.requested
    }

    /// A copy of this set that also requests `roles`.
    pub fn extended(&self, roles: &[Role]) -> Self {
        let mut set = self.clone();
        for role in roles {
            if !set.requested.contains(role) {
                set.requested.push(*role);
            }
        }
        set
    }

    /// Whether this set was built for every role in `roles`.
    pub fn covers(&self, roles: &[Role]) -> bool {
        roles.iter().all(|role| self.requested.contains(role))
    }

    /// Requested roles with no handle yet.
    pub fn missing(&self) -> impl Iterator<Item = Role> + '_ {
        self.requested
            .iter()
            .copied()
            .filter(|role| !self.handles.contains_key(role))
    }

    /// Number of roles with a handle.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no role has a handle.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// De-duplicated connection setup for one peripheral at a time.
pub struct ConnectionSession {
    options: ConnectOptions,
    slot: Arc<PendingSlot<CharacteristicSet>>,
}

impl ConnectionSession {
    /// Create a connection session.
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            options,
            slot: PendingSlot::new("connection"),
        }
    }

    /// The options this session connects with.
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Connect to `peripheral` and resolve handles for `roles`.
    ///
    /// Joins an attempt already in flight, or returns the kept result of
    /// an earlier one while its link is still up.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if setup outlives the deadline
    /// - [`Error::Transport`] if connect or enumeration fails
    /// - [`Error::NoServicesFound`] / [`Error::NoCharacteristicsFound`] if
    ///   enumeration comes back empty
    /// - [`Error::CharacteristicUnavailable`] if enumeration ends without a
    ///   handle for some role
    /// - [`Error::UnsolicitedDisconnect`] if the link drops during setup
    #[tracing::instrument(skip_all, fields(peripheral = %peripheral.id()))]
    pub async fn connect(
        &self,
        peripheral: &PeripheralHandle,
        roles: &[Role],
    ) -> Result<CharacteristicSet> {
        if let SlotState::Resolved(_) = self.slot.state() {
            if peripheral.link_state() == LinkState::Disconnected {
                debug!("Discarding connection to a dropped link");
                self.slot.reset();
            }
        }

        let waiter = self.slot.join_or_start(|pending| {
            tokio::spawn(run_connection(
                peripheral.clone(),
                roles.to_vec(),
                self.options.clone(),
                pending,
            ));
        });
        let set = waiter.wait().await?;
        if set.covers(roles) {
            return Ok(set);
        }

        debug!(requested = ?set.requested(), ?roles, "Resolving roles missing from joined connection");
        let extended = set.extended(roles);
        let mut link = peripheral.subscribe_link();
        tokio::select! {
            biased;
            () = disconnected(&mut link) => Err(Error::UnsolicitedDisconnect),
            result = tokio::time::timeout(self.options.timeout, resolve(peripheral, extended, &self.options)) => {
                result.unwrap_or_else(|_| {
                    Err(Error::connection_timeout(peripheral.id(), self.options.timeout))
                })
            }
        }
    }

    /// Forget the kept connection so the next call connects again.
    ///
    /// An attempt still in flight fails with [`Error::Cancelled`] and
    /// disconnects once its driver notices.
    pub fn reset(&self) -> bool {
        self.slot.cancel()
    }

    /// What the session currently holds.
    pub fn state(&self) -> SlotState<CharacteristicSet> {
        self.slot.state()
    }
}

async fn run_connection(
    peripheral: PeripheralHandle,
    roles: Vec<Role>,
    options: ConnectOptions,
    pending: Pending<CharacteristicSet>,
) {
    peripheral.mark_connecting();
    let mut link = peripheral.subscribe_link();

    let mut deadline = {
        let expiring = pending.clone();
        let timeout = options.timeout;
        let id = peripheral.id().to_string();
        Deadline::arm(timeout, async move {
            if expiring.settle(Err(Error::connection_timeout(id.as_str(), timeout))) {
                warn!(
                    "Connection to peripheral {} timed out after {}ms",
                    id,
                    timeout.as_millis()
                );
            }
        })
    };

    let outcome = tokio::select! {
        biased;
        () = pending.settled() => None,
        () = disconnected(&mut link) => {
            warn!("Peripheral disconnected during connection setup");
            Some(Err(Error::UnsolicitedDisconnect))
        }
        result = establish(&peripheral, &roles, &options) => Some(result),
    };

    deadline.disarm();
    if let Some(outcome) = outcome {
        pending.settle(outcome);
    }

    match pending.outcome() {
        Some(Ok(set)) => {
            info!(roles = ?set.requested(), "Connected");
        }
        _ => {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "Failed to disconnect after failed connection");
            }
        }
    }
}

async fn establish(
    peripheral: &PeripheralHandle,
    roles: &[Role],
    options: &ConnectOptions,
) -> Result<CharacteristicSet> {
    debug!("Connecting");
    peripheral.connect().await?;
    resolve(peripheral, CharacteristicSet::new(roles), options).await
}

/// Enumerate the service and fill in every role `set` is still missing.
async fn resolve(
    peripheral: &PeripheralHandle,
    mut set: CharacteristicSet,
    options: &ConnectOptions,
) -> Result<CharacteristicSet> {
    let device = peripheral.peripheral();
    let services = device
        .discover_services(&[options.service])
        .await
        .map_err(|e| Error::transport("discover services", e))?;
    debug!(count = services.len(), "Services discovered");
    if services.is_empty() {
        return Err(Error::NoServicesFound);
    }
    if set.is_complete() {
        return Ok(set);
    }

    let filter: Vec<Uuid> = set.missing().map(|role| role.characteristic()).collect();
    let mut enumerations: FuturesUnordered<_> = services
        .iter()
        .map(|service| device.discover_characteristics(service, &filter))
        .collect();

    while let Some(result) = enumerations.next().await {
        let characteristics =
            result.map_err(|e| Error::transport("discover characteristics", e))?;
        if characteristics.is_empty() {
            return Err(Error::NoCharacteristicsFound);
        }
        for characteristic in characteristics {
            if let Some(role) = set.insert(characteristic) {
                debug!(%role, "Characteristic found");
            }
        }
        if set.is_complete() {
            return Ok(set);
        }
    }

    Err(set
        .missing()
        .next()
        .map_or(Error::NoCharacteristicsFound, |role| {
            Error::CharacteristicUnavailable { role }
        }))
}
