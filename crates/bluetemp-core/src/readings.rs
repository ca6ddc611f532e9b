//! Characteristic reads.
//!
//! Each read is a single transport call raced against link loss. The
//! payload is decoded with [`bluetemp_types::codec`]; an empty payload is
//! rejected rather than reported as a value.

use futures::future::try_join_all;
use tracing::{debug, warn};

use bluetemp_types::{Reading, Role, codec};

use crate::connection::CharacteristicSet;
use crate::error::{Error, Result};
use crate::events::LinkState;
use crate::peripheral::{PeripheralHandle, disconnected};
use crate::traits::Characteristic;

/// Read one characteristic and decode it as `role`.
///
/// # Errors
///
/// - [`Error::UnsolicitedDisconnect`] if the link is down, or drops before
///   the read completes
/// - [`Error::Transport`] if the read itself fails
/// - [`Error::UnreadableResponse`] if the payload is empty
#[tracing::instrument(skip(peripheral, characteristic), fields(peripheral = %peripheral.id()))]
pub async fn read_value(
    peripheral: &PeripheralHandle,
    role: Role,
    characteristic: &Characteristic,
) -> Result<Reading> {
    let mut link = peripheral.subscribe_link();
    if *link.borrow_and_update() == LinkState::Disconnected {
        return Err(Error::UnsolicitedDisconnect);
    }

    let payload = tokio::select! {
        biased;
        () = disconnected(&mut link) => {
            warn!("Peripheral disconnected during read");
            return Err(Error::UnsolicitedDisconnect);
        }
        result = peripheral.peripheral().read(characteristic) => {
            result.map_err(|e| Error::transport("read", e))?
        }
    };
    debug!(len = payload.len(), "Read complete");

    let value = codec::decode(&payload).ok_or(Error::UnreadableResponse { role })?;
    Ok(Reading::new(role, value))
}

/// Read every role in `roles` concurrently.
///
/// Results come back in the order of `roles`. The first failure wins and
/// the remaining reads are dropped.
///
/// # Errors
///
/// [`Error::CharacteristicUnavailable`] if `characteristics` has no handle
/// for one of the roles, otherwise the first error from [`read_value`].
pub async fn read_all(
    peripheral: &PeripheralHandle,
    characteristics: &CharacteristicSet,
    roles: &[Role],
) -> Result<Vec<Reading>> {
    let reads = roles
        .iter()
        .map(|&role| {
            let characteristic = characteristics
                .get(role)
                .ok_or(Error::CharacteristicUnavailable { role })?;
            Ok(read_value(peripheral, role, characteristic))
        })
        .collect::<Result<Vec<_>>>()?;

    try_join_all(reads).await
}
