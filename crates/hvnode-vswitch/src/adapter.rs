//! Physical adapter selection.
//!
//! The selector joins the operating system's physical adapters with the
//! driver-reported physical medium, filters out hypervisor-owned and
//! bluetooth adapters, and returns the first candidate of the preferred
//! medium class that exposes a port the hypervisor can bind a switch to.
//! Selection re-reads live state on every call.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::classes::{
    DEVICE_ID_PREFIX, EXTERNAL_ETHERNET_PORT, NETWORK_ADAPTER, PHYSICAL_MEDIUM,
    VIRTUAL_SERVICE_PREFIX, WIFI_PORT, property,
};
use crate::error::SwitchError;
use crate::plane::{Filter, Instance, ManagementPlane, PlaneError};

const ADAPTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::adapter");

/// Physical medium reported by the adapter driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Medium {
    /// Wired 802.3.
    Ethernet,
    /// Native 802.11.
    Wireless,
    /// Bluetooth PAN.
    Bluetooth,
    /// Any other NDIS medium code.
    Other(u32),
}

impl Medium {
    /// Classifies an NDIS physical medium code.
    #[must_use]
    pub const fn from_ndis_code(code: u32) -> Self {
        match code {
            0 => Self::Ethernet,
            9 => Self::Wireless,
            10 => Self::Bluetooth,
            other => Self::Other(other),
        }
    }

    /// Returns `true` when the medium satisfies the wired/non-wired preference.
    #[must_use]
    pub const fn matches_preference(self, prefer_ethernet: bool) -> bool {
        matches!(self, Self::Ethernet) == prefer_ethernet
    }
}

/// A physical network adapter joined with its medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalAdapter {
    /// Stable device GUID.
    pub id: String,
    /// Display name, also the key of the medium lookup.
    pub name: String,
    /// Owning driver service.
    pub service_name: String,
    /// Classified medium.
    pub medium: Medium,
}

impl PhysicalAdapter {
    fn is_hypervisor_owned(&self) -> bool {
        self.service_name
            .get(..VIRTUAL_SERVICE_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(VIRTUAL_SERVICE_PREFIX))
    }
}

/// Adapter chosen for the switch together with its hypervisor port.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedAdapter {
    /// The physical adapter.
    pub adapter: PhysicalAdapter,
    /// The external ethernet or wireless port object.
    pub port: Instance,
}

impl SelectedAdapter {
    /// Object path of the port, used as the external port's host resource.
    ///
    /// # Errors
    ///
    /// Returns [`PlaneError::MissingPath`] when the port has no path.
    pub fn port_path(&self) -> Result<&str, PlaneError> {
        self.port.path()
    }

    /// Hardware address of the port, used as the internal port's address.
    ///
    /// # Errors
    ///
    /// Returns [`PlaneError::MissingProperty`] when the port has no address.
    pub fn permanent_address(&self) -> Result<&str, PlaneError> {
        self.port.str_property(property::PERMANENT_ADDRESS)
    }
}

/// Selects the physical adapter a switch binds to.
#[derive(Debug)]
pub struct AdapterSelector<'a, P: ?Sized> {
    plane: &'a P,
}

impl<'a, P> AdapterSelector<'a, P>
where
    P: ManagementPlane + ?Sized,
{
    /// Creates a selector over the given plane.
    #[must_use]
    pub const fn new(plane: &'a P) -> Self {
        Self { plane }
    }

    /// Returns the first preferred adapter that exposes a switchable port.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Unresolved`] when no candidate resolves, and
    /// [`SwitchError::OperationFailed`] when enumeration fails. A candidate
    /// whose port lookup fails is skipped.
    pub fn find_default_network_adapter(
        &self,
        prefer_ethernet: bool,
    ) -> Result<SelectedAdapter, SwitchError> {
        for adapter in self.candidates(prefer_ethernet)? {
            match self.resolve_port(&adapter.id, prefer_ethernet) {
                Ok(port) => {
                    debug!(
                        target: ADAPTER_TARGET,
                        adapter = %adapter.name,
                        medium = ?adapter.medium,
                        "selected adapter"
                    );
                    return Ok(SelectedAdapter { adapter, port });
                }
                Err(error) if error.is_not_found() => {
                    debug!(
                        target: ADAPTER_TARGET,
                        adapter = %adapter.name,
                        "adapter exposes no switchable port"
                    );
                }
                Err(error) => {
                    warn!(
                        target: ADAPTER_TARGET,
                        adapter = %adapter.name,
                        %error,
                        "port lookup failed; trying next adapter"
                    );
                }
            }
        }
        Err(SwitchError::Unresolved { prefer_ethernet })
    }

    /// Physical adapters eligible for the preference, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::OperationFailed`] when either enumeration fails.
    pub fn candidates(&self, prefer_ethernet: bool) -> Result<Vec<PhysicalAdapter>, SwitchError> {
        let media = self.medium_lookup()?;
        let adapters = self
            .plane
            .query_all(
                NETWORK_ADAPTER,
                &[Filter::equals(property::PHYSICAL_ADAPTER, true)],
            )
            .map_err(SwitchError::plane("enumerate network adapters"))?;

        Ok(adapters
            .iter()
            .filter_map(|instance| read_adapter(instance, &media))
            .filter(|adapter| !adapter.is_hypervisor_owned())
            .filter(|adapter| adapter.medium != Medium::Bluetooth)
            .filter(|adapter| adapter.medium.matches_preference(prefer_ethernet))
            .collect())
    }

    /// Finds the hypervisor port for an adapter GUID.
    ///
    /// Wired preference accepts an external ethernet port. Otherwise, or when
    /// no such port exists, the wireless port is tried.
    ///
    /// # Errors
    ///
    /// Returns the plane error of the last lookup; [`PlaneError::NotFound`]
    /// means the adapter cannot host a switch.
    pub fn resolve_port(
        &self,
        adapter_id: &str,
        prefer_ethernet: bool,
    ) -> Result<Instance, PlaneError> {
        let filters = [Filter::equals(
            property::DEVICE_ID,
            format!("{DEVICE_ID_PREFIX}{adapter_id}"),
        )];
        match self.plane.query(EXTERNAL_ETHERNET_PORT, &filters) {
            Ok(port) if prefer_ethernet => return Ok(port),
            Ok(_) => {}
            Err(error) if error.is_not_found() => {}
            Err(error) => return Err(error),
        }
        self.plane.query(WIFI_PORT, &filters)
    }

    /// Maps adapter instance names to their medium. The first entry per name wins.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::OperationFailed`] when enumeration fails.
    pub fn medium_lookup(&self) -> Result<HashMap<String, Medium>, SwitchError> {
        let entries = self
            .plane
            .query_all(PHYSICAL_MEDIUM, &[])
            .map_err(SwitchError::plane("enumerate physical media"))?;

        let mut lookup = HashMap::with_capacity(entries.len());
        for entry in &entries {
            let name = entry.str_property(property::INSTANCE_NAME);
            let code = entry.i64_property(property::NDIS_PHYSICAL_MEDIUM);
            match (name, code.map(u32::try_from)) {
                (Ok(name), Ok(Ok(code))) => {
                    lookup
                        .entry(name.to_owned())
                        .or_insert_with(|| Medium::from_ndis_code(code));
                }
                _ => warn!(target: ADAPTER_TARGET, ?entry, "skipping unreadable medium entry"),
            }
        }
        Ok(lookup)
    }
}

fn read_adapter(instance: &Instance, media: &HashMap<String, Medium>) -> Option<PhysicalAdapter> {
    let fields = (
        instance.str_property(property::GUID),
        instance.str_property(property::NAME),
        instance.str_property(property::SERVICE_NAME),
    );
    let (Ok(id), Ok(name), Ok(service_name)) = fields else {
        warn!(target: ADAPTER_TARGET, ?instance, "skipping unreadable network adapter");
        return None;
    };
    let Some(medium) = media.get(name).copied() else {
        debug!(target: ADAPTER_TARGET, adapter = %name, "adapter has no known medium");
        return None;
    };
    Some(PhysicalAdapter {
        id: id.to_owned(),
        name: name.to_owned(),
        service_name: service_name.to_owned(),
        medium,
    })
}
