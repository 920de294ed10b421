//! Create, repair and removal of the managed virtual switch.
//!
//! The switch is a singleton identified by its element name. Every mutation
//! is awaited through the [`JobWaiter`] before the next step runs, and
//! nothing is rolled back when a later step fails.

mod descriptors;

use tracing::{debug, info};

use crate::adapter::AdapterSelector;
use crate::classes::{PORT_ALLOCATION, SWITCH_SETTINGS, VIRTUAL_SWITCH, property};
use crate::error::SwitchError;
use crate::job::JobWaiter;
use crate::plane::{Filter, Instance, ManagementPlane, MethodCall, PlaneError};

pub use self::descriptors::PortDescriptor;
use self::descriptors::render_ports;

const RECONCILE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reconcile");

/// Default annotation stored on a switch created by the reconciler.
pub const DEFAULT_SWITCH_NOTE: &str = "vSwitch for mysterium node";

/// A virtual switch as currently present on the host.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualSwitch {
    name: String,
    instance: Instance,
}

impl VirtualSwitch {
    /// Element name of the switch.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Object path of the switch.
    ///
    /// # Errors
    ///
    /// Returns [`PlaneError::MissingPath`] when the plane returned no path.
    pub fn path(&self) -> Result<&str, PlaneError> {
        self.instance.path()
    }

    /// Underlying management-plane object.
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

/// Reconciles the host's switch configuration against the desired state.
#[derive(Debug)]
pub struct SwitchReconciler<P> {
    plane: P,
    switch_name: String,
    note: String,
    waiter: JobWaiter,
}

impl<P> SwitchReconciler<P>
where
    P: ManagementPlane,
{
    /// Creates a reconciler managing the switch called `switch_name`.
    pub fn new(plane: P, switch_name: impl Into<String>, waiter: JobWaiter) -> Self {
        Self {
            plane,
            switch_name: switch_name.into(),
            note: DEFAULT_SWITCH_NOTE.to_owned(),
            waiter,
        }
    }

    /// Replaces the note written to newly created switches.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Name of the managed switch.
    #[must_use]
    pub fn switch_name(&self) -> &str {
        self.switch_name.as_str()
    }

    /// Management plane the reconciler operates on.
    #[must_use]
    pub const fn plane(&self) -> &P {
        &self.plane
    }

    /// Looks up a switch by exact element name. Never mutates.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::NotFound`] when no switch carries the name and
    /// [`SwitchError::OperationFailed`] when the query fails.
    pub fn get_switch(&self, name: &str) -> Result<VirtualSwitch, SwitchError> {
        match self
            .plane
            .query(VIRTUAL_SWITCH, &[Filter::equals(property::ELEMENT_NAME, name)])
        {
            Ok(instance) => Ok(VirtualSwitch {
                name: name.to_owned(),
                instance,
            }),
            Err(error) if error.is_not_found() => Err(SwitchError::NotFound {
                name: name.to_owned(),
            }),
            Err(error) => Err(SwitchError::plane("query virtual switch")(error)),
        }
    }

    /// Like [`Self::get_switch`] with absence folded into `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::OperationFailed`] when the query fails.
    pub fn find_switch(&self, name: &str) -> Result<Option<VirtualSwitch>, SwitchError> {
        match self.get_switch(name) {
            Ok(switch) => Ok(Some(switch)),
            Err(error) if error.is_not_found() => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Destroys the managed switch. A missing switch is success.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError`] when the lookup, the call or its job fails.
    pub fn remove_switch(&self) -> Result<(), SwitchError> {
        let Some(switch) = self.find_switch(&self.switch_name)? else {
            debug!(target: RECONCILE_TARGET, switch = %self.switch_name, "switch already absent");
            return Ok(());
        };
        let system = switch
            .path()
            .map_err(SwitchError::plane("resolve switch path"))?
            .to_owned();

        self.submit("DestroySystem", &MethodCall::DestroySystem { system })?;
        info!(target: RECONCILE_TARGET, switch = %self.switch_name, "switch removed");
        Ok(())
    }

    /// Rebinds the managed switch to the preferred adapter, creating it when absent.
    ///
    /// Both replacement ports are built before the existing ones are removed,
    /// so a missing adapter leaves the switch untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Unresolved`] when no adapter matches, and other
    /// [`SwitchError`] variants when a lookup, call or job fails.
    pub fn modify_switch_settings(&self, prefer_ethernet: bool) -> Result<(), SwitchError> {
        let Some(switch) = self.find_switch(&self.switch_name)? else {
            return self.create_external_switch_if_missing(prefer_ethernet);
        };

        let settings = self
            .plane
            .associators(switch.instance(), SWITCH_SETTINGS)
            .map_err(SwitchError::plane("read switch settings"))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                SwitchError::plane("read switch settings")(PlaneError::not_found(
                    SWITCH_SETTINGS.name,
                ))
            })?;
        let settings_path = settings
            .path()
            .map_err(SwitchError::plane("resolve switch settings path"))?
            .to_owned();
        let existing_ports = self
            .plane
            .associators(&settings, PORT_ALLOCATION)
            .map_err(SwitchError::plane("read switch ports"))?
            .iter()
            .map(|port| port.path().map(str::to_owned))
            .collect::<Result<Vec<_>, _>>()
            .map_err(SwitchError::plane("resolve switch port path"))?;

        let selected =
            AdapterSelector::new(&self.plane).find_default_network_adapter(prefer_ethernet)?;
        let ports = render_ports(&self.plane, &self.switch_name, &selected)?;

        if existing_ports.is_empty() {
            debug!(target: RECONCILE_TARGET, switch = %self.switch_name, "no ports to remove");
        } else {
            self.submit(
                "RemoveResourceSettings",
                &MethodCall::RemoveResourceSettings {
                    resource_settings: existing_ports,
                },
            )?;
        }
        self.submit(
            "AddResourceSettings",
            &MethodCall::AddResourceSettings {
                affected_configuration: settings_path,
                resource_settings: ports,
            },
        )?;
        info!(
            target: RECONCILE_TARGET,
            switch = %self.switch_name,
            adapter = %selected.adapter.name,
            "switch rebound"
        );
        Ok(())
    }

    /// Creates the managed switch bound to the preferred adapter unless it exists.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchError::Unresolved`] when no adapter matches, and other
    /// [`SwitchError`] variants when a lookup, call or job fails.
    pub fn create_external_switch_if_missing(&self, prefer_ethernet: bool) -> Result<(), SwitchError> {
        if self.find_switch(&self.switch_name)?.is_some() {
            debug!(target: RECONCILE_TARGET, switch = %self.switch_name, "switch already present");
            return Ok(());
        }

        let mut settings = self
            .plane
            .spawn_instance(SWITCH_SETTINGS)
            .map_err(SwitchError::plane("spawn switch settings"))?;
        settings.set(property::ELEMENT_NAME, self.switch_name.as_str());
        settings.set(property::NOTES, vec![self.note.clone()]);
        let system_settings = self
            .plane
            .serialize(&settings)
            .map_err(SwitchError::plane("serialize switch settings"))?;

        let selected =
            AdapterSelector::new(&self.plane).find_default_network_adapter(prefer_ethernet)?;
        let resource_settings = render_ports(&self.plane, &self.switch_name, &selected)?;

        self.submit(
            "DefineSystem",
            &MethodCall::DefineSystem {
                system_settings,
                resource_settings,
            },
        )?;
        info!(
            target: RECONCILE_TARGET,
            switch = %self.switch_name,
            adapter = %selected.adapter.name,
            "switch created"
        );
        Ok(())
    }

    fn submit(&self, operation: &'static str, call: &MethodCall) -> Result<(), SwitchError> {
        let outcome = self
            .plane
            .invoke(call)
            .map_err(SwitchError::plane(operation))?;
        self.waiter
            .await_outcome(&self.plane, outcome)
            .map_err(SwitchError::job(operation))
    }
}
