//! Port allocation descriptors shared by the create and repair paths.

use serde_json::Value;

use crate::adapter::SelectedAdapter;
use crate::classes::{ETHERNET_CONNECTION_SUBTYPE, PORT_ALLOCATION, property};
use crate::error::SwitchError;
use crate::plane::{ManagementPlane, PlaneError};

/// Customisation applied to the port allocation class default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescriptor {
    /// Port display name.
    pub element_name: String,
    /// Object path the port binds to.
    pub host_resource: String,
    /// Hardware address assigned to the port, if any.
    pub address: Option<String>,
}

impl PortDescriptor {
    /// External port binding the switch to the physical adapter.
    #[must_use]
    pub fn external(switch_name: &str, port_path: &str) -> Self {
        Self {
            element_name: format!("{switch_name} external port"),
            host_resource: port_path.to_owned(),
            address: None,
        }
    }

    /// Internal port giving the host operating system a leg on the switch.
    #[must_use]
    pub fn internal(switch_name: &str, host_path: &str, address: &str) -> Self {
        Self {
            element_name: switch_name.to_owned(),
            host_resource: host_path.to_owned(),
            address: Some(address.to_owned()),
        }
    }

    /// Materialises the descriptor as a serialised port allocation instance.
    ///
    /// # Errors
    ///
    /// Returns the plane error of the template lookup or serialisation.
    pub fn render<P>(&self, plane: &P) -> Result<String, PlaneError>
    where
        P: ManagementPlane + ?Sized,
    {
        let mut port = plane.default_instance(PORT_ALLOCATION, ETHERNET_CONNECTION_SUBTYPE)?;
        port.set(property::ELEMENT_NAME, self.element_name.as_str());
        port.set(
            property::HOST_RESOURCE,
            Value::Array(vec![Value::from(self.host_resource.as_str())]),
        );
        if let Some(address) = &self.address {
            port.set(property::ADDRESS, address.as_str());
        }
        plane.serialize(&port)
    }
}

/// Serialised external and internal ports, in submission order.
pub(crate) fn render_ports<P>(
    plane: &P,
    switch_name: &str,
    selected: &SelectedAdapter,
) -> Result<Vec<String>, SwitchError>
where
    P: ManagementPlane + ?Sized,
{
    let port_path = selected
        .port_path()
        .map_err(SwitchError::plane("resolve adapter port path"))?;
    let address = selected
        .permanent_address()
        .map_err(SwitchError::plane("read adapter address"))?;
    let host_path = plane
        .host_system_path()
        .map_err(SwitchError::plane("resolve host system"))?;

    let external = PortDescriptor::external(switch_name, port_path)
        .render(plane)
        .map_err(SwitchError::plane("render external port"))?;
    let internal = PortDescriptor::internal(switch_name, &host_path, address)
        .render(plane)
        .map_err(SwitchError::plane("render internal port"))?;
    Ok(vec![external, internal])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakePlane;
    use crate::plane::Instance;
    use serde_json::json;

    #[test]
    fn external_port_binds_adapter_port() {
        let plane = FakePlane::new();
        let text = PortDescriptor::external("Bridge", "port/1")
            .render(&plane)
            .expect("port renders");
        let port: Instance = serde_json::from_str(&text).expect("fake serialises as json");

        assert!(port.property_equals("ElementName", &json!("Bridge external port")));
        assert!(port.property_equals("HostResource", &json!(["port/1"])));
        assert!(port.property("Address").is_none());
        assert!(port.property_equals("ResourceSubType", &json!(ETHERNET_CONNECTION_SUBTYPE)));
    }

    #[test]
    fn internal_port_carries_address() {
        let plane = FakePlane::new();
        let text = PortDescriptor::internal("Bridge", "host", "00155D000001")
            .render(&plane)
            .expect("port renders");
        let port: Instance = serde_json::from_str(&text).expect("fake serialises as json");

        assert!(port.property_equals("ElementName", &json!("Bridge")));
        assert!(port.property_equals("Address", &json!("00155D000001")));
    }
}
