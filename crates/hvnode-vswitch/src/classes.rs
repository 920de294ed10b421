//! Class, property and subtype names used by the reconciler.

use crate::plane::{ClassRef, Namespace};

/// Physical network adapters known to the operating system.
pub const NETWORK_ADAPTER: ClassRef = ClassRef::new(Namespace::Cimv2, "Win32_NetworkAdapter");
/// Driver-reported physical medium per adapter instance name.
pub const PHYSICAL_MEDIUM: ClassRef = ClassRef::new(Namespace::Wmi, "MSNdis_PhysicalMediumType");
/// Wired port the hypervisor can bind a switch to.
pub const EXTERNAL_ETHERNET_PORT: ClassRef =
    ClassRef::new(Namespace::Virtualization, "Msvm_ExternalEthernetPort");
/// Wireless port the hypervisor can bind a switch to.
pub const WIFI_PORT: ClassRef = ClassRef::new(Namespace::Virtualization, "Msvm_WiFiPort");
/// Virtual switch.
pub const VIRTUAL_SWITCH: ClassRef =
    ClassRef::new(Namespace::Virtualization, "Msvm_VirtualEthernetSwitch");
/// Virtual switch settings.
pub const SWITCH_SETTINGS: ClassRef =
    ClassRef::new(Namespace::Virtualization, "Msvm_VirtualEthernetSwitchSettingData");
/// Switch port allocation settings.
pub const PORT_ALLOCATION: ClassRef =
    ClassRef::new(Namespace::Virtualization, "Msvm_EthernetPortAllocationSettingData");

/// Resource subtype selecting the ethernet connection port template.
pub const ETHERNET_CONNECTION_SUBTYPE: &str = "Microsoft:Hyper-V:Ethernet Connection";
/// Prefix joining an adapter GUID to a hypervisor port `DeviceID`.
pub const DEVICE_ID_PREFIX: &str = "Microsoft:";
/// Service-name prefix of the hypervisor's own virtual adapters.
pub const VIRTUAL_SERVICE_PREFIX: &str = "vm";

pub(crate) mod property {
    pub const ADDRESS: &str = "Address";
    pub const DEVICE_ID: &str = "DeviceID";
    pub const ELEMENT_NAME: &str = "ElementName";
    pub const GUID: &str = "GUID";
    pub const HOST_RESOURCE: &str = "HostResource";
    pub const INSTANCE_NAME: &str = "InstanceName";
    pub const NAME: &str = "Name";
    pub const NDIS_PHYSICAL_MEDIUM: &str = "NdisPhysicalMediumType";
    pub const NOTES: &str = "Notes";
    pub const PERMANENT_ADDRESS: &str = "PermanentAddress";
    pub const PHYSICAL_ADAPTER: &str = "PhysicalAdapter";
    pub const SERVICE_NAME: &str = "ServiceName";
}
