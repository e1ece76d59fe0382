//! Concrete Redfish property definitions. Each is a unit struct naming the
//! Redfish field it reads, its Rust type, and how long a scraped value
//! stays fresh.

use std::time::Duration;

use crate::redfish::property::PropertyDefinition;

macro_rules! define_property {
    ($name:ident, $value:ty, $field:expr, $ttl:expr) => {
        pub struct $name;

        impl PropertyDefinition for $name {
            type Value = $value;
            const NAME: &'static str = $field;
            const CACHE_DURATION: Duration = $ttl;
        }
    };
}

define_property!(PropertyOdataId, String, "@odata.id", Duration::from_secs(3600));
define_property!(PropertyName, String, "Name", Duration::from_secs(3600));
define_property!(PropertyCapacityMib, i64, "CapacityMiB", Duration::from_secs(3600));
define_property!(PropertyLogicalSizeMib, i64, "LogicalSizeMiB", Duration::from_secs(3600));
define_property!(PropertyManufacturer, String, "Manufacturer", Duration::from_secs(3600));
define_property!(PropertyMemoryDeviceType, String, "MemoryDeviceType", Duration::from_secs(3600));
define_property!(PropertyOperatingSpeedMhz, i64, "OperatingSpeedMhz", Duration::from_secs(3600));
define_property!(PropertyPartNumber, String, "PartNumber", Duration::from_secs(3600));
define_property!(PropertyPhysicalContext, String, "PhysicalContext", Duration::from_secs(3600));
define_property!(PropertySerialNumber, String, "SerialNumber", Duration::from_secs(3600));
define_property!(PropertyTotalCores, i64, "TotalCores", Duration::from_secs(3600));
define_property!(PropertyTotalEnabledCores, i64, "TotalEnabledCores", Duration::from_secs(3600));
define_property!(PropertyTotalThreads, i64, "TotalThreads", Duration::from_secs(3600));
define_property!(PropertyMaxSpeedMhz, i64, "MaxSpeedMHz", Duration::from_secs(3600));
define_property!(PropertyLinkStatus, String, "LinkStatus", Duration::from_secs(30));
define_property!(PropertySpeedMbps, i64, "SpeedMbps", Duration::from_secs(30));
define_property!(PropertyMacAddress, String, "MACAddress", Duration::from_secs(3600));
define_property!(PropertyCapacityBytes, i64, "CapacityBytes", Duration::from_secs(3600));
define_property!(PropertyBlockSizeBytes, i64, "BlockSizeBytes", Duration::from_secs(3600));
define_property!(PropertyMediaType, String, "MediaType", Duration::from_secs(3600));
define_property!(PropertyReadingCelsius, i64, "ReadingCelsius", Duration::from_secs(5));
define_property!(PropertyThrottlingCelsius, i64, "ThrottlingCelsius", Duration::from_secs(5));
define_property!(
    PropertyUpperThresholdCritical,
    i64,
    "UpperThresholdCritical",
    Duration::from_secs(5)
);
define_property!(PropertyState, String, "State", Duration::from_secs(60));
