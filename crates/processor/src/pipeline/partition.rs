//! Partition keys for per-device processing

use ingest_types::Event;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the pipeline splits the input before per-partition stages
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// One partition per device
    Device,
    /// One partition per device and event type
    #[default]
    DeviceAndType,
}

/// Key of one partition
///
/// Events without a `deviceId` share the partition whose device is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub device_id: Option<String>,
    pub event_type: Option<String>,
}

impl PartitionKey {
    pub fn for_event(event: &Event, strategy: PartitionStrategy) -> Self {
        let event_type = match strategy {
            PartitionStrategy::Device => None,
            PartitionStrategy::DeviceAndType => event.event_type().map(str::to_string),
        };
        Self {
            device_id: event.device_id().map(str::to_string),
            event_type,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device_id.as_deref().unwrap_or("<no device>"))?;
        if let Some(event_type) = &self.event_type {
            write!(f, "/{event_type}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_types::fields;

    #[test]
    fn test_key_by_strategy() {
        let event = Event::new("basal").with(fields::DEVICE_ID, "pump-1");

        let by_device = PartitionKey::for_event(&event, PartitionStrategy::Device);
        assert_eq!(by_device.to_string(), "pump-1");

        let by_type = PartitionKey::for_event(&event, PartitionStrategy::DeviceAndType);
        assert_eq!(by_type.to_string(), "pump-1/basal");
        assert_ne!(by_device, by_type);
    }

    #[test]
    fn test_missing_device_shares_partition() {
        let a = PartitionKey::for_event(&Event::new("smbg"), PartitionStrategy::Device);
        let b = PartitionKey::for_event(&Event::new("cbg"), PartitionStrategy::Device);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "<no device>");
    }
}
