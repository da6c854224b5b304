use std::fmt;

use serde::{Deserialize, Serialize};

use super::id::DeviceId;

/// A single side effect of a device transition.
/// Steps and their compensations are both expressed as actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "bringOnline")]
    BringOnline { device: DeviceId },

    #[serde(rename = "bringOffline")]
    BringOffline { device: DeviceId },

    #[serde(rename = "persistDasd")]
    PersistDasd { device: DeviceId },

    #[serde(rename = "unpersistDasd")]
    UnpersistDasd { device: DeviceId },

    #[serde(rename = "persistZfcp")]
    PersistZfcp { device: DeviceId },

    #[serde(rename = "unpersistZfcp")]
    UnpersistZfcp { device: DeviceId },

    #[serde(rename = "configureNetwork")]
    ConfigureNetwork {
        device: DeviceId,
        portno: Option<u8>,
    },

    #[serde(rename = "removeNetwork")]
    RemoveNetwork { device: DeviceId },

    #[serde(rename = "createIfcfg")]
    CreateIfcfg { device: DeviceId },

    #[serde(rename = "writeIfcfg")]
    WriteIfcfg {
        device: DeviceId,
        portno: Option<u8>,
    },

    #[serde(rename = "removeIfcfg")]
    RemoveIfcfg { device: DeviceId },

    #[serde(rename = "reprogramPortno")]
    ReprogramPortNo { device: DeviceId, portno: u8 },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_json() {
        let device = DeviceId::parse("0.0.f500").unwrap();
        let action = Action::ConfigureNetwork {
            device,
            portno: Some(1),
        };

        assert_eq!(
            action.to_string(),
            r#"{"configureNetwork":{"device":"0.0.f500","portno":1}}"#
        );
    }
}
