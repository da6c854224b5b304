use serde_json::json;

use super::action::Action;

/// Summary of a completed transition
#[derive(Debug)]
pub struct Report {
    pub operation: String,
    pub target: String,
    pub actions: Vec<Action>,
    pub duration: std::time::Duration,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "operation": self.operation,
            "target": self.target,
            "actionsPerformed": self.actions,
            "elapsedTime": self.duration,
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::DeviceId;

    #[test]
    fn test_report_json() {
        let device = DeviceId::parse("0200").unwrap();
        let report = Report {
            operation: "online".into(),
            target: device.to_string(),
            actions: vec![
                Action::BringOnline { device },
                Action::PersistDasd { device },
            ],
            duration: std::time::Duration::from_millis(1500),
        };

        let json = report.to_json();
        assert_eq!(json["target"], "0.0.0200");
        assert_eq!(json["actionsPerformed"][1]["persistDasd"]["device"], "0.0.0200");
        assert_eq!(json["elapsedTime"]["secs"], 1);
    }
}
