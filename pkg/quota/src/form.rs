use pkg_types::quantity::{Dimension, Quantity};
use pkg_types::quota::ResourceRequest;
use serde::{Deserialize, Serialize};

/// A request as typed by a user, before any parsing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestForm {
    pub cpu: String,
    pub memory: String,
    #[serde(default)]
    pub disk: Option<String>,
}

impl RequestForm {
    /// Parse every field. Malformed fields resolve to zero and contribute
    /// one error string each; a blank disk field means "no disk".
    pub fn resolve(&self) -> (ResourceRequest, Vec<String>) {
        let mut errors = Vec::new();
        let cpu = parse_field(&self.cpu, Dimension::Cpu, &mut errors);
        let memory = parse_field(&self.memory, Dimension::Memory, &mut errors);
        let disk = self
            .disk
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map(|d| parse_field(d, Dimension::Disk, &mut errors));
        (ResourceRequest { cpu, memory, disk }, errors)
    }
}

fn parse_field(text: &str, dimension: Dimension, errors: &mut Vec<String>) -> Quantity {
    let (quantity, error) = Quantity::parse_lossy(text, dimension);
    if let Some(e) = error {
        errors.push(e.to_string());
    }
    quantity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_all_fields() {
        let form = RequestForm {
            cpu: "500m".to_string(),
            memory: "512Mi".to_string(),
            disk: Some("10Gi".to_string()),
        };
        let (request, errors) = form.resolve();
        assert!(errors.is_empty());
        assert_eq!(request.cpu.amount(), 0.5);
        assert_eq!(request.memory.amount(), 536_870_912.0);
        assert!(request.disk.is_some());
    }

    #[test]
    fn collects_one_error_per_bad_field() {
        let form = RequestForm {
            cpu: "-1".to_string(),
            memory: "".to_string(),
            disk: Some("  ".to_string()),
        };
        let (request, errors) = form.resolve();
        assert_eq!(errors.len(), 2);
        assert!(request.cpu.is_zero());
        assert!(request.memory.is_zero());
        assert!(request.disk.is_none());
    }

    #[test]
    fn overflowing_number_is_reported() {
        let form = RequestForm {
            cpu: format!("1{}", "0".repeat(400)),
            memory: "1Gi".to_string(),
            disk: None,
        };
        let (request, errors) = form.resolve();
        assert_eq!(errors.len(), 1);
        assert!(request.cpu.is_zero());
    }
}
