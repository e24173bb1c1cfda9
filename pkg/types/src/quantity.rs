//! Resource quantities in the platform's short-suffix notation.
//!
//! CPU is held in cores and accepts a `m` (milli) suffix. Memory and disk are
//! held in bytes and accept binary (`Ki`, `Mi`, `Gi`, `Ti`) and decimal
//! (`K`, `M`, `G`, `T`) suffixes.

use pkg_constants::quota::{GIB, MIB};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Measured resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Cpu,
    Memory,
    Disk,
}

impl Dimension {
    /// Human-facing label used in validation messages.
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Cpu => "CPU",
            Dimension::Memory => "Memory",
            Dimension::Disk => "Disk",
        }
    }

    /// Accepted unit suffixes with their canonical factor. Two-letter
    /// suffixes come first so `Gi` is matched before `G`.
    fn suffixes(self) -> &'static [(&'static str, f64)] {
        match self {
            Dimension::Cpu => &CPU_SUFFIXES,
            Dimension::Memory | Dimension::Disk => &BYTE_SUFFIXES,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Cpu => write!(f, "cpu"),
            Dimension::Memory => write!(f, "memory"),
            Dimension::Disk => write!(f, "disk"),
        }
    }
}

const CPU_SUFFIXES: [(&str, f64); 1] = [("m", 1e-3)];

const BYTE_SUFFIXES: [(&str, f64); 8] = [
    ("Ki", 1024.0),
    ("Mi", MIB),
    ("Gi", GIB),
    ("Ti", GIB * 1024.0),
    ("K", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
];

/// Why a quantity string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("empty {dimension} quantity")]
    Empty { dimension: Dimension },
    #[error("negative {dimension} quantity {text:?}")]
    Negative { dimension: Dimension, text: String },
    #[error("invalid {dimension} quantity {text:?}")]
    Invalid { dimension: Dimension, text: String },
}

/// A non-negative amount in canonical units: cores for CPU, bytes for
/// memory and disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    amount: f64,
    dimension: Dimension,
}

impl Quantity {
    /// Build a quantity from a canonical amount. Negative and non-finite
    /// amounts collapse to zero.
    pub fn new(amount: f64, dimension: Dimension) -> Self {
        let amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };
        Self { amount, dimension }
    }

    pub fn zero(dimension: Dimension) -> Self {
        Self {
            amount: 0.0,
            dimension,
        }
    }

    pub fn cpu(cores: f64) -> Self {
        Self::new(cores, Dimension::Cpu)
    }

    pub fn memory(bytes: f64) -> Self {
        Self::new(bytes, Dimension::Memory)
    }

    pub fn disk(bytes: f64) -> Self {
        Self::new(bytes, Dimension::Disk)
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0.0
    }

    /// Parse `text` as a quantity of `dimension`.
    pub fn parse(text: &str, dimension: Dimension) -> Result<Self, QuantityError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QuantityError::Empty { dimension });
        }

        let (number, factor) = split_suffix(text, dimension);
        if number.strip_prefix('-').is_some_and(is_decimal) {
            return Err(QuantityError::Negative {
                dimension,
                text: text.to_string(),
            });
        }
        if !is_decimal(number) {
            return Err(QuantityError::Invalid {
                dimension,
                text: text.to_string(),
            });
        }

        let invalid = || QuantityError::Invalid {
            dimension,
            text: text.to_string(),
        };
        let value: f64 = number.parse().map_err(|_| invalid())?;
        let amount = value * factor;
        if !amount.is_finite() {
            return Err(invalid());
        }
        Ok(Self::new(amount, dimension))
    }

    /// Parse `text`, falling back to a zero amount when it is malformed.
    /// The error is handed back so callers can surface it next to the field.
    pub fn parse_lossy(text: &str, dimension: Dimension) -> (Self, Option<QuantityError>) {
        match Self::parse(text, dimension) {
            Ok(q) => (q, None),
            Err(e) => (Self::zero(dimension), Some(e)),
        }
    }

    /// Sum of two quantities of the same dimension.
    pub fn plus(self, other: Quantity) -> Quantity {
        debug_assert_eq!(self.dimension, other.dimension);
        Self::new(self.amount + other.amount, self.dimension)
    }

    /// Canonical short notation: millicores below one core, `Gi` with one
    /// decimal from one gibibyte up, whole `Mi` below that.
    pub fn format(&self) -> String {
        format_amount(self.amount, self.dimension)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

/// Format a raw canonical amount of `dimension`. Unlike [`Quantity`] the
/// amount may be negative, which happens for capacity already over quota.
pub fn format_amount(amount: f64, dimension: Dimension) -> String {
    match dimension {
        Dimension::Cpu => {
            if amount.abs() < 1.0 {
                format!("{}m", (amount * 1000.0).round() as i64)
            } else {
                format!("{}", (amount * 1000.0).round() / 1000.0)
            }
        }
        Dimension::Memory | Dimension::Disk => {
            if amount.abs() >= GIB {
                format!("{:.1}Gi", amount / GIB)
            } else {
                format!("{}Mi", (amount / MIB).round() as i64)
            }
        }
    }
}

fn split_suffix(text: &str, dimension: Dimension) -> (&str, f64) {
    for (suffix, factor) in dimension.suffixes() {
        if let Some(number) = text.strip_suffix(suffix) {
            return (number, *factor);
        }
    }
    (text, 1.0)
}

/// Plain unsigned decimal: digits with at most one dot, no exponent.
fn is_decimal(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || c == '.')
        && s.matches('.').count() <= 1
}

// --- serde ---

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuantity {
    Number(f64),
    Text(String),
}

fn deserialize_as<'de, D>(deserializer: D, dimension: Dimension) -> Result<Quantity, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    match RawQuantity::deserialize(deserializer)? {
        RawQuantity::Number(n) if n.is_finite() && n >= 0.0 => Ok(Quantity::new(n, dimension)),
        RawQuantity::Number(n) => Err(D::Error::custom(format!(
            "negative {} quantity {}",
            dimension, n
        ))),
        RawQuantity::Text(text) => Quantity::parse(&text, dimension).map_err(D::Error::custom),
    }
}

/// Serde adapters. Quantities are written as their canonical number and read
/// back from either a number or suffixed text.
macro_rules! quantity_serde {
    ($module:ident, $dimension:expr) => {
        pub mod $module {
            use super::{Dimension, Quantity};

            pub fn serialize<S: serde::Serializer>(
                q: &Quantity,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                serializer.serialize_f64(q.amount())
            }

            pub fn deserialize<'de, D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<Quantity, D::Error> {
                super::deserialize_as(deserializer, $dimension)
            }
        }
    };
}

quantity_serde!(cpu, Dimension::Cpu);
quantity_serde!(memory, Dimension::Memory);
quantity_serde!(disk, Dimension::Disk);

/// Optional disk quantity; absent or `null` maps to `None`.
pub mod disk_opt {
    use super::Quantity;
    use serde::Deserialize;

    pub fn serialize<S: serde::Serializer>(
        q: &Option<Quantity>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match q {
            Some(q) => serializer.serialize_some(&q.amount()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Quantity>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(deserialize_with = "super::disk::deserialize")] Quantity);

        let wrapped: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(wrapped.map(|Wrapper(q)| q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_binary_memory() {
        let q = Quantity::parse("512Mi", Dimension::Memory).unwrap();
        assert_eq!(q.amount(), 536_870_912.0);
        assert_eq!(Quantity::parse("4Gi", Dimension::Memory).unwrap().amount(), 4.0 * GIB);
        assert_eq!(Quantity::parse("1Ki", Dimension::Disk).unwrap().amount(), 1024.0);
    }

    #[test]
    fn parse_decimal_memory() {
        assert_eq!(Quantity::parse("4G", Dimension::Memory).unwrap().amount(), 4e9);
        assert_eq!(Quantity::parse("2M", Dimension::Disk).unwrap().amount(), 2e6);
        assert_eq!(Quantity::parse("1024", Dimension::Memory).unwrap().amount(), 1024.0);
    }

    #[test]
    fn parse_cpu() {
        assert_eq!(Quantity::parse("500m", Dimension::Cpu).unwrap().amount(), 0.5);
        assert_eq!(Quantity::parse("2", Dimension::Cpu).unwrap().amount(), 2.0);
        assert_eq!(Quantity::parse("1.5", Dimension::Cpu).unwrap().amount(), 1.5);
        assert_eq!(Quantity::parse(" 250m ", Dimension::Cpu).unwrap().amount(), 0.25);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            Quantity::parse("", Dimension::Cpu),
            Err(QuantityError::Empty { .. })
        ));
        assert!(matches!(
            Quantity::parse("-2", Dimension::Cpu),
            Err(QuantityError::Negative { .. })
        ));
        assert!(matches!(
            Quantity::parse("-1Gi", Dimension::Memory),
            Err(QuantityError::Negative { .. })
        ));
        assert!(Quantity::parse("lots", Dimension::Memory).is_err());
        assert!(Quantity::parse("2Gi", Dimension::Cpu).is_err());
        assert!(Quantity::parse("500m", Dimension::Memory).is_err());
        assert!(Quantity::parse("1e3", Dimension::Cpu).is_err());
        assert!(Quantity::parse("1.2.3", Dimension::Cpu).is_err());
        assert!(Quantity::parse("NaN", Dimension::Cpu).is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        let huge = format!("1{}", "0".repeat(400));
        assert!(matches!(
            Quantity::parse(&huge, Dimension::Cpu),
            Err(QuantityError::Invalid { .. })
        ));

        let huge_ti = format!("1{}Ti", "0".repeat(300));
        let (q, err) = Quantity::parse_lossy(&huge_ti, Dimension::Memory);
        assert!(q.is_zero());
        assert!(matches!(err, Some(QuantityError::Invalid { .. })));
    }

    #[test]
    fn parse_lossy_defaults_to_zero() {
        let (q, err) = Quantity::parse_lossy("four gigs", Dimension::Memory);
        assert!(q.is_zero());
        assert_eq!(q.dimension(), Dimension::Memory);
        assert!(err.unwrap().to_string().contains("four gigs"));

        let (q, err) = Quantity::parse_lossy("3", Dimension::Cpu);
        assert_eq!(q.amount(), 3.0);
        assert!(err.is_none());
    }

    #[test]
    fn format_cpu() {
        assert_eq!(Quantity::cpu(0.5).format(), "500m");
        assert_eq!(Quantity::cpu(2.0).format(), "2");
        assert_eq!(Quantity::cpu(1.25).format(), "1.25");
        assert_eq!(format_amount(-0.25, Dimension::Cpu), "-250m");
    }

    #[test]
    fn format_bytes() {
        assert_eq!(Quantity::memory(512.0 * MIB).format(), "512Mi");
        assert_eq!(Quantity::memory(4.0 * GIB).format(), "4.0Gi");
        assert_eq!(Quantity::disk(1.5 * GIB).format(), "1.5Gi");
        assert_eq!(format_amount(-2.0 * GIB, Dimension::Memory), "-2.0Gi");
    }

    #[test]
    fn negative_amounts_clamp() {
        assert!(Quantity::cpu(-3.0).is_zero());
        assert!(Quantity::memory(f64::NAN).is_zero());
    }

    #[test]
    fn serde_accepts_text_and_numbers() {
        #[derive(Deserialize, Serialize)]
        struct Spec {
            #[serde(with = "cpu")]
            cpu: Quantity,
            #[serde(with = "memory")]
            memory: Quantity,
            #[serde(default, with = "disk_opt")]
            disk: Option<Quantity>,
        }

        let spec: Spec = serde_yaml::from_str("cpu: 500m\nmemory: 2Gi\n").unwrap();
        assert_eq!(spec.cpu.amount(), 0.5);
        assert_eq!(spec.memory.amount(), 2.0 * GIB);
        assert!(spec.disk.is_none());

        let spec: Spec =
            serde_json::from_str(r#"{"cpu": 2, "memory": 1024, "disk": "10Gi"}"#).unwrap();
        assert_eq!(spec.cpu.amount(), 2.0);
        assert_eq!(spec.memory.amount(), 1024.0);
        assert_eq!(spec.disk.unwrap().amount(), 10.0 * GIB);

        assert!(serde_json::from_str::<Spec>(r#"{"cpu": "x", "memory": 1}"#).is_err());
    }

    proptest! {
        #[test]
        fn cpu_round_trip(cores in 0.0f64..512.0) {
            let q = Quantity::cpu(cores);
            let back = Quantity::parse(&q.format(), Dimension::Cpu).unwrap();
            prop_assert!((back.amount() - q.amount()).abs() <= 0.0005 + 1e-9);
        }

        #[test]
        fn memory_round_trip(bytes in 0.0f64..(1024.0 * GIB)) {
            let q = Quantity::memory(bytes);
            let back = Quantity::parse(&q.format(), Dimension::Memory).unwrap();
            let tolerance = if bytes >= GIB { 0.05 * GIB } else { 0.5 * MIB };
            prop_assert!((back.amount() - q.amount()).abs() <= tolerance + 1.0);
        }
    }
}
