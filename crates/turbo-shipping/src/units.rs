//! Weight and length conversion.
//!
//! Both families share one converter. A [`UnitTable`] names a base unit and
//! the factor each unit carries relative to it; converting goes through the
//! base. Values are rounded to [`DECIMAL_DIGITS`] places on construction and
//! after every conversion so repeated conversions do not accumulate drift.

use crate::error::ShippingError;

/// Decimal places kept by every conversion.
pub const DECIMAL_DIGITS: i32 = 5;

/// A family of units sharing a base unit.
#[derive(Debug, PartialEq)]
pub struct UnitTable {
    /// Human name used in error messages.
    pub family: &'static str,
    /// The unit every factor is relative to.
    pub base: &'static str,
    /// `(unit, units per base unit)`.
    pub factors: &'static [(&'static str, f64)],
}

impl UnitTable {
    /// Factor for `unit`, if supported.
    pub fn factor(&self, unit: &str) -> Option<f64> {
        self.factors
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, factor)| *factor)
    }

    /// Supported unit names, in table order.
    pub fn units(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factors.iter().map(|(name, _)| *name)
    }

    pub fn supports(&self, unit: &str) -> bool {
        self.factor(unit).is_some()
    }

    fn invalid_unit(&self, unit: &str) -> ShippingError {
        ShippingError::InvalidUnit {
            unit: unit.to_string(),
            family: self.family,
            supported: self.units().collect::<Vec<_>>().join(","),
        }
    }
}

/// Length, based on inches.
pub static LENGTH: UnitTable = UnitTable {
    family: "Length",
    base: "in",
    factors: &[("in", 1.0), ("cm", 2.54)],
};

/// Weight, based on pounds.
pub static WEIGHT: UnitTable = UnitTable {
    family: "Weight",
    base: "lb",
    factors: &[("lb", 1.0), ("oz", 16.0), ("kg", 0.453592)],
};

/// A value bound to a unit of one family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converter {
    table: &'static UnitTable,
    value: f64,
    unit: &'static str,
}

impl Converter {
    /// Bind `value` to `unit`.
    pub fn new(table: &'static UnitTable, value: f64, unit: &str) -> Result<Self, ShippingError> {
        let unit = table
            .units()
            .find(|name| *name == unit)
            .ok_or_else(|| table.invalid_unit(unit))?;
        if !value.is_finite() {
            return Err(ShippingError::InvalidValue(value.to_string()));
        }
        Ok(Self {
            table,
            value: round(value),
            unit,
        })
    }

    /// Bind a textual value (as submitted by a form) to `unit`.
    pub fn parse(table: &'static UnitTable, value: &str, unit: &str) -> Result<Self, ShippingError> {
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| ShippingError::InvalidValue(value.to_string()))?;
        Self::new(table, parsed, unit)
    }

    /// The rounded value in its original unit.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Convert to `unit`.
    pub fn to(&self, unit: &str) -> Result<f64, ShippingError> {
        let target = self
            .table
            .factor(unit)
            .ok_or_else(|| self.table.invalid_unit(unit))?;
        let source = self.table.factor(self.unit).unwrap_or(1.0);

        let base = self.value / source;
        if unit == self.table.base {
            return Ok(round(base));
        }
        Ok(round(base * target))
    }
}

/// Weight constructors and shorthands.
pub struct Weight;

impl Weight {
    pub fn from(value: f64, unit: &str) -> Result<Converter, ShippingError> {
        Converter::new(&WEIGHT, value, unit)
    }

    pub fn to_oz(value: f64, unit: &str) -> Result<f64, ShippingError> {
        Self::from(value, unit)?.to("oz")
    }

    pub fn to_lb(value: f64, unit: &str) -> Result<f64, ShippingError> {
        Self::from(value, unit)?.to("lb")
    }

    pub fn to_kg(value: f64, unit: &str) -> Result<f64, ShippingError> {
        Self::from(value, unit)?.to("kg")
    }
}

/// Length constructors and shorthands.
pub struct Length;

impl Length {
    pub fn from(value: f64, unit: &str) -> Result<Converter, ShippingError> {
        Converter::new(&LENGTH, value, unit)
    }

    pub fn to_in(value: f64, unit: &str) -> Result<f64, ShippingError> {
        Self::from(value, unit)?.to("in")
    }

    pub fn to_cm(value: f64, unit: &str) -> Result<f64, ShippingError> {
        Self::from(value, unit)?.to("cm")
    }
}

fn round(value: f64) -> f64 {
    let scale = 10_f64.powi(DECIMAL_DIGITS);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ounces_to_pounds() {
        assert_eq!(Weight::from(16.0, "oz").unwrap().to("lb").unwrap(), 1.0);
    }

    #[test]
    fn test_centimetres_to_inches() {
        assert_eq!(Length::from(2.54, "cm").unwrap().to("in").unwrap(), 1.0);
    }

    #[test]
    fn test_kilogram_round_trip() {
        let lb = Weight::to_lb(1.0, "kg").unwrap();
        let kg = Weight::to_kg(lb, "lb").unwrap();
        assert!((kg - 1.0).abs() <= 1e-5, "got {kg}");
    }

    #[test]
    fn test_round_trip_every_unit_pair() {
        for table in [&WEIGHT, &LENGTH] {
            for from in table.units() {
                for to in table.units() {
                    let there = Converter::new(table, 3.75, from).unwrap().to(to).unwrap();
                    let back = Converter::new(table, there, to).unwrap().to(from).unwrap();
                    assert!((back - 3.75).abs() <= 1e-4, "{from}->{to}: {back}");
                }
            }
        }
    }

    #[test]
    fn test_pounds_to_ounces() {
        assert_eq!(Weight::to_oz(2.5, "lb").unwrap(), 40.0);
    }

    #[test]
    fn test_rounds_to_five_digits() {
        let c = Weight::from(1.1234567, "lb").unwrap();
        assert_eq!(c.value(), 1.12346);
        assert_eq!(Weight::to_lb(1.0, "kg").unwrap(), 2.20462);
    }

    #[test]
    fn test_unsupported_source_unit() {
        let err = Length::from(1.0, "mm").unwrap_err();
        match err {
            ShippingError::InvalidUnit { unit, supported, .. } => {
                assert_eq!(unit, "mm");
                assert_eq!(supported, "in,cm");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_target_unit() {
        let err = Weight::from(1.0, "lb").unwrap().to("g").unwrap_err();
        assert!(matches!(err, ShippingError::InvalidUnit { family: "Weight", .. }));
    }

    #[test]
    fn test_non_numeric_value() {
        assert!(matches!(
            Converter::parse(&WEIGHT, "heavy", "lb"),
            Err(ShippingError::InvalidValue(_))
        ));
        assert!(matches!(
            Weight::from(f64::NAN, "lb"),
            Err(ShippingError::InvalidValue(_))
        ));
        assert_eq!(Converter::parse(&WEIGHT, " 32 ", "oz").unwrap().to("lb").unwrap(), 2.0);
    }
}
