//! Unit conversion command.

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use turbo_shipping::units::{Converter, UnitTable, LENGTH, WEIGHT};

use super::ConvertArgs;
use crate::context::Context;

#[derive(Serialize)]
struct Conversion<'a> {
    value: f64,
    from: &'a str,
    result: f64,
    to: &'a str,
}

/// Run the convert command.
pub async fn run(args: ConvertArgs, ctx: &Context) -> Result<()> {
    let table = family_of(&args.from)?;
    let converter = Converter::parse(table, &args.value, &args.from)
        .with_context(|| format!("Cannot read {} {}", args.value, args.from))?;
    let result = converter.to(&args.to)?;

    if ctx.output.is_json() {
        ctx.output.json(&Conversion {
            value: converter.value(),
            from: converter.unit(),
            result,
            to: &args.to,
        });
    } else {
        println!("{} {} = {} {}", converter.value(), converter.unit(), result, args.to);
    }

    Ok(())
}

/// The unit family `unit` belongs to.
fn family_of(unit: &str) -> Result<&'static UnitTable> {
    for table in [&WEIGHT, &LENGTH] {
        if table.supports(unit) {
            return Ok(table);
        }
    }
    bail!(
        "Unknown unit \"{}\". Weights: {}. Lengths: {}.",
        unit,
        WEIGHT.units().collect::<Vec<_>>().join(", "),
        LENGTH.units().collect::<Vec<_>>().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_of() {
        assert_eq!(family_of("kg").unwrap().family, "Weight");
        assert_eq!(family_of("cm").unwrap().family, "Length");
        assert!(family_of("stone").is_err());
    }
}
