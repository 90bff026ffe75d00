//! Parcel validation command.

use anyhow::{bail, Result};
use turbo_shipping::validation::{NumericInput, ParcelInput, ProfileInput, ProfileValidator};
use turbo_shipping::units::Weight;

use super::ParcelArgs;
use crate::context::Context;

/// Run the validate-parcel command.
///
/// Applies the structural parcel rules with the units allowed by the
/// loaded config. Carrier limits need a shipment service and are not
/// checked here.
pub async fn run(args: ParcelArgs, ctx: &Context) -> Result<()> {
    let input = ProfileInput::new(parcel_input(&args));
    let validator = ProfileValidator::from_config(&ctx.config);

    if let Err(errors) = validator.validate(&input) {
        ctx.output.error("Parcel is invalid");
        ctx.output.field_errors(&errors);
        bail!("{} field(s) failed validation", errors.len());
    }

    let parcel = input.parcel;
    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({ "valid": true, "parcel": parcel }));
        return Ok(());
    }

    ctx.output.success("Parcel is valid");
    if let (Some(weight), Some(unit)) = (
        parcel.weight.as_ref().and_then(NumericInput::as_number),
        parcel.weight_unit.as_deref(),
    ) {
        ctx.output.kv("weight (oz)", &Weight::to_oz(weight, unit)?.to_string());
    }
    Ok(())
}

fn parcel_input(args: &ParcelArgs) -> ParcelInput {
    let number = |value: &Option<String>| value.as_deref().map(NumericInput::from);
    ParcelInput {
        weight: number(&args.weight),
        weight_unit: args.weight_unit.clone(),
        length: number(&args.length),
        width: number(&args.width),
        height: number(&args.height),
        length_unit: args.length_unit.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(weight: Option<&str>, length: Option<&str>) -> ParcelArgs {
        ParcelArgs {
            weight: weight.map(String::from),
            weight_unit: Some("lb".to_string()),
            length: length.map(String::from),
            width: None,
            height: None,
            length_unit: Some("in".to_string()),
        }
    }

    #[test]
    fn test_partial_dimensions_are_rejected() {
        let input = ProfileInput::new(parcel_input(&args(Some("2"), Some("10"))));
        let errors = ProfileValidator::default().validate(&input).unwrap_err();
        assert!(errors.has("width"));
        assert!(errors.has("height"));
    }

    #[test]
    fn test_text_weight_is_checked() {
        let input = ProfileInput::new(parcel_input(&args(Some("heavy"), None)));
        let errors = ProfileValidator::default().validate(&input).unwrap_err();
        assert_eq!(errors.first("weight"), Some("The weight field must be a number."));
    }
}
