//! Field-level validation.
//!
//! Validators collect every failing field before returning so a form can
//! show all problems at once.

mod address;
mod errors;
mod parcel;
mod profile;

pub use address::AddressValidator;
pub use errors::ValidationErrors;
pub use parcel::{NumericInput, ParcelInput, ParcelValidator, PARCEL_MAX, PARCEL_MIN};
pub use profile::{ProfileInput, ProfileValidator};
