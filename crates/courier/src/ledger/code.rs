//! Passcode generation.

use keystamp_common::constants::{OTP_CODE_LENGTH, OTP_CODE_MAX, OTP_CODE_MIN};
use rand::Rng;
use subtle::ConstantTimeEq;

/// Draw a passcode uniformly from [100000, 999999]
pub fn generate_code() -> String {
    generate_code_with(&mut rand::rng())
}

pub(crate) fn generate_code_with(rng: &mut impl Rng) -> String {
    let value = rng.random_range(OTP_CODE_MIN..=OTP_CODE_MAX);
    format!("{:0width$}", value, width = OTP_CODE_LENGTH)
}

/// Compare two codes without short-circuiting on the first differing byte
pub fn codes_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}
