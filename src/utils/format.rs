use crate::network::Amount;

use primitive_types::U256;

/// Largest power of ten representable in 256 bits.
const MAX_DECIMALS: u32 = 77;

/// Format a base-unit amount as a decimal number with `decimals` fractional digits.
///
/// Exact for the whole 256-bit range, no floating point involved.
pub fn format_amount(amount: Amount, decimals: u32) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    if decimals == 0 {
        return amount.to_string();
    }

    let (whole, fraction) = amount.value().div_mod(U256::exp10(decimals as usize));
    format!(
        "{}.{:0>width$}",
        whole,
        fraction.to_string(),
        width = decimals as usize
    )
}
