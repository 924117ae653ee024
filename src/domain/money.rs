use thiserror::Error;

use super::Currency;

/// Money is stored as a signed integer count of the currency's smallest unit.
/// For USD/EUR 1 unit = 100 minor units, so $50.00 = 5000. JPY has no minor unit.
pub type MinorUnits = i64;

/// Format minor units as a decimal string using the currency's exponent.
/// Example: (5000, USD) -> "50.00", (-1234, EUR) -> "-12.34", (500, JPY) -> "500"
pub fn format_amount(amount: MinorUnits, currency: Currency) -> String {
    let digits = currency.minor_digits();
    if digits == 0 {
        return amount.to_string();
    }

    let scale = 10_i64.pow(digits);
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let units = abs / scale as u64;
    let remainder = abs % scale as u64;
    format!(
        "{}{}.{:0width$}",
        sign,
        units,
        remainder,
        width = digits as usize
    )
}

/// Parse a decimal string into minor units of `currency`.
/// Extra fractional digits are truncated: "100.999" USD -> 10099.
pub fn parse_amount(input: &str, currency: Currency) -> Result<MinorUnits, ParseAmountError> {
    let input = input.trim();
    let (negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    if body.is_empty() {
        return Err(ParseAmountError::InvalidFormat(input.to_string()));
    }

    let digits = currency.minor_digits();
    let scale = 10_i64.pow(digits);

    let (units_str, fraction_str) = match body.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (body, ""),
    };
    if fraction_str.contains('.') || (units_str.is_empty() && fraction_str.is_empty()) {
        return Err(ParseAmountError::InvalidFormat(input.to_string()));
    }
    if digits == 0 && !fraction_str.is_empty() {
        return Err(ParseAmountError::FractionNotAllowed(currency));
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        parse_digits(units_str, input)?
    };

    let mut fraction = String::from(fraction_str);
    fraction.truncate(digits as usize);
    while fraction.len() < digits as usize {
        fraction.push('0');
    }
    let minor: i64 = if fraction.is_empty() {
        0
    } else {
        parse_digits(&fraction, input)?
    };

    let total = units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(minor))
        .ok_or_else(|| ParseAmountError::Overflow(input.to_string()))?;

    Ok(if negative { -total } else { total })
}

fn parse_digits(digits: &str, input: &str) -> Result<i64, ParseAmountError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseAmountError::InvalidFormat(input.to_string()));
    }
    digits
        .parse()
        .map_err(|_| ParseAmountError::Overflow(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("invalid money format: '{0}'")]
    InvalidFormat(String),

    #[error("{0} amounts cannot have a fractional part")]
    FractionNotAllowed(Currency),

    #[error("amount out of range: '{0}'")]
    Overflow(String),
}
