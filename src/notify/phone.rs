/// Default country code prefixed to bare local numbers (India).
const COUNTRY_CODE: &str = "91";

/// Normalize a customer phone number for the messaging provider:
/// digits only, leading zero replaced by the country code, bare 10-digit
/// numbers prefixed with it. Every outbound send goes through this.
pub fn normalize(phone: &str) -> Option<String> {
    let mut cleaned: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if cleaned.is_empty() {
        return None;
    }

    if let Some(rest) = cleaned.strip_prefix('0') {
        cleaned = format!("{COUNTRY_CODE}{rest}");
    }

    if cleaned.len() == 10 && !cleaned.starts_with(COUNTRY_CODE) {
        cleaned = format!("{COUNTRY_CODE}{cleaned}");
    }

    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting_characters() {
        assert_eq!(normalize("+91 94430-19097").as_deref(), Some("919443019097"));
        assert_eq!(normalize("(0944) 301 9097").as_deref(), Some("919443019097"));
    }

    #[test]
    fn bare_ten_digit_gets_country_code() {
        assert_eq!(normalize("9443019097").as_deref(), Some("919443019097"));
    }

    #[test]
    fn leading_zero_replaced() {
        assert_eq!(normalize("09443019097").as_deref(), Some("919443019097"));
    }

    #[test]
    fn already_prefixed_left_alone() {
        assert_eq!(normalize("919443019097").as_deref(), Some("919443019097"));
    }

    #[test]
    fn empty_or_nonnumeric_is_none() {
        assert_eq!(normalize(""), None);
        assert_eq!(normalize("n/a"), None);
    }
}
