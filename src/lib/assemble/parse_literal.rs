use hexf_parse::parse_hexf32;
use hexf_parse::parse_hexf64;

pub fn int<T>(s: &str) -> Option<T>
where
    T: std::str::FromStr,
    T: TryFrom<i64>,
{
    let s = s.trim_start_matches('+');
    // Hack to support parsing '-0' as unsigned types
    let s = if s == "-0" { "0" } else { s };

    if let Some(hex) = s.strip_prefix("-0x") {
        let m = u64::from_str_radix(hex, 16).ok()?;
        if m > 1 << 63 {
            return None;
        }
        let m = (m as i64).wrapping_neg();
        m.try_into().ok()
    } else if let Some(hex) = s.strip_prefix("0x") {
        let m = i64::from_str_radix(hex, 16).ok()?;
        m.try_into().ok()
    } else {
        s.parse().ok()
    }
}

/// Explicit NaN payloads: `NaN<0x7FC00001>`. The sign is ignored since the
/// payload carries the sign bit. Bits that do not form a NaN are rejected.
fn nan_bits(s: &str) -> Option<&str> {
    let s = s.trim_start_matches(|c| c == '+' || c == '-');
    s.strip_prefix("NaN<0x")?.strip_suffix('>')
}

fn infinity(s: &str) -> Option<bool> {
    match s {
        "+Infinity" => Some(true),
        "-Infinity" => Some(false),
        _ => None,
    }
}

/// Parses a float literal with any trailing `f` already removed.
pub fn float(s: &str) -> Option<u32> {
    if let Some(hex) = nan_bits(s) {
        return u32::from_str_radix(hex, 16).ok().filter(|bits| f32::from_bits(*bits).is_nan());
    }
    if let Some(positive) = infinity(s) {
        let f = if positive { f32::INFINITY } else { f32::NEG_INFINITY };
        return Some(f.to_bits());
    }
    if s.trim_start_matches(|c| c == '+' || c == '-') == "NaN" {
        return Some(f32::NAN.to_bits());
    }

    let s = s.trim_start_matches('+');
    let f = if s.starts_with("0x") || s.starts_with("-0x") {
        parse_hexf32(s, false).ok()
    } else {
        s.parse().ok()
    }?;

    Some(f.to_bits())
}

pub fn double(s: &str) -> Option<u64> {
    if let Some(hex) = nan_bits(s) {
        return u64::from_str_radix(hex, 16).ok().filter(|bits| f64::from_bits(*bits).is_nan());
    }
    if let Some(positive) = infinity(s) {
        let f = if positive { f64::INFINITY } else { f64::NEG_INFINITY };
        return Some(f.to_bits());
    }
    if s.trim_start_matches(|c| c == '+' || c == '-') == "NaN" {
        return Some(f64::NAN.to_bits());
    }

    let s = s.trim_start_matches('+');
    let f = if s.starts_with("0x") || s.starts_with("-0x") {
        parse_hexf64(s, false).ok()
    } else {
        s.parse().ok()
    }?;

    Some(f.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int() {
        assert_eq!(int::<i32>("-0x80000000"), Some(i32::MIN));
        assert_eq!(int::<i32>("0x80000000"), None);
        assert_eq!(int::<u8>("-0"), Some(0));
        assert_eq!(int::<u16>("+65535"), Some(65535));
        assert_eq!(int::<i64>("-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn test_floats() {
        assert_eq!(float("1.5e0"), Some(1.5f32.to_bits()));
        assert_eq!(float("+NaN<0x7FC00001>"), Some(0x7FC00001));
        assert_eq!(float("-Infinity"), Some(f32::NEG_INFINITY.to_bits()));
        assert_eq!(float("1e-45"), Some(1));
        assert_eq!(double("-0e0"), Some(0x8000000000000000));
        assert_eq!(double("+NaN<0xFFF8000000000001>"), Some(0xFFF8000000000001));
        assert_eq!(double("0x1.8p1"), Some(3.0f64.to_bits()));
    }

    #[test]
    fn test_nan_payload_must_be_nan() {
        assert_eq!(float("+NaN<0x00000001>"), None);
        assert_eq!(float("+NaN<0x7F800000>"), None);
        assert_eq!(float("-NaN<0xFF800001>"), Some(0xFF800001));
        assert_eq!(double("+NaN<0x0000000000000001>"), None);
        assert_eq!(double("+NaN<0x7FF0000000000000>"), None);
        assert_eq!(double("+NaN<0x7FF0000000000001>"), Some(0x7FF0000000000001));
    }
}
