//! 订单号 Luhn 校验

/// 校验订单号是否满足 Luhn 算法
///
/// 仅接受十进制数字；空串或包含其他字符一律视为无效。
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() {
        return false;
    }

    let mut sum: u32 = 0;
    for (idx, ch) in number.bytes().rev().enumerate() {
        if !ch.is_ascii_digit() {
            return false;
        }
        let mut digit = u32::from(ch - b'0');
        if idx % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum = (sum + digit) % 10;
    }

    sum == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_numbers() {
        assert!(is_valid("79927398713"));
        assert!(!is_valid("79927398710"));
        assert!(is_valid("12345678903"));
        assert!(is_valid("4561261212345467"));
        assert!(!is_valid("4561261212345464"));
    }

    #[test]
    fn test_single_digit() {
        assert!(is_valid("0"));
        for d in 1..=9 {
            assert!(!is_valid(&d.to_string()));
        }
    }

    #[test]
    fn test_leading_zeros_do_not_matter() {
        assert!(is_valid("0079927398713"));
        assert!(!is_valid("0079927398710"));
        assert!(is_valid("00"));
    }

    #[test]
    fn test_very_long_numbers() {
        // 每一位 9 贡献 9，位数为 10 的倍数时校验和为 0
        assert!(is_valid(&"9".repeat(1_000_000)));
        assert!(!is_valid(&"9".repeat(999_999)));
    }

    #[test]
    fn test_rejects_non_digits() {
        assert!(!is_valid(""));
        assert!(!is_valid("7992739871a"));
        assert!(!is_valid("7992 7398 713"));
        assert!(!is_valid("-79927398713"));
        assert!(!is_valid("７９"));
    }
}
