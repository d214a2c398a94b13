//! 订单号校验
//!
//! 订单号是最长 19 位的十进制数字串，且必须通过 Luhn 模 10 校验。
//! 上传订单与积分提现共用同一套校验规则。

use loyalty_shared::error::LoyaltyError;

/// Luhn 模 10 校验
///
/// 从右往左每隔一位翻倍，超过 9 则减 9，总和能被 10 整除即合法。
pub fn is_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut sum: u32 = 0;
    for (i, b) in number.bytes().rev().enumerate() {
        let mut digit = u32::from(b - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }

    sum % 10 == 0
}

/// 解析并校验订单号
///
/// 非数字、超长（> 19 位）或 Luhn 校验失败都返回 `InvalidOrderNumber`。
pub fn parse_order_number(raw: &str) -> Result<i64, LoyaltyError> {
    let invalid = || LoyaltyError::InvalidOrderNumber {
        number: raw.to_string(),
    };

    if !is_valid(raw) {
        return Err(invalid());
    }

    raw.parse::<i64>().map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_numbers() {
        // 经典测试号段
        for number in ["12345678903", "79927398713", "49927398716", "4561261212345467"] {
            assert!(is_valid(number), "应通过校验: {number}");
        }
    }

    #[test]
    fn test_known_invalid_numbers() {
        for number in ["12345678901", "79927398710", "49927398717", "1234567812345678"] {
            assert!(!is_valid(number), "不应通过校验: {number}");
        }
    }

    #[test]
    fn test_rejects_non_digits_and_empty() {
        assert!(!is_valid(""));
        assert!(!is_valid("abc"));
        assert!(!is_valid("1234a678903"));
        assert!(!is_valid(" 12345678903"));
        assert!(!is_valid("-12345678903"));
    }

    #[test]
    fn test_appending_check_digit_always_validates() {
        // 对任意数字前缀，总存在唯一的校验位使其合法
        for prefix in ["1234567890", "9278923470", "0", "999999999999999999"] {
            let mut hits = 0;
            for check in 0..10 {
                if is_valid(&format!("{prefix}{check}")) {
                    hits += 1;
                }
            }
            assert_eq!(hits, 1, "前缀 {prefix} 应恰好有一个合法校验位");
        }
    }

    #[test]
    fn test_parse_order_number() {
        assert_eq!(parse_order_number("12345678903").unwrap(), 12345678903);

        assert!(matches!(
            parse_order_number("12345678901"),
            Err(LoyaltyError::InvalidOrderNumber { .. })
        ));
        assert!(matches!(
            parse_order_number("not-a-number"),
            Err(LoyaltyError::InvalidOrderNumber { .. })
        ));
    }
}
