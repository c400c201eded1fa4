//! 平台内各类一次性编码的生成：短信验证码、访客通行码、取货码、券核销码。

use rand::Rng;

const ALNUM_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const DIGIT_CHARSET: &[u8] = b"0123456789";

fn random_from(charset: &[u8], length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..charset.len());
            charset[idx] as char
        })
        .collect()
}

/// 6 位数字短信验证码
pub fn sms_code() -> String {
    random_from(DIGIT_CHARSET, 6)
}

/// 6 位数字取货码，订单接单时签发
pub fn pickup_code() -> String {
    random_from(DIGIT_CHARSET, 6)
}

/// 8 位访客通行码
pub fn visitor_code() -> String {
    random_from(ALNUM_CHARSET, 8)
}

/// 12 位券核销码，领券时签发，单次有效
pub fn coupon_code() -> String {
    random_from(ALNUM_CHARSET, 12)
}

/// 业务单号：前缀 + 时间戳 + 随机尾数，如 RO20240501123456XXXX
pub fn business_no(prefix: &str) -> String {
    let ts = chrono::Utc::now().format("%Y%m%d%H%M%S");
    format!("{}{}{}", prefix, ts, random_from(DIGIT_CHARSET, 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_lengths() {
        assert_eq!(sms_code().len(), 6);
        assert_eq!(pickup_code().len(), 6);
        assert_eq!(visitor_code().len(), 8);
        assert_eq!(coupon_code().len(), 12);
    }

    #[test]
    fn test_sms_code_is_numeric() {
        assert!(sms_code().chars().all(|c| c.is_ascii_digit()));
        assert!(pickup_code().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_business_no_prefix() {
        let no = business_no("RO");
        assert!(no.starts_with("RO"));
        assert_eq!(no.len(), 2 + 14 + 4);
    }
}
