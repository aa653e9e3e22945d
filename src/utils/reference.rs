use rand::Rng;

const REFERENCE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// 生成充值参考号: REF-<账户前6位>-<毫秒时间戳36进制>-<4位随机>
pub fn generate_reference(account_id: &str, now_millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let prefix: String = account_id.chars().take(6).collect();
    let suffix: String = (0..4)
        .map(|_| REFERENCE_CHARS[rng.gen_range(0..REFERENCE_CHARS.len())] as char)
        .collect();
    format!("REF-{prefix}-{}-{suffix}", to_base36(now_millis.max(0) as u64))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn test_generate_reference_shape() {
        let reference = generate_reference("abcdefghij", 36);
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "REF");
        assert_eq!(parts[1], "abcdef");
        assert_eq!(parts[2], "10");
        assert_eq!(parts[3].len(), 4);
        assert!(parts[3].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_short_account_id() {
        assert!(generate_reference("ab", 1).starts_with("REF-ab-1-"));
    }
}
