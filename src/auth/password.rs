//! 口令加盐哈希。

use rand::Rng;
use sha2::{Digest, Sha256};

const SALT_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SALT_LEN: usize = 16;

/// 生成随机盐值
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();

    (0..SALT_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SALT_CHARSET.len());
            SALT_CHARSET[idx] as char
        })
        .collect()
}

/// 计算加盐哈希
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 校验口令
pub fn verify_password(password: &str, salt: &str, hash: &str) -> bool {
    hash_password(password, salt) == hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_round_trip() {
        let salt = generate_salt();
        let hash = hash_password("p@ssw0rd", &salt);

        assert!(verify_password("p@ssw0rd", &salt, &hash));
        assert!(!verify_password("wrong", &salt, &hash));
    }

    #[test]
    fn test_salt_changes_hash() {
        let h1 = hash_password("p@ssw0rd", "saltA");
        let h2 = hash_password("p@ssw0rd", "saltB");
        assert_ne!(h1, h2);
    }
}
