use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Code numérique à 6 chiffres envoyé à l'utilisateur (zéros initiaux conservés)
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Empreinte stockée en base: HMAC-SHA256(secret, "user_id:code") en hex.
/// Le code en clair n'est jamais persisté.
pub fn hash_code(secret: &str, user_id: i32, code: &str) -> Result<String, String> {
    let mac = keyed(secret, user_id, code)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare un code saisi avec l'empreinte stockée (comparaison en temps constant)
pub fn verify_code(secret: &str, user_id: i32, code: &str, stored_hash: &str) -> bool {
    let Ok(expected) = hex::decode(stored_hash) else {
        return false;
    };
    match keyed(secret, user_id, code.trim()) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

fn keyed(secret: &str, user_id: i32, code: &str) -> Result<HmacSha256, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| format!("Invalid HMAC key: {}", e))?;
    mac.update(format!("{}:{}", user_id, code).as_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_is_bound_to_user_and_secret() {
        let hash = hash_code("secret", 7, "123456").unwrap();
        assert!(verify_code("secret", 7, "123456", &hash));
        assert!(verify_code("secret", 7, " 123456 ", &hash));
        assert!(!verify_code("secret", 8, "123456", &hash));
        assert!(!verify_code("other", 7, "123456", &hash));
        assert!(!verify_code("secret", 7, "654321", &hash));
        assert!(!verify_code("secret", 7, "123456", "not-hex"));
    }
}
