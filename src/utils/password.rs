use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::{Rng, distributions::Alphanumeric};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "pbkdf2_sha256";
#[cfg(not(test))]
const ITERATIONS: u32 = 600_000;
#[cfg(test)]
const ITERATIONS: u32 = 1_000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 22;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Mots de passe refusés d'office (extrait des listes de mots de passe courants)
const COMMON_PASSWORDS: &[&str] = &[
    "12345678", "123456789", "1234567890", "password", "password1", "password123",
    "qwerty123", "qwertyuiop", "11111111", "00000000", "abc12345", "iloveyou",
    "senha123", "senha1234", "mudar123", "admin123", "logitrack", "brasil123",
];

/// Hash un mot de passe au format Django: pbkdf2_sha256$iterations$salt$hash
/// Le salt est une chaîne alphanumérique utilisée telle quelle comme octets.
pub fn hash_password(password: &str) -> Result<String, String> {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect();

    let key = derive(password, &salt, ITERATIONS)?;

    Ok(format!("{}${}${}${}", ALGORITHM, ITERATIONS, salt, STANDARD.encode(key)))
}

/// Vérifie un mot de passe contre un hash Django pbkdf2_sha256
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, String> {
    // Parser le format: algorithm$iterations$salt$hash
    let parts: Vec<&str> = stored_hash.splitn(4, '$').collect();
    if parts.len() != 4 {
        return Err("Invalid hash format".to_string());
    }
    if parts[0] != ALGORITHM {
        return Err(format!("Unsupported algorithm: {}", parts[0]));
    }

    let iterations = parts[1]
        .parse::<u32>()
        .map_err(|_| "Invalid iterations".to_string())?;
    let expected = STANDARD
        .decode(parts[3])
        .map_err(|e| format!("Invalid hash encoding: {}", e))?;

    let computed = derive(password, parts[2], iterations)?;

    Ok(constant_time_eq(&computed, &expected))
}

/// Règles de robustesse appliquées à l'inscription et au reset.
/// Retourne la liste des problèmes (vide = mot de passe accepté).
pub fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "Esta senha é muito curta. Ela precisa conter pelo menos {} caracteres.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("Esta senha é inteiramente numérica.".to_string());
    }
    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        problems.push("Esta senha é muito comum.".to_string());
    }

    problems
}

fn derive(password: &str, salt: &str, iterations: u32) -> Result<[u8; KEY_LENGTH], String> {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::<HmacSha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key)
        .map_err(|e| format!("PBKDF2 failed: {}", e))?;
    Ok(key)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
