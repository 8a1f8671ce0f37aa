use chrono::Utc;
use rand::Rng;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// New opaque entry id: base-36 milliseconds followed by 64 random bits in
/// base 36, so ids minted in the same millisecond still differ.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let noise: u64 = rand::thread_rng().gen();
    let mut id = to_base36(millis);
    id.push_str(&to_base36(noise));
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
