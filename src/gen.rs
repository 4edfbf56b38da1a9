use rand::seq::SliceRandom;
use rand::Rng;

/// Length of passwords generated for new users.
pub const DEFAULT_PASSWORD_LENGTH: usize = 32;

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b")(*&^%$#@!~";

/// Random password with at least one upper-case letter, one lower-case letter
/// and one digit, as Snowflake's default password policy requires.
pub fn generate_password(length: usize) -> String {
    let charset: Vec<u8> = [UPPER, LOWER, DIGITS, SYMBOLS].concat();
    let mut rng = rand::thread_rng();

    let mut password: Vec<u8> = [UPPER, LOWER, DIGITS]
        .iter()
        .take(length)
        .map(|class| class[rng.gen_range(0..class.len())])
        .collect();
    while password.len() < length {
        password.push(charset[rng.gen_range(0..charset.len())]);
    }
    password.shuffle(&mut rng);

    password.into_iter().map(char::from).collect()
}

/// Print a generated password with given length
pub fn gen_password(length: usize) {
    println!("Generated password: {}", generate_password(length));
}
