//! Input rules shared by request DTOs and services.

use crate::errors::ServiceError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Something@something.something, no whitespace
    pub static ref EMAIL_RE: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid");
    static ref DATA_URI_PREFIX: Regex =
        Regex::new(r"^data:image/\w+;base64,").expect("data uri pattern is valid");
}

/// Decodes an inline image, with or without a `data:image/...;base64,` prefix
pub fn decode_avatar(raw: &str) -> Result<Vec<u8>, ServiceError> {
    let payload = DATA_URI_PREFIX.replace(raw.trim(), "");
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|_| ServiceError::ValidationError("Avatar must be base64 encoded.".to_string()))
}

pub fn encode_avatar(bytes: Option<&[u8]>) -> Option<String> {
    bytes.map(|b| STANDARD.encode(b))
}

fn digits_of(document: &str) -> Vec<u32> {
    document.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

fn cpf_check_digit(digits: &[u32]) -> u32 {
    let start = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (start - i as u32))
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 {
        0
    } else {
        rest
    }
}

fn cnpj_check_digit(digits: &[u32]) -> u32 {
    const WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let weights = &WEIGHTS[WEIGHTS.len() - digits.len()..];
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 {
        0
    } else {
        11 - rest
    }
}

/// Brazilian individual taxpayer number (CPF). Punctuation is ignored.
pub fn is_valid_cpf(document: &str) -> bool {
    let digits = digits_of(document);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }
    cpf_check_digit(&digits[..9]) == digits[9] && cpf_check_digit(&digits[..10]) == digits[10]
}

/// Brazilian company registration number (CNPJ). Punctuation is ignored.
pub fn is_valid_cnpj(document: &str) -> bool {
    let digits = digits_of(document);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }
    cnpj_check_digit(&digits[..12]) == digits[12] && cnpj_check_digit(&digits[..13]) == digits[13]
}
