use rand::Rng;

pub const OTP_LENGTH: usize = 6;

/// Produces the one-time codes mailed during signup.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Six decimal digits from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..OTP_LENGTH)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect()
    }
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = RandomOtp.generate();
            assert!(is_well_formed(&code), "bad code {code}");
        }
    }

    #[test]
    fn codes_vary() {
        let codes: HashSet<String> = (0..50).map(|_| RandomOtp.generate()).collect();
        assert!(codes.len() > 40);
    }

    #[test]
    fn well_formed_rejects_other_shapes() {
        assert!(is_well_formed("012345"));
        assert!(!is_well_formed("12345"));
        assert!(!is_well_formed("1234567"));
        assert!(!is_well_formed("12a456"));
        assert!(!is_well_formed(" 12345"));
    }
}
