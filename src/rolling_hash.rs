/// Adler32-style rolling hash over a fixed window.
///
/// Two 16-bit sums (a, b) packed into a 32-bit digest; sliding the window by
/// one byte is O(1).
const MOD_ADLER: u32 = 65521;

pub struct RollingHash {
    a: u32,
    b: u32,
    window_size: u32,
}

impl RollingHash {
    /// Hash of `window`.
    pub fn new(window: &[u8]) -> Self {
        // u64 sums defer the modular reduction to the end.
        let mut a: u64 = 1;
        let mut b: u64 = 0;
        for &byte in window {
            a += byte as u64;
            b += a;
        }
        Self {
            a: (a % MOD_ADLER as u64) as u32,
            b: (b % MOD_ADLER as u64) as u32,
            window_size: window.len() as u32,
        }
    }

    /// Drop `outgoing` from the front of the window and append `incoming`.
    pub fn roll(&mut self, outgoing: u8, incoming: u8) {
        let out = outgoing as u32;
        let inc = incoming as u32;
        let n = self.window_size % MOD_ADLER;

        self.a = (self.a + MOD_ADLER - out + inc) % MOD_ADLER;
        self.b = (self.b + MOD_ADLER - 1 + self.a - (out * n) % MOD_ADLER) % MOD_ADLER;
    }

    pub fn digest(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_window_same_digest() {
        let data = b"base rom header";
        assert_eq!(RollingHash::new(data).digest(), RollingHash::new(data).digest());
    }

    #[test]
    fn test_different_windows_differ() {
        assert_ne!(
            RollingHash::new(b"Hello").digest(),
            RollingHash::new(b"World").digest()
        );
    }

    #[test]
    fn test_roll_matches_fresh_hash() {
        let data: Vec<u8> = (0..=255u8).cycle().take(300).collect();
        let window = 64;
        let mut rolling = RollingHash::new(&data[..window]);
        for start in 1..=(data.len() - window) {
            rolling.roll(data[start - 1], data[start + window - 1]);
            let fresh = RollingHash::new(&data[start..start + window]);
            assert_eq!(rolling.digest(), fresh.digest(), "window starting at {start}");
        }
    }
}
