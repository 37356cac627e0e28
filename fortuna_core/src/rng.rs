use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

// Deterministic RNG using provably-fair HMAC construction
// server_seed (secret) + client_seed + nonce -> HMAC-SHA256 -> bytes -> floats in [0,1)

pub type HmacSha256 = Hmac<Sha256>;

/// A source of uniform floats in `[0, 1)`.
///
/// The selector and the reel shuffle only ever ask for one value at a time, so
/// a test can substitute a closure returning scripted values.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

pub fn derive_hash_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

pub fn derive_floats(hmac_bytes: &[u8], count: usize) -> Vec<f64> {
    let mut stream = FairStream::from_bytes(hmac_bytes);
    (0..count).map(|_| stream.next_unit()).collect()
}

/// Endless stream of floats read from an HMAC block.
///
/// Successive 4-byte chunks become big-endian `u32`s mapped to `[0,1)`; once a
/// block is used up it is replaced by the SHA-256 digest of itself.
#[derive(Debug, Clone)]
pub struct FairStream {
    buffer: Vec<u8>,
    pos: usize,
}

impl FairStream {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buffer: bytes.to_vec(),
            pos: 0,
        }
    }
}

impl RandomSource for FairStream {
    fn next_unit(&mut self) -> f64 {
        if self.pos + 4 > self.buffer.len() {
            self.buffer = Sha256::digest(&self.buffer).to_vec();
            self.pos = 0;
        }
        let chunk = &self.buffer[self.pos..self.pos + 4];
        let v = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        self.pos += 4;
        (v as f64) / (u32::MAX as f64 + 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ProvablyFairRng {
    pub server_seed: String, // secret
    pub client_seed: String,
    pub nonce: u64,
}

impl ProvablyFairRng {
    pub fn new(server_seed: impl Into<String>, client_seed: impl Into<String>, nonce: u64) -> Self {
        Self {
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce,
        }
    }

    pub fn server_seed_hash_hex(&self) -> String {
        derive_hash_hex(self.server_seed.as_bytes())
    }

    pub fn hmac_bytes(&self) -> [u8; 32] {
        // HMAC accepts keys of any length
        let mut mac =
            HmacSha256::new_from_slice(self.server_seed.as_bytes()).expect("HMAC key");
        let msg = format!("{}:{}", self.client_seed, self.nonce);
        mac.update(msg.as_bytes());
        let res = mac.finalize().into_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(&res);
        out
    }

    pub fn next_floats(&self, count: usize) -> Vec<f64> {
        derive_floats(&self.hmac_bytes(), count)
    }

    /// The stream a draw consumes: the first value picks the prize, the rest
    /// feed the reel shuffle.
    pub fn stream(&self) -> FairStream {
        FairStream::from_bytes(&self.hmac_bytes())
    }
}
