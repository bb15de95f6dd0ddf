//! Chronological keys in the Realtime Database push-id format: 8 characters
//! of millisecond timestamp followed by 12 random characters. Keys generated
//! later sort lexicographically after earlier ones, even within one
//! millisecond.

use std::sync::{Mutex, PoisonError};

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

#[derive(Default)]
pub struct PushIdGenerator {
    last: Mutex<(i64, [u8; 12])>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, now_ms: i64) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let (last_time, random) = &mut *last;

        if now_ms == *last_time {
            // Same millisecond: bump the random tail so ordering holds.
            for digit in random.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            *last_time = now_ms;
            let mut rng = rand::rng();
            for digit in random.iter_mut() {
                *digit = rng.random_range(0..64);
            }
        }

        let mut id = String::with_capacity(20);
        let mut time = now_ms;
        let mut time_chars = [0u8; 8];
        for slot in time_chars.iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        id.extend(time_chars.iter().map(|c| *c as char));
        id.extend(random.iter().map(|digit| PUSH_CHARS[*digit as usize] as char));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_have_push_id_shape() {
        let generator = PushIdGenerator::new();
        let id = generator.generate(1_700_000_000_000);
        assert_eq!(id.len(), 20);
        assert!(id.bytes().all(|b| PUSH_CHARS.contains(&b)));
    }

    #[test]
    fn ids_sort_chronologically_including_same_millisecond() {
        let generator = PushIdGenerator::new();
        let ids = [
            generator.generate(1_000),
            generator.generate(1_000),
            generator.generate(1_000),
            generator.generate(2_000),
            generator.generate(64_000_000),
        ];

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
        assert_ne!(ids[0], ids[1]);
    }
}
