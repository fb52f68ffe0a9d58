//! Winner selection and the commit-reveal seed.
//!
//! Selection is a pure function of the candidate tickets, the prize slots and a
//! 64-bit seed, so anyone holding the published reveal can replay a draw.
//!
//! Seed derivation:
//! - `reveal = HMAC-SHA256(draw_secret, raffle_id)`, committed on activation as
//!   `hex(SHA-256(reveal))`.
//! - `seed = first 8 bytes (big-endian) of SHA-256(raffle_id || draw_at || reveal)`,
//!   where `draw_at` is the unix timestamp as 8 big-endian bytes.
//!
//! The PRNG is ChaCha20 keyed with `SHA-256(seed)`; indices are drawn with
//! rejection sampling over `next_u64` so there is no modulo bias.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use ring::{digest, hmac};
use std::collections::HashMap;
use uuid::Uuid;

/// A ticket that can win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: i64,
}

/// One unit of a prize. A prize with quantity 3 contributes three slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrizeSlot {
    pub prize_id: Uuid,
    pub tier: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRules {
    pub allow_multiple_wins: bool,
    pub min_tickets_to_participate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub prize_id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub ticket_number: i64,
}

/// Users holding at least `min_tickets_to_participate` of the candidates.
pub fn eligible_participants(candidates: &[Candidate], rules: &DrawRules) -> usize {
    ticket_counts(candidates)
        .values()
        .filter(|count| **count >= rules.min_tickets_to_participate)
        .count()
}

fn ticket_counts(candidates: &[Candidate]) -> HashMap<Uuid, u32> {
    let mut counts: HashMap<Uuid, u32> = HashMap::new();
    for c in candidates {
        *counts.entry(c.user_id).or_default() += 1;
    }
    counts
}

/// Pick one ticket per prize slot, most valuable tier first.
///
/// Slots that cannot be filled (no eligible tickets left) are skipped, so the
/// result may be shorter than `slots`.
pub fn select_winners(
    candidates: &[Candidate],
    slots: &[PrizeSlot],
    rules: &DrawRules,
    seed: u64,
) -> Vec<Selection> {
    let counts = ticket_counts(candidates);
    let mut pool: Vec<Candidate> = candidates
        .iter()
        .filter(|c| {
            counts.get(&c.user_id).copied().unwrap_or(0) >= rules.min_tickets_to_participate
        })
        .copied()
        .collect();
    pool.sort_by_key(|c| (c.ticket_number, c.ticket_id));

    let mut ordered_slots = slots.to_vec();
    ordered_slots.sort_by_key(|s| (s.tier, s.prize_id));

    let mut rng = seeded_rng(seed);
    let mut selections = Vec::with_capacity(ordered_slots.len());

    for slot in ordered_slots {
        if pool.is_empty() {
            break;
        }
        let winner = pool.remove(bounded_index(&mut rng, pool.len()));
        if !rules.allow_multiple_wins {
            pool.retain(|c| c.user_id != winner.user_id);
        }
        selections.push(Selection {
            prize_id: slot.prize_id,
            ticket_id: winner.ticket_id,
            user_id: winner.user_id,
            ticket_number: winner.ticket_number,
        });
    }

    selections
}

fn seeded_rng(seed: u64) -> ChaCha20Rng {
    let key = digest::digest(&digest::SHA256, &seed.to_be_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(key.as_ref());
    ChaCha20Rng::from_seed(bytes)
}

/// Uniform index in `0..len`. `len` must be non-zero.
fn bounded_index(rng: &mut ChaCha20Rng, len: usize) -> usize {
    let n = len as u64;
    let zone = u64::MAX - (u64::MAX % n);
    loop {
        let v = rng.next_u64();
        if v < zone {
            return (v % n) as usize;
        }
    }
}

/// The per-raffle secret revealed at draw time.
pub fn derive_reveal(secret: &[u8], raffle_id: Uuid) -> [u8; 32] {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, raffle_id.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(tag.as_ref());
    out
}

/// Published before the draw: `hex(SHA-256(reveal))`.
pub fn commitment(reveal: &[u8]) -> String {
    to_hex(digest::digest(&digest::SHA256, reveal).as_ref())
}

pub fn reveal_matches(reveal: &[u8], seed_commitment: &str) -> bool {
    commitment(reveal).eq_ignore_ascii_case(seed_commitment)
}

pub fn derive_seed(raffle_id: Uuid, draw_at_unix: i64, reveal: &[u8]) -> u64 {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(raffle_id.as_bytes());
    ctx.update(&draw_at_unix.to_be_bytes());
    ctx.update(reveal);
    let hash = ctx.finish();
    let mut first = [0u8; 8];
    first.copy_from_slice(&hash.as_ref()[..8]);
    u64::from_be_bytes(first)
}

pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Decode lowercase or uppercase hex. `None` on odd length or a non-hex digit.
pub fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickets(owners: &[Uuid]) -> Vec<Candidate> {
        owners
            .iter()
            .enumerate()
            .map(|(i, user_id)| Candidate {
                ticket_id: Uuid::now_v7(),
                user_id: *user_id,
                ticket_number: i as i64 + 1,
            })
            .collect()
    }

    fn rules(allow_multiple_wins: bool) -> DrawRules {
        DrawRules {
            allow_multiple_wins,
            min_tickets_to_participate: 1,
        }
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let users: Vec<Uuid> = (0..20).map(|_| Uuid::now_v7()).collect();
        let candidates = tickets(&users);
        let slots = [
            PrizeSlot { prize_id: Uuid::now_v7(), tier: 1 },
            PrizeSlot { prize_id: Uuid::now_v7(), tier: 2 },
        ];
        let first = select_winners(&candidates, &slots, &rules(false), 42);
        let again = select_winners(&candidates, &slots, &rules(false), 42);
        assert_eq!(first, again);

        // Input order does not matter, only ticket numbers do.
        let mut shuffled = candidates.clone();
        shuffled.reverse();
        assert_eq!(select_winners(&shuffled, &slots, &rules(false), 42), first);
    }

    #[test]
    fn test_selection_frequency_is_uniform() {
        let users: Vec<Uuid> = (0..10).map(|_| Uuid::now_v7()).collect();
        let candidates = tickets(&users);
        let slot = [PrizeSlot { prize_id: Uuid::now_v7(), tier: 1 }];

        let mut hits: HashMap<Uuid, u32> = HashMap::new();
        let rounds = 20_000u64;
        for seed in 0..rounds {
            let picked = select_winners(&candidates, &slot, &rules(false), seed);
            *hits.entry(picked[0].ticket_id).or_default() += 1;
        }

        let expected = rounds as f64 / candidates.len() as f64;
        assert_eq!(hits.len(), candidates.len());
        for count in hits.values() {
            let deviation = (f64::from(*count) - expected).abs() / expected;
            assert!(deviation < 0.15, "count {count} too far from {expected}");
        }
    }

    #[test]
    fn test_most_valuable_tier_is_drawn_first() {
        let user = Uuid::now_v7();
        let candidates = tickets(&[user]);
        let grand = PrizeSlot { prize_id: Uuid::now_v7(), tier: 1 };
        let minor = PrizeSlot { prize_id: Uuid::now_v7(), tier: 3 };

        let picked = select_winners(&candidates, &[minor, grand], &rules(true), 7);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].prize_id, grand.prize_id);
    }

    #[test]
    fn test_one_win_per_user_unless_allowed() {
        let heavy = Uuid::now_v7();
        let light = Uuid::now_v7();
        let candidates = tickets(&[heavy, heavy, heavy, heavy, light]);
        let slots: Vec<PrizeSlot> = (1..=3)
            .map(|tier| PrizeSlot { prize_id: Uuid::now_v7(), tier })
            .collect();

        for seed in 0..50 {
            let picked = select_winners(&candidates, &slots, &rules(false), seed);
            assert_eq!(picked.len(), 2);
            assert_ne!(picked[0].user_id, picked[1].user_id);

            let multi = select_winners(&candidates, &slots, &rules(true), seed);
            assert_eq!(multi.len(), 3);
        }
    }

    #[test]
    fn test_users_below_minimum_are_excluded() {
        let regular = Uuid::now_v7();
        let casual = Uuid::now_v7();
        let candidates = tickets(&[regular, regular, casual]);
        let slot = [PrizeSlot { prize_id: Uuid::now_v7(), tier: 1 }];
        let rules = DrawRules {
            allow_multiple_wins: false,
            min_tickets_to_participate: 2,
        };

        assert_eq!(eligible_participants(&candidates, &rules), 1);
        for seed in 0..50 {
            let picked = select_winners(&candidates, &slot, &rules, seed);
            assert_eq!(picked[0].user_id, regular);
        }
    }

    #[test]
    fn test_commit_reveal_round_trip() {
        let raffle_id = Uuid::now_v7();
        let reveal = derive_reveal(b"draw-secret", raffle_id);
        let committed = commitment(&reveal);

        assert!(reveal_matches(&reveal, &committed));
        assert!(!reveal_matches(&derive_reveal(b"other", raffle_id), &committed));
        assert_eq!(from_hex(&to_hex(&reveal)).as_deref(), Some(&reveal[..]));
        assert_eq!(
            derive_seed(raffle_id, 1_700_000_000, &reveal),
            derive_seed(raffle_id, 1_700_000_000, &reveal)
        );
        assert_ne!(
            derive_seed(raffle_id, 1_700_000_000, &reveal),
            derive_seed(raffle_id, 1_700_000_001, &reveal)
        );
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert_eq!(from_hex("abc"), None);
        assert_eq!(from_hex("zz"), None);
        assert_eq!(from_hex("0aFF"), Some(vec![0x0a, 0xff]));
    }
}
