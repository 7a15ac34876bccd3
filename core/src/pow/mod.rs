use ethereum_types::{H256, U256, U512};
use hash::keccak;
use primitives::BlockHeader;
use rand::Rng;
use rlp::RlpStream;
use std::time::{Duration, Instant};

#[derive(Debug, Copy, Clone, PartialOrd, PartialEq)]
pub struct ProofOfWorkProblem {
    pub block_hash: H256,
    pub difficulty: U256,
    pub boundary: H256,
}

#[derive(Debug, Copy, Clone)]
pub struct ProofOfWorkSolution {
    pub nonce: u64,
}

/// Outcome of one bounded mining attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MineInfo {
    pub completed: bool,
    pub attempts: u64,
}

/// Convert boundary to its original difficulty. Basically just `f(x) = 2^256 /
/// x`.
pub fn boundary_to_difficulty(boundary: &H256) -> U256 {
    difficulty_to_boundary_aux(&U256::from_big_endian(boundary.as_bytes()))
}

/// Convert difficulty to the target boundary. Basically just `f(x) = 2^256 /
/// x`.
pub fn difficulty_to_boundary(difficulty: &U256) -> H256 {
    let boundary = difficulty_to_boundary_aux(difficulty);
    let mut bytes = [0u8; 32];
    boundary.to_big_endian(&mut bytes);
    H256::from(bytes)
}

fn difficulty_to_boundary_aux(difficulty: &U256) -> U256 {
    assert!(!difficulty.is_zero());
    if *difficulty == U256::one() {
        U256::max_value()
    } else {
        // difficulty > 1, so the quotient fits 256 bits
        let full = (U512::one() << 256) / U512::from(*difficulty);
        let mut bytes = [0u8; 64];
        full.to_big_endian(&mut bytes);
        U256::from_big_endian(&bytes[32..])
    }
}

pub fn compute(nonce: u64, block_hash: &H256) -> H256 {
    let mut rlp = RlpStream::new_list(2);
    rlp.append(block_hash).append(&nonce);
    keccak(rlp.out())
}

pub fn validate(
    problem: &ProofOfWorkProblem, solution: &ProofOfWorkSolution,
) -> bool {
    let nonce = solution.nonce;
    let hash = compute(nonce, &problem.block_hash);
    hash < problem.boundary
}

/// Search nonces from a random starting point until the boundary is met or
/// `timeout` elapses.
pub fn mine(
    problem: &ProofOfWorkProblem, timeout: Duration,
) -> (MineInfo, Option<ProofOfWorkSolution>) {
    let deadline = Instant::now() + timeout;
    let mut nonce: u64 = rand::thread_rng().gen();
    let mut attempts = 0u64;
    loop {
        // The clock is only worth consulting every so many hashes.
        for _ in 0..32 {
            attempts += 1;
            if compute(nonce, &problem.block_hash) < problem.boundary {
                return (
                    MineInfo {
                        completed: true,
                        attempts,
                    },
                    Some(ProofOfWorkSolution { nonce }),
                );
            }
            nonce = nonce.wrapping_add(1);
        }
        if Instant::now() >= deadline {
            return (
                MineInfo {
                    completed: false,
                    attempts,
                },
                None,
            );
        }
    }
}

/// Difficulty for a child of `parent` sealed at `timestamp`: one part in
/// 1024 down once the gap reaches 42 seconds, one part in 1024 up below
/// that.
pub fn calculate_difficulty(parent: &BlockHeader, timestamp: u64) -> U256 {
    let parent_difficulty = *parent.difficulty();
    let step = parent_difficulty >> 10usize;
    if timestamp >= parent.timestamp() + 42 {
        parent_difficulty - step
    } else {
        parent_difficulty + step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::TEST_DIFFICULTY;
    use primitives::BlockHeaderBuilder;

    #[test]
    fn boundary_round_trips_through_difficulty() {
        for difficulty in &[1u64, 2, 10, 1 << 22] {
            let difficulty = U256::from(*difficulty);
            let boundary = difficulty_to_boundary(&difficulty);
            assert_eq!(boundary_to_difficulty(&boundary), difficulty);
        }
    }

    #[test]
    fn compute_depends_on_the_nonce() {
        let block_hash = H256::from_low_u64_be(0x1234);
        assert_eq!(compute(7, &block_hash), compute(7, &block_hash));
        assert_ne!(compute(7, &block_hash), compute(8, &block_hash));
    }

    #[test]
    fn low_difficulty_problems_mine_quickly() {
        let difficulty = U256::from(TEST_DIFFICULTY);
        let problem = ProofOfWorkProblem {
            block_hash: H256::from_low_u64_be(0xabcd),
            difficulty,
            boundary: difficulty_to_boundary(&difficulty),
        };
        let (info, solution) = mine(&problem, Duration::from_secs(60));
        assert!(info.completed);
        assert!(info.attempts >= 1);
        let solution = solution.expect("Failed to find a nonce");
        assert!(validate(&problem, &solution));
    }

    #[test]
    fn difficulty_retargets_around_the_42_second_gap() {
        let parent = BlockHeaderBuilder::new()
            .with_timestamp(1_000)
            .with_difficulty(U256::from(1 << 12))
            .build();
        let step = U256::from(4);
        assert_eq!(
            calculate_difficulty(&parent, 1_001),
            U256::from(1 << 12) + step
        );
        assert_eq!(
            calculate_difficulty(&parent, 1_042),
            U256::from(1 << 12) - step
        );

        // Tiny test difficulties sit below the retarget resolution.
        let parent = BlockHeaderBuilder::new()
            .with_timestamp(1_000)
            .with_difficulty(U256::from(TEST_DIFFICULTY))
            .build();
        assert_eq!(
            calculate_difficulty(&parent, 1_001),
            U256::from(TEST_DIFFICULTY)
        );
        assert_eq!(
            calculate_difficulty(&parent, 1_100),
            U256::from(TEST_DIFFICULTY)
        );
    }
}
