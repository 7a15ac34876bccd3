use crate::{
    error::{ErrorKind, Result},
    pow,
};
use ethereum_types::H256;
use primitives::{Block, BlockHeader};
use std::collections::HashSet;

#[derive(Debug, Copy, Clone)]
pub struct VerificationConfig {
    pub verify_pow: bool,
}

impl VerificationConfig {
    pub fn new(test_mode: bool) -> Self {
        if test_mode {
            VerificationConfig { verify_pow: false }
        } else {
            VerificationConfig { verify_pow: true }
        }
    }

    /// Check the header's own proof of work.
    pub fn verify_pow(&self, header: &BlockHeader) -> Result<()> {
        if !self.verify_pow {
            return Ok(());
        }
        let boundary = pow::difficulty_to_boundary(header.difficulty());
        let pow_hash = pow::compute(header.nonce(), &header.problem_hash());
        if pow_hash >= boundary {
            warn!(
                "block {:?} has invalid proof of work. boundary: {:?}, \
                 pow_hash: {:?}",
                header.hash(),
                boundary,
                pow_hash
            );
            bail!(ErrorKind::HeaderInconsistency(format!(
                "proof of work {:?} misses boundary {:?}",
                pow_hash, boundary
            )));
        }
        Ok(())
    }

    /// Check that `header` is a well-formed direct child of `parent`.
    pub fn verify_header_extends(
        &self, header: &BlockHeader, parent: &BlockHeader,
    ) -> Result<()> {
        if *header.parent_hash() != parent.hash() {
            bail!(ErrorKind::HeaderInconsistency(format!(
                "parent hash {:?} does not reference {:?}",
                header.parent_hash(),
                parent.hash()
            )));
        }
        if header.number() != parent.number() + 1 {
            bail!(ErrorKind::HeaderInconsistency(format!(
                "number {} does not extend {}",
                header.number(),
                parent.number()
            )));
        }
        if header.timestamp() <= parent.timestamp() {
            bail!(ErrorKind::HeaderInconsistency(format!(
                "timestamp {} does not advance past {}",
                header.timestamp(),
                parent.timestamp()
            )));
        }
        if self.verify_pow {
            let expected =
                pow::calculate_difficulty(parent, header.timestamp());
            if *header.difficulty() != expected {
                bail!(ErrorKind::HeaderInconsistency(format!(
                    "difficulty {} where the retarget rule gives {}",
                    header.difficulty(),
                    expected
                )));
            }
        }
        Ok(())
    }

    /// Verify block data against its header: transactions and uncles roots.
    pub fn verify_block_integrity(&self, block: &Block) -> Result<()> {
        let computed = block.transactions_root();
        if computed != *block.block_header.transactions_root() {
            warn!("Invalid transaction root");
            bail!(ErrorKind::InvalidTransactionsRoot(
                *block.block_header.transactions_root(),
                computed,
            ));
        }
        let computed = block.uncles_root();
        if computed != *block.block_header.uncles_root() {
            warn!("Invalid uncles root");
            bail!(ErrorKind::HeaderInconsistency(format!(
                "uncles root {:?} where the body hashes to {:?}",
                block.block_header.uncles_root(),
                computed
            )));
        }
        Ok(())
    }

    /// Check one uncle candidate against the block's parent. `seen` carries
    /// the uncle hashes already accepted for this block.
    pub fn verify_uncle(
        &self, uncle: &BlockHeader, parent: &BlockHeader,
        grandparent: Option<&BlockHeader>, seen: &mut HashSet<H256>,
    ) -> Result<()>
    {
        let hash = uncle.hash();
        if parent.number() == 0 {
            bail!(ErrorKind::BadUncle(
                hash,
                "the genesis block has no siblings".into(),
            ));
        }
        if *uncle.parent_hash() != *parent.parent_hash() {
            bail!(ErrorKind::BadUncle(
                hash,
                "not a sibling of the parent".into(),
            ));
        }
        if hash == parent.hash() {
            bail!(ErrorKind::BadUncle(hash, "is the parent itself".into()));
        }
        if !seen.insert(hash) {
            bail!(ErrorKind::BadUncle(hash, "included twice".into()));
        }
        if let Some(grandparent) = grandparent {
            if uncle.number() != grandparent.number() + 1 {
                bail!(ErrorKind::BadUncle(
                    hash,
                    format!(
                        "number {} does not extend {}",
                        uncle.number(),
                        grandparent.number()
                    ),
                ));
            }
            if uncle.timestamp() <= grandparent.timestamp() {
                bail!(ErrorKind::BadUncle(
                    hash,
                    "timestamp does not advance past the grandparent".into(),
                ));
            }
        }
        if self.verify_pow {
            let boundary = pow::difficulty_to_boundary(uncle.difficulty());
            if pow::compute(uncle.nonce(), &uncle.problem_hash()) >= boundary
            {
                bail!(ErrorKind::BadUncle(
                    hash,
                    "invalid proof of work".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use ethereum_types::{Address, U256};
    use primitives::{Block, BlockHeaderBuilder, Transaction};

    fn header_at(
        parent_hash: H256, number: u64, timestamp: u64, author_tag: u64,
    ) -> BlockHeader {
        BlockHeaderBuilder::new()
            .with_parent_hash(parent_hash)
            .with_number(number)
            .with_timestamp(timestamp)
            .with_author(Address::from_low_u64_be(author_tag))
            .with_difficulty(U256::from(10))
            .build()
    }

    fn family() -> (BlockHeader, BlockHeader, BlockHeader) {
        let grandparent = header_at(H256::from_low_u64_be(99), 5, 100, 1);
        let parent = header_at(grandparent.hash(), 6, 150, 2);
        let uncle = header_at(grandparent.hash(), 6, 160, 3);
        (grandparent, parent, uncle)
    }

    fn expect_bad_uncle(outcome: Result<()>, needle: &str) {
        match outcome {
            Err(Error(ErrorKind::BadUncle(_, reason), _)) => {
                assert!(
                    reason.contains(needle),
                    "reason {:?} misses {:?}",
                    reason,
                    needle
                );
            }
            _ => panic!("expected BadUncle({})", needle),
        }
    }

    #[test]
    fn a_direct_child_extends_its_parent() {
        let config = VerificationConfig::new(true);
        let (_, parent, _) = family();
        let child = header_at(parent.hash(), 7, 200, 4);
        config
            .verify_header_extends(&child, &parent)
            .expect("Failed to accept a direct child");
    }

    #[test]
    fn header_extension_rejects_structural_breaks() {
        let config = VerificationConfig::new(true);
        let (_, parent, _) = family();

        let stranger = header_at(H256::from_low_u64_be(0xbad), 7, 200, 4);
        assert!(config.verify_header_extends(&stranger, &parent).is_err());

        let skipped = header_at(parent.hash(), 9, 200, 4);
        assert!(config.verify_header_extends(&skipped, &parent).is_err());

        let stale = header_at(parent.hash(), 7, 150, 4);
        assert!(config.verify_header_extends(&stale, &parent).is_err());
    }

    #[test]
    fn full_verification_also_checks_the_retarget_rule() {
        let config = VerificationConfig::new(false);
        let (_, parent, _) = family();
        // Difficulty 10 sits below the retarget resolution, so a
        // rule-following child keeps it.
        let child = header_at(parent.hash(), 7, 200, 4);
        config
            .verify_header_extends(&child, &parent)
            .expect("Failed to accept a rule-following child");

        let off_curve = BlockHeaderBuilder::new()
            .with_parent_hash(parent.hash())
            .with_number(7)
            .with_timestamp(200)
            .with_difficulty(U256::from(11))
            .build();
        assert!(config.verify_header_extends(&off_curve, &parent).is_err());
    }

    #[test]
    fn pow_is_checked_only_outside_test_mode() {
        let junk = header_at(H256::zero(), 1, 10, 1);
        VerificationConfig::new(true)
            .verify_pow(&junk)
            .expect("test mode must not check proof of work");

        let trivial = BlockHeaderBuilder::new()
            .with_difficulty(U256::one())
            .build();
        VerificationConfig::new(false)
            .verify_pow(&trivial)
            .expect("difficulty one accepts any nonce");

        let hopeless = BlockHeaderBuilder::new()
            .with_difficulty(U256::max_value())
            .build();
        assert!(VerificationConfig::new(false).verify_pow(&hopeless).is_err());
    }

    #[test]
    fn block_integrity_ties_the_body_to_the_header() {
        let config = VerificationConfig::new(true);
        let transactions = vec![Transaction {
            nonce: U256::zero(),
            gas_price: U256::one(),
            gas: U256::zero(),
            action: primitives::Action::Create,
            value: U256::zero(),
            data: vec![1, 2, 3],
            sender: Address::from_low_u64_be(7),
        }];
        let mut block = Block {
            block_header: BlockHeaderBuilder::new().build(),
            transactions,
            uncles: Vec::new(),
        };
        block
            .block_header
            .set_transactions_root(block.transactions_root());
        block.block_header.set_uncles_root(block.uncles_root());
        config
            .verify_block_integrity(&block)
            .expect("Failed to accept a consistent block");

        let mut tampered = block.clone();
        tampered
            .block_header
            .set_transactions_root(H256::from_low_u64_be(0xbad));
        match config.verify_block_integrity(&tampered) {
            Err(Error(ErrorKind::InvalidTransactionsRoot(..), _)) => {}
            _ => panic!("expected InvalidTransactionsRoot"),
        }

        let mut tampered = block;
        tampered
            .block_header
            .set_uncles_root(H256::from_low_u64_be(0xbad));
        assert!(config.verify_block_integrity(&tampered).is_err());
    }

    #[test]
    fn uncles_must_be_fresh_siblings_of_the_parent() {
        let config = VerificationConfig::new(true);
        let (grandparent, parent, uncle) = family();
        let mut seen = HashSet::new();

        config
            .verify_uncle(&uncle, &parent, Some(&grandparent), &mut seen)
            .expect("Failed to accept a valid uncle");
        expect_bad_uncle(
            config.verify_uncle(
                &uncle,
                &parent,
                Some(&grandparent),
                &mut seen,
            ),
            "twice",
        );
        expect_bad_uncle(
            config.verify_uncle(
                &parent,
                &parent,
                Some(&grandparent),
                &mut seen,
            ),
            "parent itself",
        );

        let stranger = header_at(H256::from_low_u64_be(0xbad), 6, 160, 9);
        expect_bad_uncle(
            config.verify_uncle(
                &stranger,
                &parent,
                Some(&grandparent),
                &mut seen,
            ),
            "sibling",
        );

        let wrong_height = header_at(grandparent.hash(), 7, 160, 9);
        expect_bad_uncle(
            config.verify_uncle(
                &wrong_height,
                &parent,
                Some(&grandparent),
                &mut seen,
            ),
            "number",
        );

        let too_early = header_at(grandparent.hash(), 6, 100, 9);
        expect_bad_uncle(
            config.verify_uncle(
                &too_early,
                &parent,
                Some(&grandparent),
                &mut seen,
            ),
            "timestamp",
        );
    }

    #[test]
    fn the_genesis_block_admits_no_uncles() {
        let config = VerificationConfig::new(true);
        let genesis = header_at(H256::zero(), 0, 0, 1);
        let fake_sibling = header_at(H256::zero(), 0, 1, 2);
        let mut seen = HashSet::new();
        expect_bad_uncle(
            config.verify_uncle(&fake_sibling, &genesis, None, &mut seen),
            "genesis",
        );
    }

    #[test]
    fn uncle_checks_without_a_grandparent_stay_structural() {
        let config = VerificationConfig::new(true);
        let (grandparent, parent, _) = family();
        // Structurally fine, contextually unverifiable: accepted.
        let uncle = header_at(grandparent.hash(), 60, 1, 9);
        let mut seen = HashSet::new();
        config
            .verify_uncle(&uncle, &parent, None, &mut seen)
            .expect("Failed to accept without context");
    }
}
