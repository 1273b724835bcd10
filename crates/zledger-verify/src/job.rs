use crate::{Error, Result};
use zledger_primitives::{
    AssetCommitter, InputVerifier, Nullifier, OutState, Signature, Uint256, VerifyInputDesc,
};

/// Spend part of a transaction input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputS {
    /// Nullifier claimed for the spent output.
    pub nil: Nullifier,
    pub sign: Signature,
}

/// Verification of one input against the output it spends.
#[derive(Debug, Clone)]
pub struct InputVerifyJob {
    /// Hash of the transaction body.
    pub hash_z: Uint256,
    pub input: InputS,
    /// The referenced output, resolved by the caller.
    pub src: OutState,
}

impl InputVerifyJob {
    pub fn new(hash_z: Uint256, input: InputS, src: OutState) -> Self {
        Self { hash_z, input, src }
    }

    /// Verifies the input and returns the commitment checksum of the spent asset.
    ///
    /// The commitment is only computed once the verifier accepted the input.
    pub fn run(
        &self,
        verifier: &dyn InputVerifier,
        committer: &dyn AssetCommitter,
    ) -> Result<Uint256> {
        let desc = VerifyInputDesc {
            ehash: self.hash_z,
            nil: self.input.nil,
            root_cm: self.src.root,
            sign: self.input.sign,
            pkr: self.src.pkr,
        };

        verifier
            .verify_input(&desc)
            .map_err(|reason| Error::InvalidInput {
                nil: self.input.nil,
                root: self.src.root,
                reason,
            })?;

        let asset_desc = self.src.asset.to_flat().to_desc();

        Ok(committer.asset_cc(&asset_desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zledger_primitives::{Asset, Category, Currency};
    use zledger_test_utils::{MockVerifier, Sha256Committer, pkr_for, root, tracking_key};

    fn signed_job(src: OutState) -> InputVerifyJob {
        let hash_z = Uint256([9u8; 32]);
        let nil = Uint256([3u8; 32]);
        let sign = MockVerifier::sign(&hash_z, &nil, &src.root, &src.pkr);
        InputVerifyJob::new(hash_z, InputS { nil, sign }, src)
    }

    fn token_src(value: u128) -> OutState {
        OutState {
            root: root(1),
            pkr: pkr_for(&tracking_key(1), 1),
            asset: Asset::token(Currency::from_symbol("SERO"), value),
        }
    }

    #[test]
    fn test_valid_input_yields_deterministic_checksum() {
        let verifier = MockVerifier::new();
        let job = signed_job(token_src(50));

        let first = job.run(&verifier, &Sha256Committer).unwrap();
        let second = job.run(&verifier, &Sha256Committer).unwrap();
        assert_eq!(first, second);

        // Same asset behind a different output commits to the same checksum.
        let mut other_src = token_src(50);
        other_src.root = root(2);
        other_src.pkr = pkr_for(&tracking_key(2), 7);
        let other = signed_job(other_src).run(&verifier, &Sha256Committer).unwrap();
        assert_eq!(first, other);

        let different = signed_job(token_src(51))
            .run(&verifier, &Sha256Committer)
            .unwrap();
        assert_ne!(first, different);
    }

    #[test]
    fn test_ticket_asset_is_committed() {
        let mut src = token_src(0);
        src.asset = Asset::ticket(Category::from_symbol("TICKET"), Uint256([5u8; 32]));
        let checksum = signed_job(src).run(&MockVerifier::new(), &Sha256Committer).unwrap();
        assert!(!checksum.is_zero());
    }

    #[test]
    fn test_rejected_input_names_nullifier_and_root() {
        let verifier = MockVerifier::new();
        let mut job = signed_job(token_src(50));
        job.input.sign.0[0] ^= 0xff;

        match job.run(&verifier, &Sha256Committer) {
            Err(Error::InvalidInput { nil, root: bad_root, .. }) => {
                assert_eq!(nil, job.input.nil);
                assert_eq!(bad_root, root(1));
            }
            other => panic!("Unexpected result: {other:?}"),
        }
    }
}
